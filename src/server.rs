// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 连接层
//!
//! 每个 TCP 连接对应一个 Tokio 任务：读取请求头、交给 [`Pipeline`] 生成响应、写回并关闭。
//! 内容解析涉及阻塞的文件读取与子进程执行，因此放在 `spawn_blocking` 中运行。
//!
//! 停机时停止接受新连接，最多等待 `shutdown_timeout` 让在途请求完成，超时的请求被放弃。

use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    path::PathBuf,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Instant,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    signal,
    sync::Notify,
    task::JoinSet,
    time::{timeout, timeout_at, Instant as Deadline},
};

use crate::{
    cache::ResponseCache,
    config::Config,
    exception::Exception,
    middleware::{Handler, Pipeline},
    request::Request,
    response::Response,
};

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

pub struct Server {
    pipeline: Arc<Pipeline>,
    config: Arc<Config>,
    active: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

impl Server {
    pub fn new(pipeline: Arc<Pipeline>, config: Arc<Config>) -> Self {
        Self {
            pipeline,
            config,
            active: Arc::new(AtomicUsize::new(0)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// 调用 `notify_one` 即可触发优雅停机
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub fn active_connections(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.active)
    }

    /// 接受连接直到收到停机通知，然后在超时时间内等待在途请求结束。
    pub async fn run(self, listener: TcpListener) {
        let mut tasks = JoinSet::new();
        let mut id: u128 = 0;

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            error!("接受连接失败：{}", e);
                            continue;
                        }
                    };
                    debug!("[ID{}]新的连接：{}", id, addr);
                    let pipeline = Arc::clone(&self.pipeline);
                    let config = Arc::clone(&self.config);
                    let guard = ActiveGuard::new(Arc::clone(&self.active));
                    tasks.spawn(async move {
                        let _guard = guard;
                        handle_connection(stream, id, pipeline, config).await;
                    });
                    id += 1;
                }
                // 回收已结束的任务
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
                _ = self.shutdown.notified() => {
                    info!("收到停机指令，停止接受新连接");
                    break;
                }
            }
        }
        drop(listener);

        let in_flight = tasks.len();
        if in_flight > 0 {
            info!("等待{}个在途请求完成", in_flight);
        }
        let drained = timeout(self.config.shutdown_timeout(), async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                "{}秒内仍有{}个请求未完成，放弃这些请求",
                self.config.shutdown_timeout().as_secs(),
                tasks.len()
            );
            tasks.abort_all();
        }
        info!("服务器已停止");
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 按配置绑定监听地址
pub async fn bind(config: &Config) -> std::io::Result<TcpListener> {
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddr::V4(SocketAddrV4::new(address, config.port()));
    let listener = TcpListener::bind(socket).await?;
    info!("服务端在{}上监听Socket连接", listener.local_addr()?);
    Ok(listener)
}

async fn handle_connection(
    mut stream: TcpStream,
    id: u128,
    pipeline: Arc<Pipeline>,
    config: Arc<Config>,
) {
    let head = match read_head(&mut stream, id, &config).await {
        Ok(Some(head)) => head,
        Ok(None) => return,
        Err(e) => {
            warn!("[ID{}]请求头无效：{}", id, e);
            let response = pipeline.reject(e.status_code());
            write_response(&mut stream, &response.as_bytes(false), id, &config).await;
            return;
        }
    };
    let start_time = Instant::now();

    let request = match Request::try_from(&head, id) {
        Ok(req) => req,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败：{}", id, e);
            let response = pipeline.reject(e.status_code());
            write_response(&mut stream, &response.as_bytes(false), id, &config).await;
            return;
        }
    };

    let worker = Arc::clone(&pipeline);
    let result = tokio::task::spawn_blocking(move || {
        let response = worker.handle(&request, id);
        (request, response)
    })
    .await;
    let (request, response) = match result {
        Ok(pair) => pair,
        Err(e) => {
            error!("[ID{}]处理请求时发生异常：{}", id, e);
            let response = pipeline.reject(500);
            write_response(&mut stream, &response.as_bytes(false), id, &config).await;
            return;
        }
    };

    info!("{}", access_line(id, &request, &response, start_time.elapsed().as_millis()));

    let bytes = response.as_bytes(request.is_head());
    write_response(&mut stream, &bytes, id, &config).await;
}

/// 访问日志：ID、版本、方法、Host、路径、状态码、状态描述、UA、耗时
fn access_line(id: u128, request: &Request, response: &Response, elapsed_ms: u128) -> String {
    format!(
        "[ID{}] {}, {}, {}, {}, {}, {}, {}, {}ms",
        id,
        request.version(),
        request.method(),
        request.host().unwrap_or("-"),
        request.path(),
        response.status_code(),
        response.information(),
        request.user_agent(),
        elapsed_ms
    )
}

/// 读取请求头直到空行。
///
/// 连接在`idle_timeout`内没有任何数据、或在发送任何数据前关闭时返回 `Ok(None)`；
/// 头部超过`max_header_bytes`返回 [`Exception::HeaderTooLarge`]。
async fn read_head(
    stream: &mut TcpStream,
    id: u128,
    config: &Config,
) -> Result<Option<Vec<u8>>, Exception> {
    let mut head = Vec::with_capacity(1024);
    let mut buffer = vec![0u8; 4096];
    let limit = config.max_header_bytes();

    let n = match timeout(config.idle_timeout(), stream.read(&mut buffer)).await {
        Ok(Ok(0)) => return Ok(None),
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            error!("[ID{}]读取TCPStream时遇到错误：{}", id, e);
            return Ok(None);
        }
        Err(_) => {
            debug!("[ID{}]连接空闲超时", id);
            return Ok(None);
        }
    };
    head.extend_from_slice(&buffer[..n]);

    let deadline = Deadline::now() + config.read_timeout();
    loop {
        if let Some(pos) = find_terminator(&head) {
            head.truncate(pos + HEAD_TERMINATOR.len());
            if head.len() > limit {
                return Err(Exception::HeaderTooLarge);
            }
            return Ok(Some(head));
        }
        if head.len() > limit {
            return Err(Exception::HeaderTooLarge);
        }
        match timeout_at(deadline, stream.read(&mut buffer)).await {
            Ok(Ok(0)) => {
                debug!("[ID{}]请求头未结束连接即关闭", id);
                return Ok(Some(head));
            }
            Ok(Ok(n)) => head.extend_from_slice(&buffer[..n]),
            Ok(Err(e)) => {
                error!("[ID{}]读取TCPStream时遇到错误：{}", id, e);
                return Ok(None);
            }
            Err(_) => {
                warn!("[ID{}]读取请求头超时", id);
                return Ok(None);
            }
        }
    }
}

fn find_terminator(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
}

async fn write_response(stream: &mut TcpStream, bytes: &[u8], id: u128, config: &Config) {
    let result = timeout(config.write_timeout(), async {
        stream.write_all(bytes).await?;
        stream.flush().await?;
        stream.shutdown().await
    })
    .await;
    match result {
        Ok(Ok(())) => debug!("[ID{}]响应发送完毕，长度：{}", id, bytes.len()),
        Ok(Err(e)) => error!("[ID{}]发送响应失败：{}", id, e),
        Err(_) => warn!("[ID{}]发送响应超时", id),
    }
}

/// 等待 Ctrl+C 或 SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("无法注册Ctrl+C信号处理：{}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!("无法注册SIGTERM信号处理：{}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// 后台管理控制台，从标准输入读取指令。
///
/// `stop` 触发优雅停机，`save` 立即把缓存写入存储目录。
pub fn spawn_console(
    shutdown: Arc<Notify>,
    active: Arc<AtomicUsize>,
    cache: Arc<ResponseCache>,
    storage_dir: PathBuf,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(tokio::io::stdin());
        let mut input = String::new();
        loop {
            input.clear();
            match reader.read_line(&mut input).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            match input.trim() {
                "stop" => {
                    println!("停机指令已激活，服务器将在处理完在途请求后关闭...");
                    shutdown.notify_one();
                    break;
                }
                "status" => {
                    println!("== Hammy 状态 ===");
                    println!("当前活跃连接数: {}", active.load(Ordering::SeqCst));
                    println!("缓存条目数: {}", cache.len());
                    println!("缓存字节数: {}", cache.total_bytes());
                    println!("=================");
                }
                "save" => {
                    let cache = Arc::clone(&cache);
                    let dir = storage_dir.clone();
                    let result =
                        tokio::task::spawn_blocking(move || cache.persist_all(&dir)).await;
                    match result {
                        Ok(Ok(n)) => println!("已保存{}条缓存", n),
                        Ok(Err(e)) => println!("保存缓存失败：{}", e),
                        Err(e) => println!("保存缓存失败：{}", e),
                    }
                }
                "help" => {
                    println!("== Hammy Help ==");
                    println!("stop   - 优雅停机");
                    println!("status - 查看当前服务器运行状态");
                    println!("save   - 立即把缓存写入磁盘");
                    println!("help   - 显示此帮助信息");
                    println!("================");
                }
                "" => {}
                cmd => println!("无效的命令：{}", cmd),
            }
        }
    });
}
