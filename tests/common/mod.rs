// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 集成测试共用的服务器启动器与原始 HTTP 客户端
#![allow(dead_code)]

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use hammy::{
    cache::ResponseCache, config::Config, htaccess::RuleSet, middleware::Pipeline,
    resolver::ContentResolver, script::PhpExecutor, server::Server,
};
use tempfile::TempDir;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Notify,
    task::JoinHandle,
};

pub struct TestServer {
    pub addr: SocketAddr,
    pub root: TempDir,
    pub cache: Arc<ResponseCache>,
    shutdown: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// 以 `sh` 充当脚本解释器启动服务器
    pub async fn start(setup: impl FnOnce(&Path)) -> Self {
        Self::start_with(setup, |_| {}, "sh").await
    }

    pub async fn start_with(
        setup: impl FnOnce(&Path),
        configure: impl FnOnce(&mut Config),
        interpreter: &str,
    ) -> Self {
        let root = tempfile::tempdir().unwrap();
        setup(root.path());

        let pages = Path::new(env!("CARGO_MANIFEST_DIR")).join("static/pages");
        let mut config = Config::new();
        config
            .set_www_root(root.path().to_str().unwrap())
            .set_pages_dir(pages.to_str().unwrap())
            .set_local(true)
            .set_port(0)
            .set_persist_cache(false);
        configure(&mut config);

        let rules = RuleSet::load(&config.htaccess_file()).unwrap_or_else(|_| RuleSet::new());
        let cache = Arc::new(ResponseCache::new(1024, 1 << 20));
        let resolver = ContentResolver::from_config(
            &config,
            Box::new(rules),
            Arc::clone(&cache),
            Box::new(PhpExecutor::new(interpreter).with_timeout(config.script_timeout())),
        );
        let pipeline = Arc::new(Pipeline::new(resolver, &config.server_header()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(pipeline, Arc::new(config));
        let shutdown = server.shutdown_handle();
        let handle = tokio::spawn(server.run(listener));

        Self {
            addr,
            root,
            cache,
            shutdown,
            handle,
        }
    }

    pub async fn get(&self, path: &str) -> RawResponse {
        let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
        send(self.addr, request.as_bytes()).await
    }

    pub async fn send(&self, raw: &str) -> RawResponse {
        send(self.addr, raw.as_bytes()).await
    }

    pub async fn stop(self) {
        self.shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop in time")
            .unwrap();
    }
}

pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

pub async fn send(addr: SocketAddr, raw: &[u8]) -> RawResponse {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw).await.unwrap();
    let mut buffer = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut buffer))
        .await
        .expect("response timed out")
        .unwrap();
    parse_response(&buffer)
}

pub fn parse_response(raw: &[u8]) -> RawResponse {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator");
    let head = String::from_utf8_lossy(&raw[..split]).to_string();
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|c| c.parse().ok())
        .unwrap_or(0);
    let headers = lines
        .filter_map(|l| l.split_once(": "))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    RawResponse {
        status,
        headers,
        body: raw[split + 4..].to_vec(),
    }
}
