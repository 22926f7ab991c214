// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Hammy 静态内容服务器
//!
//! 启动流程：
//! - 加载日志与 TOML 配置
//! - 准备缓存存储目录并从磁盘恢复缓存
//! - 加载访问规则、探测 PHP 解释器
//! - 组装请求管线并开始监听
//! - 收到 Ctrl+C、SIGTERM 或控制台 `stop` 后优雅停机，并把缓存写回磁盘

use std::{path::Path, process, sync::Arc, time::Duration};

use hammy::{
    banner,
    cache::{ensure_storage_dir, ResponseCache},
    config::Config,
    htaccess::RuleSet,
    middleware::Pipeline,
    resolver::ContentResolver,
    script::PhpExecutor,
    server::{self, Server},
};
use log::{error, info, warn};
use tokio::runtime::Builder;

const LOG_CONFIG: &str = "config/log4rs.yaml";
const SERVER_CONFIG: &str = "config/development.toml";

fn main() {
    if let Err(e) = log4rs::init_file(LOG_CONFIG, Default::default()) {
        eprintln!("无法加载日志配置{}：{}，将不输出日志", LOG_CONFIG, e);
    }

    let config = match Config::from_toml(SERVER_CONFIG) {
        Ok(config) => config,
        Err(e) => {
            error!("无法加载配置文件{}：{}", SERVER_CONFIG, e);
            eprintln!("无法加载配置文件{}：{}", SERVER_CONFIG, e);
            process::exit(1);
        }
    };
    info!("配置文件已载入");
    info!("www root: {}", config.www_root());

    banner::print_banner(config.server_version());

    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建异步运行时：{}", e);
            process::exit(1);
        }
    };

    let code = runtime.block_on(run(config));
    // 控制台任务可能仍阻塞在标准输入上，不等待它
    runtime.shutdown_timeout(Duration::from_secs(1));
    process::exit(code);
}

async fn run(config: Config) -> i32 {
    let storage_dir = match ensure_storage_dir(
        Path::new(config.cache_dir()),
        Path::new(config.cache_fallback_dir()),
    ) {
        Ok(dir) => dir,
        Err(e) => {
            error!("无法创建缓存存储目录：{}", e);
            return 1;
        }
    };
    info!("缓存存储目录：{}", storage_dir.display());

    let cache = Arc::new(ResponseCache::from_config(&config));
    if config.persist_cache() {
        if let Err(e) = cache.restore_all(&storage_dir) {
            warn!("恢复缓存失败：{}", e);
        }
    }

    let htaccess = config.htaccess_file();
    let rules = match RuleSet::load(&htaccess) {
        Ok(rules) => {
            info!("从{}加载了{}条访问规则", htaccess.display(), rules.len());
            rules
        }
        Err(e) => {
            warn!("无法加载访问规则{}：{}，不做访问限制", htaccess.display(), e);
            RuleSet::new()
        }
    };

    let executor =
        PhpExecutor::new(config.php_interpreter()).with_timeout(config.script_timeout());
    executor.detect();

    let resolver = ContentResolver::from_config(
        &config,
        Box::new(rules),
        Arc::clone(&cache),
        Box::new(executor),
    );
    let pipeline = Arc::new(Pipeline::new(resolver, &config.server_header()));

    let listener = match server::bind(&config).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", config.port(), e);
            return 1;
        }
    };

    let server = Server::new(pipeline, Arc::new(config.clone()));
    let shutdown = server.shutdown_handle();
    tokio::spawn({
        let shutdown = Arc::clone(&shutdown);
        async move {
            server::shutdown_signal().await;
            info!("收到停机信号");
            shutdown.notify_one();
        }
    });
    server::spawn_console(
        shutdown,
        server.active_connections(),
        Arc::clone(&cache),
        storage_dir.clone(),
    );

    server.run(listener).await;

    if config.persist_cache() {
        let result = tokio::task::spawn_blocking(move || cache.persist_all(&storage_dir)).await;
        match result {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("写入缓存失败：{}", e),
            Err(e) => error!("写入缓存失败：{}", e),
        }
    }
    0
}
