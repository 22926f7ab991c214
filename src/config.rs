// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use num_cpus;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use log::{info, warn};
use std::env;
use std::fs::File;
use std::io::{self, prelude::*};
use std::path::PathBuf;
use std::time::Duration;

/// 覆盖监听端口的环境变量
pub const PORT_ENV: &str = "SERVER_PORT";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    www_root: String,
    pages_dir: String,
    htaccess_file: Option<String>,
    port: u16,
    local: bool,
    worker_threads: usize,
    read_timeout: u64,
    write_timeout: u64,
    idle_timeout: u64,
    max_header_bytes: usize,
    shutdown_timeout: u64,
    server_version: String,
    php_interpreter: String,
    script_timeout: u64,
    cache_dir: String,
    cache_fallback_dir: String,
    max_cache_entries: usize,
    max_cache_bytes: u64,
    persist_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: "/var/www/html".to_string(),
            pages_dir: "static/pages".to_string(),
            htaccess_file: None,
            port: 8080,
            local: false,
            worker_threads: 0,
            read_timeout: 15,
            write_timeout: 15,
            idle_timeout: 60,
            max_header_bytes: 1 << 20, // 1MB
            shutdown_timeout: 5,
            server_version: "v1.01".to_string(),
            php_interpreter: "php".to_string(),
            script_timeout: 30,
            cache_dir: "/var/cache/hammy/".to_string(),
            cache_fallback_dir: "./cache/".to_string(),
            max_cache_entries: 3 * 1024 * 1024 * 1024,
            max_cache_bytes: 3 * 1024 * 1024 * 1024, // 3GB
            persist_cache: true,
        }
    }

    /// 从 TOML 文件构建配置。
    ///
    /// 文件不可读或无法解析都视为启动失败，由调用方终止进程。
    pub fn from_toml(filename: &str) -> io::Result<Self> {
        let mut file = File::open(filename)?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)?;
        let mut config = Self::from_toml_str(&str_val)?;
        config.apply_env();
        Ok(config)
    }

    /// 解析 TOML 文本并规整不合理的取值
    pub fn from_toml_str(raw: &str) -> io::Result<Self> {
        let mut config: Config = toml::from_str(raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        if config.worker_threads == 0 {
            config.worker_threads = num_cpus::get();
        }
        if config.max_header_bytes == 0 {
            warn!("max_header_bytes被设置为0，将改为默认值1MB");
            config.max_header_bytes = 1 << 20;
        }
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(port) = env::var(PORT_ENV) {
            match port.parse::<u16>() {
                Ok(p) => {
                    info!("环境变量{}覆盖监听端口：{}", PORT_ENV, p);
                    self.port = p;
                }
                Err(_) => warn!("环境变量{}的值{}不是合法端口，忽略", PORT_ENV, port),
            }
        }
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn set_www_root(&mut self, root: &str) -> &mut Self {
        self.www_root = root.to_string();
        self
    }

    pub fn pages_dir(&self) -> &str {
        &self.pages_dir
    }

    pub fn set_pages_dir(&mut self, dir: &str) -> &mut Self {
        self.pages_dir = dir.to_string();
        self
    }

    /// 访问规则文件，未配置时为内容根目录下的 `.htaccess`
    pub fn htaccess_file(&self) -> PathBuf {
        match &self.htaccess_file {
            Some(f) => PathBuf::from(f),
            None => PathBuf::from(&self.www_root).join(".htaccess"),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = port;
        self
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn set_local(&mut self, local: bool) -> &mut Self {
        self.local = local;
        self
    }

    pub fn worker_threads(&self) -> usize {
        match self.worker_threads {
            0 => num_cpus::get(),
            n => n,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    pub fn max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }

    pub fn set_max_header_bytes(&mut self, limit: usize) -> &mut Self {
        self.max_header_bytes = limit;
        self
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }

    /// `Server` 响应头的完整取值
    pub fn server_header(&self) -> String {
        format!("{} {}", crate::param::SERVER_NAME, self.server_version)
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    pub fn php_interpreter(&self) -> &str {
        &self.php_interpreter
    }

    /// 单个脚本允许执行的最长时间
    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout)
    }

    pub fn set_script_timeout(&mut self, secs: u64) -> &mut Self {
        self.script_timeout = secs;
        self
    }

    pub fn cache_dir(&self) -> &str {
        &self.cache_dir
    }

    pub fn cache_fallback_dir(&self) -> &str {
        &self.cache_fallback_dir
    }

    pub fn max_cache_entries(&self) -> usize {
        self.max_cache_entries
    }

    pub fn max_cache_bytes(&self) -> u64 {
        self.max_cache_bytes
    }

    pub fn persist_cache(&self) -> bool {
        self.persist_cache
    }

    pub fn set_persist_cache(&mut self, persist: bool) -> &mut Self {
        self.persist_cache = persist;
        self
    }
}
