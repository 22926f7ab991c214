// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 服务端脚本执行
//!
//! 脚本执行被隔离在 [`ScriptExecutor`] 接口之后，测试时可以替换为模拟实现，
//! 不必依赖系统中真实安装的解释器。

use std::{io, path::Path, process::Command, time::Duration};

use log::{error, info, warn};
use regex::Regex;
use tokio::{
    process::Command as ScriptCommand,
    runtime::{Builder, Handle},
    time::timeout,
};

use crate::exception::Exception;

#[cfg_attr(test, mockall::automock)]
pub trait ScriptExecutor: Send + Sync {
    /// 执行脚本，返回作为响应正文的输出。
    fn run(&self, path: &Path, id: u128) -> Result<Vec<u8>, Exception>;
}

/// 调用外部 PHP 解释器执行脚本。
///
/// 脚本路径作为唯一参数传给解释器，标准输出与标准错误按此顺序拼接为响应正文。
/// 超过时限的脚本进程会被杀死，请求按执行失败处理。
pub struct PhpExecutor {
    interpreter: String,
    timeout: Duration,
}

/// 未配置时脚本的执行时限
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

impl PhpExecutor {
    pub fn new(interpreter: &str) -> Self {
        Self {
            interpreter: interpreter.to_string(),
            timeout: DEFAULT_SCRIPT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = limit;
        self
    }

    /// 探测解释器是否可用并记录版本号。找不到解释器不是致命错误。
    pub fn detect(&self) -> Option<String> {
        let output = match Command::new(&self.interpreter).arg("-v").output() {
            Ok(o) => o,
            Err(_) => {
                warn!(
                    "无法找到PHP解释器{}。服务器将继续运行，但将无法处理PHP请求。",
                    self.interpreter
                );
                return None;
            }
        };
        if !output.status.success() {
            warn!("PHP解释器{}返回了非零状态：{}", self.interpreter, output.status);
            return None;
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let version = parse_php_version(&text);
        match &version {
            Some(v) => info!("找到PHP解释器，版本：{}", v),
            None => info!("找到PHP解释器，但无法识别版本号"),
        }
        version
    }
}

impl ScriptExecutor for PhpExecutor {
    fn run(&self, path: &Path, id: u128) -> Result<Vec<u8>, Exception> {
        let task = self.execute(path, id);
        // 请求在 spawn_blocking 线程中处理，可以借用所在运行时等待子进程
        match Handle::try_current() {
            Ok(handle) => handle.block_on(task),
            Err(_) => match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime.block_on(task),
                Err(e) => {
                    error!("[ID{}]无法创建执行脚本的运行时：{}", id, e);
                    Err(Exception::ScriptFailed)
                }
            },
        }
    }
}

impl PhpExecutor {
    async fn execute(&self, path: &Path, id: u128) -> Result<Vec<u8>, Exception> {
        let mut command = ScriptCommand::new(&self.interpreter);
        command.arg(path).kill_on_drop(true);
        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                error!("[ID{}]找不到PHP解释器{}", id, self.interpreter);
                return Err(Exception::InterpreterNotFound);
            }
            Ok(Err(e)) => {
                error!("[ID{}]无法调用PHP解释器：{}", id, e);
                return Err(Exception::ScriptFailed);
            }
            Err(_) => {
                error!(
                    "[ID{}]脚本{}执行超过{}ms，已终止",
                    id,
                    path.display(),
                    self.timeout.as_millis()
                );
                return Err(Exception::ScriptFailed);
            }
        };

        if output.status.success() {
            let mut body = output.stdout;
            body.extend_from_slice(&output.stderr);
            Ok(body)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!(
                "[ID{}]执行PHP脚本{}出错（{}）：{}",
                id,
                path.display(),
                output.status,
                stderr
            );
            Err(Exception::ScriptFailed)
        }
    }
}

fn parse_php_version(text: &str) -> Option<String> {
    let re = Regex::new(r"PHP (\d+\.\d+\.\d+\S*)").ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
