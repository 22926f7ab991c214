// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 定义请求处理生命周期中可能出现的各类异常情况。
//!
//! 每个变体都对应一个确定的 HTTP 状态码（见 [`Exception::status_code`]），
//! 上层据此选择错误页面，任何单个请求的异常都不会终止进程。
//! 文件系统相关的启动与持久化操作使用 `std::io::Result`，不在此列。

use std::fmt;

/// 服务器处理请求过程中发生的异常类型。
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Exception {
    /// 请求头字节流无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行格式不正确（缺少方法、路径或版本）。
    MalformedRequest,
    /// 客户端使用了 HTTP/1.0 与 HTTP/1.1 以外的协议版本。
    UnsupportedHttpVersion,
    /// 请求头超过了配置的 `max_header_bytes`。
    HeaderTooLarge,
    /// 请求路径非法，例如包含 `..` 段或无法解码的转义序列。
    InvalidPath,
    /// 找不到脚本解释器的可执行文件。
    InterpreterNotFound,
    /// 脚本已启动但执行失败（非零退出码）或无法被调用。
    ScriptFailed,
}

use Exception::*;

impl Exception {
    /// 该异常对应的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            RequestIsNotUtf8 | MalformedRequest | InvalidPath => 400,
            UnsupportedHttpVersion => 505,
            HeaderTooLarge => 431,
            InterpreterNotFound | ScriptFailed => 500,
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request bytes can't be parsed in UTF-8"),
            MalformedRequest => write!(f, "Malformed request line"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            HeaderTooLarge => write!(f, "Request header fields too large"),
            InvalidPath => write!(f, "Invalid path (400)"),
            InterpreterNotFound => write!(f, "Couldn't find the PHP interpreter"),
            ScriptFailed => write!(f, "An error happened while executing the PHP script"),
        }
    }
}
