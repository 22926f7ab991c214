// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求解析模块
//!
//! 将连接上读到的请求头字节解析为 `Request`：
//! 1. 请求行（方法、目标、版本）。
//! 2. 路径规整：去掉查询串与片段、解码 `%XX`、拒绝 `..` 段与空字节。
//! 3. 常用标头：`User-Agent`、`Host`、`Accept-Encoding`。
//!
//! 方法只被记录下来，不参与内容解析；除 HEAD 在发送时省略正文外，所有方法一视同仁。

use crate::{exception::Exception, param::*};
use log::error;
use percent_encoding::percent_decode_str;

#[derive(Debug, Clone)]
pub struct Request {
    method: String,
    /// 规整后的路径，不含查询串
    path: String,
    version: HttpVersion,
    user_agent: String,
    host: Option<String>,
    /// 客户端支持的压缩编码（按出现顺序）
    accept_encoding: Vec<HttpEncoding>,
}

impl Request {
    /// 从请求头字节（不含正文）构建 `Request`。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(s) => s,
            Err(_) => {
                error!("[ID{}]无法将HTTP请求解析为UTF-8", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = request_string.split(CRLF);
        let request_line = lines.next().unwrap_or("");
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequest);
        }

        let method = parts[0].to_uppercase();
        let version = match parts[2].to_uppercase().as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            "HTTP/1.0" => HttpVersion::V1_0,
            v if v.starts_with("HTTP/") => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, v);
                return Err(Exception::UnsupportedHttpVersion);
            }
            v => {
                error!("[ID{}]无法识别的协议标识：{}", id, v);
                return Err(Exception::MalformedRequest);
            }
        };
        let path = normalize_target(parts[1]).map_err(|e| {
            error!("[ID{}]非法的请求路径：{}", id, parts[1]);
            e
        })?;

        let mut user_agent = String::new();
        let mut host = None;
        let mut accept_encoding = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (name, value) = match line.split_once(':') {
                Some((n, v)) => (n.trim(), v.trim()),
                None => continue,
            };
            if name.eq_ignore_ascii_case("user-agent") {
                user_agent = value.to_string();
            } else if name.eq_ignore_ascii_case("host") {
                host = Some(value.to_string());
            } else if name.eq_ignore_ascii_case("accept-encoding") {
                accept_encoding = parse_accept_encoding(value);
            }
        }

        Ok(Self {
            method,
            path,
            version,
            user_agent,
            host,
            accept_encoding,
        })
    }
}

impl Request {
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    /// HEAD 请求只发送响应头
    pub fn is_head(&self) -> bool {
        self.method == "HEAD"
    }
}

/// 把请求目标规整为以 `/` 开头、已解码的路径
fn normalize_target(target: &str) -> Result<String, Exception> {
    // absolute-form: http://host/path，origin-form 中出现的 `://` 保持原样
    let target = match (target.starts_with('/'), target.find("://")) {
        (false, Some(pos)) => {
            let after = &target[pos + 3..];
            match after.find('/') {
                Some(slash) => &after[slash..],
                None => "/",
            }
        }
        _ => target,
    };
    let raw_path = target.split(['?', '#']).next().unwrap_or("");
    if !raw_path.starts_with('/') {
        return Err(Exception::InvalidPath);
    }
    let decoded = percent_decode(raw_path)?;
    // 控制字符（含 NUL、CR、LF）可能被回显到 Location 头与日志中
    if decoded.chars().any(char::is_control)
        || decoded.split('/').any(|segment| segment == "..")
    {
        return Err(Exception::InvalidPath);
    }
    Ok(decoded)
}

fn percent_decode(raw: &str) -> Result<String, Exception> {
    // percent_decode_str 会原样保留残缺的转义，这里单独拒绝
    if !has_valid_escapes(raw) {
        return Err(Exception::InvalidPath);
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| Exception::InvalidPath)
}

fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'%')
        .all(|(i, _)| {
            bytes
                .get(i + 1..i + 3)
                .map_or(false, |hex| hex.iter().all(u8::is_ascii_hexdigit))
        })
}

fn parse_accept_encoding(value: &str) -> Vec<HttpEncoding> {
    let mut encodings = Vec::new();
    for item in value.split(',') {
        let mut fields = item.split(';');
        let name = fields.next().unwrap_or("").trim().to_ascii_lowercase();
        // q=0 表示明确拒绝
        let refused = fields.any(|f| {
            let f = f.trim();
            f == "q=0" || f == "q=0.0" || f == "q=0.00" || f == "q=0.000"
        });
        if refused {
            continue;
        }
        let encoding = match name.as_str() {
            "gzip" | "x-gzip" => HttpEncoding::Gzip,
            "deflate" => HttpEncoding::Deflate,
            "br" => HttpEncoding::Br,
            _ => continue,
        };
        if !encodings.contains(&encoding) {
            encodings.push(encoding);
        }
    }
    encodings
}
