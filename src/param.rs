// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块集中定义服务器用到的常量与强类型枚举：
//! - HTTP 状态码及其原因短语（Reason Phrase）。
//! - 扩展名到 MIME 类型的映射表。
//! - 首页与无扩展名路径的探测顺序。
//! - 每个响应都会携带的安全响应头。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;

/// 服务器名称标识，`Server` 头的前缀部分，版本号来自配置
pub const SERVER_NAME: &str = "HAMMY";

/// HTTP 协议规定的换行符
pub const CRLF: &str = "\r\n";

/// 未识别扩展名时使用的兜底 MIME 类型
pub const DEFAULT_MIME: &str = "application/octet-stream";

/// HTML 响应统一使用的 Content-Type
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// 访问规则拒绝请求时返回的固定正文
pub const FORBIDDEN_BODY: &str = "403 - Forbidden";

/// 需要交给脚本解释器执行的扩展名
pub const SCRIPT_EXTENSION: &str = "php";

/// 根路径 `/` 的首页探测顺序
pub const INDEX_EXTENSIONS: [&str; 3] = [".php", ".html", ".htmlx"];

/// 无扩展名路径的同名文件探测顺序
pub const PROBE_EXTENSIONS: [&str; 8] = [
    ".php", ".html", ".htmlx", ".jpg", ".png", ".zip", ".css", ".js",
];

/// 内容根目录中缺少首页文件时读取的默认文件
pub const DEFAULT_INDEX: &str = "index.html";

/// 内置占位首页的文件名（位于内置页面目录）
pub const PLACEHOLDER_PAGE: &str = "hammy-index.html";

lazy_static! {
    /// 每个响应都会被设置的安全加固响应头。
    pub static ref SECURITY_HEADERS: Vec<(&'static str, &'static str)> = vec![
        ("Strict-Transport-Security", "max-age=63072000; includeSubDomains"),
        ("X-Content-Type-Options", "nosniff"),
        ("X-Frame-Options", "DENY"),
        (
            "Content-Security-Policy",
            "default-src 'self'; script-src 'self' 'unsafe-eval'; object-src 'none'; style-src 'self' 'unsafe-inline';",
        ),
    ];
}

lazy_static! {
    /// 本服务器可能产生的状态码与原因短语。
    ///
    /// 参考标准：[RFC 9110](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(301, "Moved Permanently");
        map.insert(400, "Bad Request");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(408, "Request Timeout");
        map.insert(431, "Request Header Fields Too Large");
        map.insert(500, "Internal Server Error");
        map.insert(503, "Service Unavailable");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

lazy_static! {
    /// 文件扩展名（不含点）到 MIME 类型的静态映射表。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        // 文本
        map.insert("html", HTML_CONTENT_TYPE);
        map.insert("htm", HTML_CONTENT_TYPE);
        map.insert("htmlx", HTML_CONTENT_TYPE);
        map.insert("css", "text/css");
        map.insert("js", "application/javascript");
        map.insert("mjs", "application/javascript");
        map.insert("json", "application/json");
        map.insert("xml", "application/xml");
        map.insert("txt", "text/plain; charset=utf-8");
        map.insert("csv", "text/csv");
        map.insert("md", "text/markdown; charset=utf-8");
        // 图片
        map.insert("png", "image/png");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("gif", "image/gif");
        map.insert("svg", "image/svg+xml");
        map.insert("webp", "image/webp");
        map.insert("avif", "image/avif");
        map.insert("ico", "image/x-icon");
        map.insert("bmp", "image/bmp");
        // 字体
        map.insert("woff", "font/woff");
        map.insert("woff2", "font/woff2");
        map.insert("ttf", "font/ttf");
        map.insert("otf", "font/otf");
        // 音视频
        map.insert("mp3", "audio/mpeg");
        map.insert("wav", "audio/wav");
        map.insert("mp4", "video/mp4");
        map.insert("webm", "video/webm");
        // 归档与文档
        map.insert("zip", "application/zip");
        map.insert("gz", "application/gzip");
        map.insert("tar", "application/x-tar");
        map.insert("7z", "application/x-7z-compressed");
        map.insert("pdf", "application/pdf");
        map.insert("wasm", "application/wasm");
        map
    };
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    V1_0,
    V1_1,
}

/// 支持的内容编码（压缩）格式
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpEncoding {
    /// GNU zip 压缩
    Gzip,
    /// zlib 压缩
    Deflate,
    /// Brotli 压缩
    Br,
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpEncoding {
    /// 格式化为 `Content-Encoding` 头使用的标识符
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpEncoding::Gzip => write!(f, "gzip"),
            HttpEncoding::Deflate => write!(f, "deflate"),
            HttpEncoding::Br => write!(f, "br"),
        }
    }
}

/// 根据路径的扩展名查询 MIME 类型，未识别的扩展名返回 `application/octet-stream`。
pub fn mime_for(path: &str) -> &'static str {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return DEFAULT_MIME,
    };
    MIME_TYPES
        .get(extension.as_str())
        .copied()
        .unwrap_or(DEFAULT_MIME)
}

/// 查询状态码的原因短语
pub fn reason_phrase(code: u16) -> &'static str {
    STATUS_CODES.get(&code).copied().unwrap_or("Unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_html() {
        assert_eq!(mime_for("/about.html"), "text/html; charset=utf-8");
        assert_eq!(mime_for("/INDEX.HTML"), "text/html; charset=utf-8");
    }

    #[test]
    fn test_mime_common_assets() {
        assert_eq!(mime_for("/style/site.css"), "text/css");
        assert_eq!(mime_for("/app.js"), "application/javascript");
        assert_eq!(mime_for("/logo.png"), "image/png");
        assert_eq!(mime_for("/photo.jpeg"), "image/jpeg");
        assert_eq!(mime_for("/bundle.zip"), "application/zip");
    }

    #[test]
    fn test_mime_unknown() {
        assert_eq!(mime_for("/data.unknown_extension"), DEFAULT_MIME);
        assert_eq!(mime_for("/no_extension"), DEFAULT_MIME);
        // 目录名中的点不应被当作扩展名
        assert_eq!(mime_for("/v1.2/readme"), DEFAULT_MIME);
    }

    #[test]
    fn test_reason_phrases() {
        for (code, expected) in [
            (200, "OK"),
            (301, "Moved Permanently"),
            (403, "Forbidden"),
            (404, "Not Found"),
            (500, "Internal Server Error"),
            (505, "HTTP Version Not Supported"),
        ] {
            assert_eq!(reason_phrase(code), expected);
        }
        assert_eq!(reason_phrase(999), "Unknown");
    }

    #[test]
    fn test_display_impls() {
        assert_eq!(HttpVersion::V1_1.to_string(), "HTTP/1.1");
        assert_eq!(HttpVersion::V1_0.to_string(), "HTTP/1.0");
        assert_eq!(HttpEncoding::Gzip.to_string(), "gzip");
        assert_eq!(HttpEncoding::Br.to_string(), "br");
    }
}
