// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::{param::*, util::redirect_body};

use bytes::Bytes;
use chrono::prelude::*;

/// 一次请求的完整响应。
///
/// 内容解析层只负责状态码、类型与正文；压缩与安全头由中间件在其后填充，
/// 最终在 [`Response::as_bytes`] 中序列化为 HTTP/1.1 报文。
#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content_encoding: Option<HttpEncoding>,
    server_name: String,
    date: DateTime<Utc>,
    headers: Vec<(String, String)>,
    content: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            content_encoding: None,
            server_name: SERVER_NAME.to_string(),
            date: Utc::now(),
            headers: Vec::new(),
            content: Bytes::new(),
        }
    }

    pub fn from_bytes(code: u16, content_type: &str, content: Bytes) -> Self {
        let mut response = Self::new();
        response.set_code(code);
        response.content_type = Some(content_type.to_string());
        response.content = content;
        response
    }

    pub fn html(code: u16, html: impl Into<Bytes>) -> Self {
        Self::from_bytes(code, HTML_CONTENT_TYPE, html.into())
    }

    /// 301 永久重定向
    pub fn redirect(location: &str) -> Self {
        let mut response = Self::html(301, redirect_body(location));
        response.set_header("Location", location);
        response
    }

    /// 访问规则拒绝：固定的纯文本正文
    pub fn forbidden() -> Self {
        Self::from_bytes(
            403,
            "text/plain; charset=utf-8",
            Bytes::from_static(FORBIDDEN_BODY.as_bytes()),
        )
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = reason_phrase(code).to_string();
        self
    }

    pub fn set_server_name(&mut self, name: &str) -> &mut Self {
        self.server_name = name.to_string();
        self
    }

    /// 设置响应头，同名（大小写不敏感）的旧值被替换
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        self
    }

    pub fn set_content(&mut self, content: Bytes) -> &mut Self {
        self.content = content;
        self
    }

    pub fn set_content_encoding(&mut self, encoding: Option<HttpEncoding>) -> &mut Self {
        self.content_encoding = encoding;
        self
    }

    /// 序列化为 HTTP 报文。`head_only` 为真时省略正文但保留 `Content-Length`。
    pub fn as_bytes(&self, head_only: bool) -> Vec<u8> {
        let mut header = format!(
            "{} {} {}{}",
            self.version, self.status_code, self.information, CRLF
        );
        if let Some(t) = &self.content_type {
            header.push_str(&format!("Content-Type: {}{}", t, CRLF));
        }
        if let Some(e) = self.content_encoding {
            header.push_str(&format!("Content-Encoding: {}{}", e, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", self.content.len(), CRLF));
        header.push_str(&format!("Date: {}{}", format_date(&self.date), CRLF));
        header.push_str(&format!("Server: {}{}", self.server_name, CRLF));
        for (name, value) in &self.headers {
            header.push_str(&format!("{}: {}{}", name, value, CRLF));
        }
        header.push_str("Connection: close");
        header.push_str(CRLF);
        header.push_str(CRLF);

        let mut bytes = header.into_bytes();
        if !head_only {
            bytes.extend_from_slice(&self.content);
        }
        bytes
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content_encoding(&self) -> Option<HttpEncoding> {
        self.content_encoding
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// HTTP-date，例如 `Sun, 06 Nov 1994 08:49:37 GMT`
fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_date() {
        let date = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(format_date(&date), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_response_new() {
        let response = Response::new();
        assert_eq!(response.status_code(), 200);
        assert_eq!(response.information(), "OK");
        assert!(response.content().is_empty());
    }

    #[test]
    fn test_response_as_bytes_basic() {
        let mut response = Response::new();
        response.set_server_name("HAMMY v1.01");
        let bytes = response.as_bytes(false);
        let text = String::from_utf8_lossy(&bytes);

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(text.contains("Server: HAMMY v1.01\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_response_as_bytes_with_content() {
        let response = Response::from_bytes(200, "text/plain", Bytes::from("Hello"));
        let text = String::from_utf8(response.as_bytes(false)).unwrap();

        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(text.ends_with("\r\n\r\nHello"));
    }

    #[test]
    fn test_head_only_keeps_length() {
        let response = Response::html(200, "<h1>x</h1>");
        let text = String::from_utf8(response.as_bytes(true)).unwrap();
        assert!(text.contains("Content-Length: 10\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_redirect() {
        let response = Response::redirect("/about.html");
        assert_eq!(response.status_code(), 301);
        assert_eq!(response.information(), "Moved Permanently");
        assert_eq!(response.header("location"), Some("/about.html"));
        assert_eq!(response.content_type(), Some(HTML_CONTENT_TYPE));
    }

    #[test]
    fn test_forbidden() {
        let response = Response::forbidden();
        assert_eq!(response.status_code(), 403);
        assert_eq!(response.content(), &Bytes::from("403 - Forbidden"));
    }

    #[test]
    fn test_set_header_replaces() {
        let mut response = Response::new();
        response.set_header("X-Frame-Options", "SAMEORIGIN");
        response.set_header("x-frame-options", "DENY");
        assert_eq!(response.header("X-Frame-Options"), Some("DENY"));
        let text = String::from_utf8(response.as_bytes(false)).unwrap();
        assert_eq!(text.matches("rame-Options").count(), 1);
    }

    #[test]
    fn test_content_encoding_header() {
        let mut response = Response::html(200, "x");
        response.set_content_encoding(Some(HttpEncoding::Gzip));
        let text = String::from_utf8_lossy(&response.as_bytes(false)).to_string();
        assert!(text.contains("Content-Encoding: gzip\r\n"));
    }

    #[test]
    fn test_status_code_various() {
        for (code, expected) in [
            (200, "OK"),
            (301, "Moved Permanently"),
            (403, "Forbidden"),
            (404, "Not Found"),
            (500, "Internal Server Error"),
            (505, "HTTP Version Not Supported"),
        ] {
            let mut response = Response::new();
            response.set_code(code);
            assert_eq!(response.status_code(), code);
            assert_eq!(response.information(), expected);
        }
    }
}
