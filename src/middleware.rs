// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求处理管线
//!
//! 每个请求依次经过 `SecurityHeaders ∘ Compression ∘ ContentResolver`：
//! 内容解析生成响应，压缩层按客户端能力编码正文并设置 `Content-Encoding`，
//! 最外层为所有响应补上固定的安全头。

use std::io::{self, Write};

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression as Level,
};
use log::{debug, error};

use crate::{
    param::{HttpEncoding, SECURITY_HEADERS},
    request::Request,
    resolver::ContentResolver,
    response::Response,
};

/// 处理一个已解析的请求并生成响应
pub trait Handler: Send + Sync {
    fn handle(&self, request: &Request, id: u128) -> Response;
}

/// 客户端声明支持时压缩响应正文
pub struct Compression<H> {
    inner: H,
}

impl<H: Handler> Compression<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: Handler> Handler for Compression<H> {
    fn handle(&self, request: &Request, id: u128) -> Response {
        let mut response = self.inner.handle(request, id);
        if response.content_encoding().is_some() {
            return response;
        }
        let encoding = match decide_encoding(request.accept_encoding()) {
            Some(e) => e,
            None => {
                debug!("[ID{}]客户端不支持压缩，原样发送", id);
                return response;
            }
        };
        match compress(response.content(), encoding) {
            Ok(compressed) => {
                debug!(
                    "[ID{}]使用{}压缩：{} bytes -> {} bytes",
                    id,
                    encoding,
                    response.content().len(),
                    compressed.len()
                );
                response
                    .set_content(Bytes::from(compressed))
                    .set_content_encoding(Some(encoding))
                    .set_header("Vary", "Accept-Encoding");
            }
            Err(e) => error!("[ID{}]压缩失败：{}，返回未压缩内容", id, e),
        }
        response
    }
}

/// 为每个响应设置固定的安全加固头
pub struct SecurityHeaders<H> {
    inner: H,
}

impl<H: Handler> SecurityHeaders<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

impl<H: Handler> Handler for SecurityHeaders<H> {
    fn handle(&self, request: &Request, id: u128) -> Response {
        let mut response = self.inner.handle(request, id);
        set_security_headers(&mut response);
        response
    }
}

pub fn set_security_headers(response: &mut Response) {
    for (name, value) in SECURITY_HEADERS.iter() {
        response.set_header(name, value);
    }
}

/// 组装好的完整管线，由服务器在所有连接间共享。
pub struct Pipeline {
    chain: SecurityHeaders<Compression<ContentResolver>>,
    server: String,
}

impl Pipeline {
    pub fn new(resolver: ContentResolver, server: &str) -> Self {
        Self {
            chain: SecurityHeaders::new(Compression::new(resolver)),
            server: server.to_string(),
        }
    }

    pub fn resolver(&self) -> &ContentResolver {
        self.chain.inner().inner()
    }

    /// 请求无法正常处理时的状态页（加安全头，不压缩）
    pub fn reject(&self, code: u16) -> Response {
        let mut response = self.resolver().pages().status_page(code);
        set_security_headers(&mut response);
        response.set_server_name(&self.server);
        response
    }
}

impl Handler for Pipeline {
    fn handle(&self, request: &Request, id: u128) -> Response {
        let mut response = self.chain.handle(request, id);
        response.set_server_name(&self.server);
        response
    }
}

pub fn compress(data: &[u8], mode: HttpEncoding) -> io::Result<Vec<u8>> {
    match mode {
        HttpEncoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Level::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        HttpEncoding::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Level::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        HttpEncoding::Br => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
    }
}

// gzip > deflate > br
pub fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    [HttpEncoding::Gzip, HttpEncoding::Deflate, HttpEncoding::Br]
        .into_iter()
        .find(|e| accept_encoding.contains(e))
}
