// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 内容解析
//!
//! 把请求路径映射为一次响应。每个请求按固定顺序经过以下状态，先命中者生效：
//!
//! 1. **拒绝**：访问规则判定为 deny，直接返回 403，不读缓存也不读磁盘。
//! 2. **根路径**：`/` 依次探测 `index.php`、`index.html`、`index.htmlx`，
//!    找到即 301 重定向；都不存在则跳过第 3 步继续。
//! 3. **无扩展名**：路径中没有 `.` 时依次探测同名文件加各扩展名，找到即 301，否则 404。
//! 4. **缓存命中**：路径是缓存键时直接返回缓存内容。
//! 5. **静态文件或脚本**：文件不存在时，内容根目录为空则返回占位首页，否则 404；
//!    `.php` 文件交给脚本执行器，输出作为 HTML 返回且从不缓存；
//!    其他文件按扩展名设置类型返回，并写入缓存。

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use log::{debug, warn};

use crate::{
    cache::ResponseCache,
    config::Config,
    exception::Exception,
    htaccess::PathMatcher,
    middleware::Handler,
    pages::PageSet,
    param::*,
    request::Request,
    response::Response,
    script::ScriptExecutor,
    util::HtmlBuilder,
};

/// 一次路径解析的结果，只在单个请求内存在。
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedTarget {
    Redirect(String),
    Deny,
    /// 内容根目录为空，返回占位首页
    ServeIndex,
    ServeScript(PathBuf),
    ServeStatic(PathBuf),
    ServeCached(Bytes),
    NotFound,
}

pub struct ContentResolver {
    www_root: PathBuf,
    rules: Box<dyn PathMatcher>,
    cache: Arc<ResponseCache>,
    executor: Box<dyn ScriptExecutor>,
    pages: PageSet,
    server: String,
}

impl ContentResolver {
    pub fn new(
        www_root: &Path,
        pages: PageSet,
        rules: Box<dyn PathMatcher>,
        cache: Arc<ResponseCache>,
        executor: Box<dyn ScriptExecutor>,
        server: &str,
    ) -> Self {
        Self {
            www_root: www_root.to_path_buf(),
            rules,
            cache,
            executor,
            pages,
            server: server.to_string(),
        }
    }

    pub fn from_config(
        config: &Config,
        rules: Box<dyn PathMatcher>,
        cache: Arc<ResponseCache>,
        executor: Box<dyn ScriptExecutor>,
    ) -> Self {
        let www_root = PathBuf::from(config.www_root());
        let pages = PageSet::new(&www_root, Path::new(config.pages_dir()));
        Self::new(
            &www_root,
            pages,
            rules,
            cache,
            executor,
            &config.server_header(),
        )
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn pages(&self) -> &PageSet {
        &self.pages
    }

    /// 决定如何响应`path`。除探测文件是否存在与读取缓存外没有副作用。
    pub fn resolve(&self, path: &str, id: u128) -> ResolvedTarget {
        if self.rules.evaluate(path).is_denied() {
            debug!("[ID{}]访问规则拒绝了路径{}", id, path);
            return ResolvedTarget::Deny;
        }

        if path == "/" {
            for ext in INDEX_EXTENSIONS {
                let candidate = format!("index{}", ext);
                if self.www_root.join(&candidate).exists() {
                    return ResolvedTarget::Redirect(format!("/{}", candidate));
                }
            }
            debug!("[ID{}]内容根目录中没有首页文件", id);
        } else if !path.contains('.') {
            for ext in PROBE_EXTENSIONS {
                let candidate = format!("{}{}", path, ext);
                if self.map_path(&candidate).exists() {
                    return ResolvedTarget::Redirect(candidate);
                }
            }
            return ResolvedTarget::NotFound;
        }

        if let Some(bytes) = self.cache.get(path) {
            debug!("[ID{}]缓存命中：{}", id, path);
            return ResolvedTarget::ServeCached(bytes);
        }

        let file_path = self.map_path(path);
        if !file_path.exists() {
            if self.is_root_empty() {
                debug!("[ID{}]内容根目录为空，返回占位首页", id);
                return ResolvedTarget::ServeIndex;
            }
            return ResolvedTarget::NotFound;
        }
        let is_script = file_path
            .extension()
            .map_or(false, |e| e == SCRIPT_EXTENSION);
        if is_script {
            ResolvedTarget::ServeScript(file_path)
        } else {
            ResolvedTarget::ServeStatic(file_path)
        }
    }

    /// 把解析结果渲染为响应；静态文件读取成功时写入缓存。
    pub fn respond(&self, target: ResolvedTarget, path: &str, id: u128) -> Response {
        match target {
            ResolvedTarget::Deny => Response::forbidden(),
            ResolvedTarget::Redirect(location) => {
                debug!("[ID{}]重定向到{}", id, location);
                Response::redirect(&location)
            }
            ResolvedTarget::ServeIndex => self.pages.placeholder(&self.server),
            ResolvedTarget::ServeCached(bytes) => Response::from_bytes(200, mime_for(path), bytes),
            ResolvedTarget::ServeScript(file) => match self.executor.run(&file, id) {
                Ok(output) => Response::html(200, output),
                Err(Exception::InterpreterNotFound) => Response::html(
                    500,
                    HtmlBuilder::from_status_code(
                        500,
                        Some("The PHP interpreter could not be found on this server, so the script was not executed."),
                    )
                    .build(),
                ),
                Err(e) => {
                    warn!("[ID{}]执行脚本{}失败：{}", id, file.display(), e);
                    self.pages.status_page(500)
                }
            },
            ResolvedTarget::ServeStatic(file) => match fs::read(&file) {
                Ok(content) => {
                    let bytes = Bytes::from(content);
                    if self.cache.put(path, bytes.clone()) {
                        debug!("[ID{}]{}已加入缓存", id, path);
                    }
                    let mime = mime_for(&file.to_string_lossy());
                    Response::from_bytes(200, mime, bytes)
                }
                Err(e) => {
                    warn!("[ID{}]无法读取文件{}：{}", id, file.display(), e);
                    self.pages.status_page(404)
                }
            },
            ResolvedTarget::NotFound => {
                debug!("[ID{}]请求的路径{}不存在，返回404", id, path);
                self.pages.status_page(404)
            }
        }
    }

    fn map_path(&self, path: &str) -> PathBuf {
        let relative = path.trim_start_matches('/');
        if relative.is_empty() {
            return self.www_root.join(DEFAULT_INDEX);
        }
        self.www_root.join(relative)
    }

    fn is_root_empty(&self) -> bool {
        match fs::read_dir(&self.www_root) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => false,
        }
    }
}

impl Handler for ContentResolver {
    fn handle(&self, request: &Request, id: u128) -> Response {
        let path = request.path();
        let target = self.resolve(path, id);
        self.respond(target, path, id)
    }
}
