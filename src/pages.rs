// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 状态页面
//!
//! 错误页与占位首页都按同一套三级回退取得：
//! 站点自定义页面（内容根目录下的 `<code>.html`）→ 内置页面 → 内联 HTML 文本。

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{param::PLACEHOLDER_PAGE, response::Response, util::HtmlBuilder};

/// 按三级回退读取页面并生成给定状态码的 HTML 响应。
///
/// `custom` 为 `None` 时跳过第一级。
pub fn resolve_page(
    custom: Option<&Path>,
    builtin: &Path,
    inline_fallback: &str,
    status: u16,
) -> Response {
    if let Some(custom) = custom {
        match fs::read(custom) {
            Ok(content) => return Response::html(status, content),
            Err(_) => debug!("自定义{}页面{}不存在", status, custom.display()),
        }
    }
    match fs::read(builtin) {
        Ok(content) => Response::html(status, content),
        Err(_) => {
            warn!(
                "内置{}页面{}不存在，返回内联页面",
                status,
                builtin.display()
            );
            Response::html(status, inline_fallback.to_string())
        }
    }
}

/// 某个站点的页面来源：内容根目录与内置页面目录
#[derive(Debug, Clone)]
pub struct PageSet {
    www_root: PathBuf,
    builtin_dir: PathBuf,
}

impl PageSet {
    pub fn new(www_root: &Path, builtin_dir: &Path) -> Self {
        Self {
            www_root: www_root.to_path_buf(),
            builtin_dir: builtin_dir.to_path_buf(),
        }
    }

    /// 带三级回退的状态页（404、500、505 等）
    pub fn status_page(&self, code: u16) -> Response {
        let custom = self.www_root.join(format!("{}.html", code));
        let builtin = self.builtin_dir.join(format!("hammy-{}.html", code));
        let inline = HtmlBuilder::from_status_code(code, inline_note(code)).build();
        resolve_page(Some(&custom), &builtin, &inline, code)
    }

    /// 内容根目录为空时的欢迎页
    pub fn placeholder(&self, server: &str) -> Response {
        let builtin = self.builtin_dir.join(PLACEHOLDER_PAGE);
        let inline = HtmlBuilder::placeholder(server).build();
        resolve_page(None, &builtin, &inline, 200)
    }
}

fn inline_note(code: u16) -> Option<&'static str> {
    match code {
        404 => Some("404 - File Not Found"),
        500 => Some("500 - Internal Server Error"),
        505 => Some("505 - HTTP Version Not Supported"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    struct Dirs {
        root: tempfile::TempDir,
        builtin: tempfile::TempDir,
    }

    fn dirs() -> Dirs {
        Dirs {
            root: tempfile::tempdir().unwrap(),
            builtin: tempfile::tempdir().unwrap(),
        }
    }

    #[test]
    fn test_custom_page_wins() {
        let d = dirs();
        fs::write(d.root.path().join("404.html"), "custom 404").unwrap();
        fs::write(d.builtin.path().join("hammy-404.html"), "builtin 404").unwrap();
        let pages = PageSet::new(d.root.path(), d.builtin.path());

        let response = pages.status_page(404);
        assert_eq!(response.status_code(), 404);
        assert_eq!(response.content(), &Bytes::from("custom 404"));
        assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn test_builtin_page_second() {
        let d = dirs();
        fs::write(d.builtin.path().join("hammy-500.html"), "builtin 500").unwrap();
        let pages = PageSet::new(d.root.path(), d.builtin.path());

        let response = pages.status_page(500);
        assert_eq!(response.status_code(), 500);
        assert_eq!(response.content(), &Bytes::from("builtin 500"));
    }

    #[test]
    fn test_inline_fallback_last() {
        let d = dirs();
        let pages = PageSet::new(d.root.path(), d.builtin.path());

        let response = pages.status_page(505);
        assert_eq!(response.status_code(), 505);
        let body = String::from_utf8(response.content().to_vec()).unwrap();
        assert!(body.contains("505 - HTTP Version Not Supported"));
        assert!(body.contains("<html>"));
    }

    #[test]
    fn test_placeholder_skips_custom_tier() {
        let d = dirs();
        let pages = PageSet::new(d.root.path(), d.builtin.path());
        let response = pages.placeholder("HAMMY v1.01");
        assert_eq!(response.status_code(), 200);
        let body = String::from_utf8(response.content().to_vec()).unwrap();
        assert!(body.contains("Welcome to HAMMY v1.01"));

        fs::write(d.builtin.path().join(PLACEHOLDER_PAGE), "hello").unwrap();
        assert_eq!(
            pages.placeholder("HAMMY").content(),
            &Bytes::from("hello")
        );
    }
}
