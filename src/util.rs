// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::param::reason_phrase;

/// 内联 HTML 页面生成器，用于没有任何页面文件可读时的最后兜底。
pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

impl HtmlBuilder {
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let title = format!("{} {}", code, reason_phrase(code));
        let description =
            note.unwrap_or("An error occurred while processing the request.");
        let body = format!(
            r"
            <h1>{} - {}</h1>
            <p>{}</p>
            ",
            code,
            reason_phrase(code),
            description
        );
        Self {
            title,
            css: default_css(),
            body,
        }
    }

    /// 内容根目录为空时展示的欢迎页
    pub fn placeholder(server: &str) -> Self {
        let body = format!(
            r"
            <h1>Welcome to {}</h1>
            <p>The web server is running, but there is no content to serve yet.</p>
            <p>Put your site into the content root to replace this page.</p>
            ",
            server
        );
        Self {
            title: server.to_string(),
            css: default_css(),
            body,
        }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
<html>
    <head>
        <meta charset="utf-8">
        <title>{}</title>
        <style>{}</style>
    </head>
    <body>
    {}
    </body>
</html>"##,
            self.title, self.css, self.body
        )
    }
}

fn default_css() -> String {
    r"
            body {
                width: 35em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            "
    .to_string()
}

/// 永久重定向响应的正文
pub fn redirect_body(location: &str) -> String {
    format!("<a href=\"{}\">Moved Permanently</a>.\n", escape_html(location))
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
