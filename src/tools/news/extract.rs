//! 网页正文提取：GET 页面并用 html2text 转为可读文本
//!
//! GET 请求带超时与浏览器 User-Agent；HTML 响应用 html2text 提取正文（失败时退回简易去标签），
//! 超过 max_chars 时截断并追加 ...[truncated]。提取失败由调用方跳过，不影响回答。

use std::time::Duration;

use async_trait::async_trait;
use html2text::from_read;
use reqwest::Client;

/// 页面正文提取 trait（测试中可替换为假实现）
#[async_trait]
pub trait PageExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> Result<String, String>;
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!") || s.starts_with("<html") || s.starts_with("<HTML")
        || (s.len() > 20 && s.contains('<') && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

/// 按字符数截断
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + "\n...[truncated]"
    } else {
        text.to_string()
    }
}

/// 将页面内容转为纯文本并截断
pub fn page_to_text(body: &str, max_chars: usize) -> String {
    let body = body.strip_prefix('\u{FEFF}').unwrap_or(body);
    let text = if looks_like_html(body) {
        match from_read(body.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(body),
        }
    } else {
        body.to_string()
    };
    truncate_chars(text.trim(), max_chars)
}

/// 基于 reqwest + html2text 的正文提取
pub struct HtmlExtractor {
    client: Client,
    max_chars: usize,
}

impl HtmlExtractor {
    pub fn new(timeout_secs: u64, max_chars: usize) -> Self {
        const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client, max_chars }
    }
}

#[async_trait]
impl PageExtractor for HtmlExtractor {
    async fn extract(&self, url: &str) -> Result<String, String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;
        let text = page_to_text(&body, self.max_chars);
        if text.is_empty() {
            return Err("No readable content".to_string());
        }
        Ok(text)
    }
}
