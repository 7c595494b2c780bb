//! 搜索提供方：Bing（RapidAPI）、Google Custom Search、SerpApi、Serpstack
//!
//! 每个提供方把各自的 JSON 响应解析为统一的 SearchHit 列表；网络错误、非 2xx、格式错误均为 ExternalService。
//! 解析函数与 HTTP 调用分开，便于用固定 JSON 测试。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::core::ToolError;

/// 统一的搜索结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// 搜索提供方 trait：按顺序组成回退链
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError>;
}

fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_default()
}

/// 发送请求并解析 JSON；provider 仅用于错误信息
async fn send_json(provider: &str, request: RequestBuilder) -> Result<Value, ToolError> {
    let resp = request
        .send()
        .await
        .map_err(|e| ToolError::ExternalService(format!("{}: request failed: {}", provider, e)))?;
    if !resp.status().is_success() {
        return Err(ToolError::ExternalService(format!(
            "{}: HTTP {}",
            provider,
            resp.status()
        )));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| ToolError::ExternalService(format!("{}: malformed response: {}", provider, e)))
}

/// 从 items 数组中按字段名提取 (title, url, snippet)；缺少 url 的条目跳过
fn collect_hits(items: Option<&Value>, title_key: &str, url_key: &str) -> Vec<SearchHit> {
    items
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|item| {
                    let url = item.get(url_key)?.as_str()?.to_string();
                    Some(SearchHit {
                        title: item
                            .get(title_key)
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        url,
                        snippet: item
                            .get("snippet")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Bing Web Search（经 RapidAPI）：webPages.value[] {name, url, snippet}
pub fn parse_bing(body: &Value) -> Vec<SearchHit> {
    collect_hits(body.pointer("/webPages/value"), "name", "url")
}

/// Google Custom Search JSON API：items[] {title, link, snippet}
pub fn parse_google(body: &Value) -> Vec<SearchHit> {
    collect_hits(body.get("items"), "title", "link")
}

/// SerpApi：organic_results[] {title, link, snippet}
pub fn parse_serpapi(body: &Value) -> Result<Vec<SearchHit>, ToolError> {
    if let Some(err) = body.get("error").and_then(|e| e.as_str()) {
        return Err(ToolError::ExternalService(format!("serpapi: {}", err)));
    }
    Ok(collect_hits(body.get("organic_results"), "title", "link"))
}

/// Serpstack：organic_results[] {title, url, snippet}；失败时 200 + {"success": false, "error": {...}}
pub fn parse_serpstack(body: &Value) -> Result<Vec<SearchHit>, ToolError> {
    if body.get("success").and_then(|s| s.as_bool()) == Some(false) {
        let info = body
            .pointer("/error/info")
            .and_then(|v| v.as_str())
            .unwrap_or("request rejected");
        return Err(ToolError::ExternalService(format!("serpstack: {}", info)));
    }
    Ok(collect_hits(body.get("organic_results"), "title", "url"))
}

/// Bing（RapidAPI）主搜索
pub struct BingRapidApi {
    client: Client,
    api_key: String,
}

impl BingRapidApi {
    pub const ENDPOINT: &'static str = "https://bing-web-search1.p.rapidapi.com/search";
    const HOST: &'static str = "bing-web-search1.p.rapidapi.com";

    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for BingRapidApi {
    fn name(&self) -> &str {
        "bing"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        let request = self
            .client
            .get(Self::ENDPOINT)
            .header("X-RapidAPI-Key", &self.api_key)
            .header("X-RapidAPI-Host", Self::HOST)
            .query(&[("q", query), ("mkt", "en-US")]);
        Ok(parse_bing(&send_json(self.name(), request).await?))
    }
}

/// Google Custom Search JSON API
pub struct GoogleCustomSearch {
    client: Client,
    api_key: String,
    cx: String,
}

impl GoogleCustomSearch {
    pub const ENDPOINT: &'static str = "https://www.googleapis.com/customsearch/v1";

    pub fn new(api_key: impl Into<String>, cx: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key: api_key.into(),
            cx: cx.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for GoogleCustomSearch {
    fn name(&self) -> &str {
        "google"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        let request = self.client.get(Self::ENDPOINT).query(&[
            ("q", query),
            ("key", self.api_key.as_str()),
            ("cx", self.cx.as_str()),
        ]);
        Ok(parse_google(&send_json(self.name(), request).await?))
    }
}

/// SerpApi（Google 引擎）
pub struct SerpApi {
    client: Client,
    api_key: String,
}

impl SerpApi {
    pub const ENDPOINT: &'static str = "https://serpapi.com/search.json";

    pub fn new(api_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for SerpApi {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        let request = self.client.get(Self::ENDPOINT).query(&[
            ("q", query),
            ("engine", "google"),
            ("api_key", self.api_key.as_str()),
        ]);
        parse_serpapi(&send_json(self.name(), request).await?)
    }
}

/// Serpstack
pub struct SerpStack {
    client: Client,
    access_key: String,
}

impl SerpStack {
    pub const ENDPOINT: &'static str = "https://api.serpstack.com/search";

    pub fn new(access_key: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: http_client(timeout_secs),
            access_key: access_key.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for SerpStack {
    fn name(&self) -> &str {
        "serpstack"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        let request = self.client.get(Self::ENDPOINT).query(&[
            ("access_key", self.access_key.as_str()),
            ("query", query),
        ]);
        parse_serpstack(&send_json(self.name(), request).await?)
    }
}
