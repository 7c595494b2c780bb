//! News 工具：搜索 + 正文提取 + LLM 合成回答，带回答缓存
//!
//! 流程：规范化查询命中缓存则直接返回；否则按顺序尝试搜索提供方（每个最多 max_retries 次，
//! 出错或零结果都算失败），取前 top_k 条结果提取正文（失败跳过，仍保留摘要），
//! 拼 prompt 交给新闻合成模型，回答写入缓存后返回。
//! 只有全部提供方失败或合成调用失败时才返回 ExternalService。

pub mod cache;
pub mod extract;
pub mod search;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::ToolError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::Tool;

pub use cache::{normalize_query, ResponseCache, DEFAULT_CACHE_TTL_SECS};
pub use extract::{HtmlExtractor, PageExtractor};
pub use search::{
    BingRapidApi, GoogleCustomSearch, SearchHit, SearchProvider, SerpApi, SerpStack,
};

const NEWS_SYSTEM_PROMPT: &str =
    "You are an AI assistant designed to answer questions based on provided context.";

pub const DEFAULT_MAX_RETRIES: usize = 3;
pub const DEFAULT_TOP_K: usize = 3;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_SYNTHESIS_TIMEOUT_SECS: u64 = 60;

/// 一条用于合成的来源
#[derive(Debug, Clone)]
struct NewsSource {
    hit: SearchHit,
    content: Option<String>,
}

/// 依次尝试提供方，返回第一个非空结果；全部失败时汇总各自原因
pub async fn search_with_fallback(
    providers: &[Arc<dyn SearchProvider>],
    query: &str,
    max_retries: usize,
) -> Result<Vec<SearchHit>, ToolError> {
    if providers.is_empty() {
        return Err(ToolError::ExternalService(
            "no search provider configured".to_string(),
        ));
    }
    let mut failures = Vec::new();
    for provider in providers {
        for attempt in 1..=max_retries.max(1) {
            match provider.search(query).await {
                Ok(hits) if !hits.is_empty() => {
                    tracing::info!(provider = %provider.name(), hits = hits.len(), attempt, "news search ok");
                    return Ok(hits);
                }
                Ok(_) => {
                    tracing::warn!(provider = %provider.name(), attempt, "news search returned no results");
                    failures.push(format!("{}: no results", provider.name()));
                }
                Err(e) => {
                    tracing::warn!(provider = %provider.name(), attempt, error = %e, "news search failed");
                    failures.push(e.to_string());
                }
            }
        }
    }
    failures.dedup();
    Err(ToolError::ExternalService(format!(
        "all search providers failed ({})",
        failures.join("; ")
    )))
}

fn build_prompt(question: &str, sources: &[NewsSource]) -> String {
    let sources_block = sources
        .iter()
        .map(|s| {
            let mut block = format!(
                "Source:\nTitle: {}\nURL: {}\nSnippet: {}",
                s.hit.title, s.hit.url, s.hit.snippet
            );
            if let Some(content) = &s.content {
                block.push_str(&format!("\nContent: {}", content));
            }
            block
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Use the following sources to answer the question:\n\n{}\n\nQuestion: {}\n\nAnswer:",
        sources_block, question
    )
}

/// News 工具：搜索提供方链、正文提取器、合成模型与回答缓存
pub struct NewsTool {
    providers: Vec<Arc<dyn SearchProvider>>,
    extractor: Arc<dyn PageExtractor>,
    llm: Arc<dyn LlmClient>,
    cache: ResponseCache,
    max_retries: usize,
    top_k: usize,
    request_timeout: Duration,
    synthesis_timeout: Duration,
}

impl NewsTool {
    pub fn new(llm: Arc<dyn LlmClient>, extractor: Arc<dyn PageExtractor>, cache: ResponseCache) -> Self {
        Self {
            providers: Vec::new(),
            extractor,
            llm,
            cache,
            max_retries: DEFAULT_MAX_RETRIES,
            top_k: DEFAULT_TOP_K,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            synthesis_timeout: Duration::from_secs(DEFAULT_SYNTHESIS_TIMEOUT_SECS),
        }
    }

    /// 追加一个搜索提供方（添加顺序即回退顺序）
    pub fn with_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    /// 单次搜索 / 抓取请求超时与合成调用超时（秒），用于计算整体执行预算
    pub fn with_timeouts(mut self, request_secs: u64, synthesis_secs: u64) -> Self {
        self.request_timeout = Duration::from_secs(request_secs);
        self.synthesis_timeout = Duration::from_secs(synthesis_secs);
        self
    }

    /// 最坏情况耗时：每个提供方重试到上限、top_k 个页面全部超时、再加一次合成
    pub fn worst_case_duration(&self) -> Duration {
        let requests = self.max_retries * self.providers.len() + self.top_k;
        self.request_timeout
            .saturating_mul(u32::try_from(requests).unwrap_or(u32::MAX))
            .saturating_add(self.synthesis_timeout)
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    async fn collect_sources(&self, hits: Vec<SearchHit>) -> Vec<NewsSource> {
        let mut sources = Vec::with_capacity(self.top_k);
        for hit in hits.into_iter().take(self.top_k) {
            let content = match self.extractor.extract(&hit.url).await {
                Ok(text) => Some(text),
                Err(e) => {
                    tracing::warn!(url = %hit.url, error = %e, "content extraction skipped");
                    None
                }
            };
            sources.push(NewsSource { hit, content });
        }
        sources
    }

    async fn answer(&self, question: &str) -> Result<String, ToolError> {
        let hits = search_with_fallback(&self.providers, question, self.max_retries).await?;
        let sources = self.collect_sources(hits).await;
        let messages = vec![
            Message::system(NEWS_SYSTEM_PROMPT),
            Message::user(build_prompt(question, &sources)),
        ];
        let answer = tokio::time::timeout(self.synthesis_timeout, self.llm.complete(&messages))
            .await
            .map_err(|_| {
                ToolError::ExternalService(format!(
                    "news synthesis timed out after {}s",
                    self.synthesis_timeout.as_secs()
                ))
            })?
            .map_err(|e| ToolError::ExternalService(format!("news synthesis failed: {}", e)))?;
        let answer = answer.trim().to_string();
        if answer.is_empty() {
            return Err(ToolError::ExternalService(
                "news synthesis returned an empty answer".to_string(),
            ));
        }
        Ok(answer)
    }
}

#[async_trait]
impl Tool for NewsTool {
    fn name(&self) -> &str {
        "news"
    }

    fn description(&self) -> &str {
        "Search the web for recent news and answer a question from the retrieved sources. Args: {\"query\": \"the news question\"}"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text news question, e.g. \"latest Mars mission news\""
                }
            },
            "required": ["query"]
        })
    }

    fn timeout_budget(&self) -> Option<Duration> {
        Some(self.worst_case_duration())
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let question = args
            .get("query")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::InvalidArgument("missing 'query'".to_string()))?;

        let key = normalize_query(question);
        if let Some(hit) = self.cache.get(&key) {
            tracing::info!(query = %key, "news cache hit");
            return Ok(hit);
        }
        tracing::info!(query = %key, "news cache miss");

        let answer = self.answer(question).await?;
        if let Err(e) = self.cache.set(&key, &answer) {
            tracing::warn!(error = %e, "news cache write failed");
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::llm::MockLlmClient;

    /// 假搜索提供方：固定返回结果或错误，并计数
    struct FakeProvider {
        name: &'static str,
        result: Result<Vec<SearchHit>, ToolError>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn ok(name: &'static str, hits: Vec<SearchHit>) -> Arc<Self> {
            Arc::new(Self { name, result: Ok(hits), calls: AtomicUsize::new(0) })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                result: Err(ToolError::ExternalService(format!("{name}: HTTP 503"))),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SearchProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    /// 假提取器：URL 含 "broken" 时失败
    struct FakeExtractor;

    #[async_trait]
    impl PageExtractor for FakeExtractor {
        async fn extract(&self, url: &str) -> Result<String, String> {
            if url.contains("broken") {
                Err("HTTP 404".to_string())
            } else {
                Ok(format!("full article at {url}"))
            }
        }
    }

    fn hit(n: usize) -> SearchHit {
        SearchHit {
            title: format!("Story {n}"),
            url: format!("https://news.example/{n}"),
            snippet: format!("snippet {n}"),
        }
    }

    fn tool(llm: Arc<MockLlmClient>, providers: Vec<Arc<FakeProvider>>) -> NewsTool {
        let mut tool = NewsTool::new(llm, Arc::new(FakeExtractor), ResponseCache::in_memory(3600))
            .with_max_retries(2)
            .with_top_k(2);
        for p in providers {
            tool = tool.with_provider(p);
        }
        tool
    }

    #[tokio::test]
    async fn test_second_identical_query_served_from_cache() {
        let llm = Arc::new(MockLlmClient::with_responses(["Rover landed."]));
        let primary = FakeProvider::ok("bing", vec![hit(1)]);
        let news = tool(llm.clone(), vec![primary.clone()]);

        let first = news.execute(json!({"query": "Mars rover news?"})).await.unwrap();
        let second = news.execute(json!({"query": "  mars ROVER news "})).await.unwrap();

        assert_eq!(first, "Rover landed.");
        assert_eq!(second, first);
        assert_eq!(primary.calls(), 1);
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_secondary_after_retries() {
        let llm = Arc::new(MockLlmClient::with_responses(["From google."]));
        let primary = FakeProvider::failing("bing");
        let secondary = FakeProvider::ok("google", vec![hit(1)]);
        let news = tool(llm, vec![primary.clone(), secondary.clone()]);

        let answer = news.execute(json!({"query": "election"})).await.unwrap();
        assert_eq!(answer, "From google.");
        assert_eq!(primary.calls(), 2);
        assert_eq!(secondary.calls(), 1);
    }

    /// 每次搜索先等待一段时间再失败
    struct SlowFailing {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SearchProvider for SlowFailing {
        fn name(&self) -> &str {
            "bing"
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Err(ToolError::ExternalService("bing: timed out".to_string()))
        }
    }

    #[test]
    fn test_worst_case_duration() {
        let llm = Arc::new(MockLlmClient::new());
        let news = tool(llm, vec![FakeProvider::failing("bing"), FakeProvider::failing("google")])
            .with_timeouts(15, 60);
        // 2 次重试 x 2 个提供方 + top_k 2 个页面，每次 15s，再加 60s 合成
        assert_eq!(news.worst_case_duration(), Duration::from_secs(6 * 15 + 60));
    }

    #[tokio::test]
    async fn test_executor_timeout_does_not_cut_fallback_chain() {
        use crate::tools::{ToolExecutor, ToolRegistry};

        let slow = Arc::new(SlowFailing {
            delay: Duration::from_millis(450),
            calls: AtomicUsize::new(0),
        });
        let secondary = FakeProvider::ok("google", vec![hit(1)]);
        let news = NewsTool::new(
            Arc::new(MockLlmClient::with_responses(["From google."])),
            Arc::new(FakeExtractor),
            ResponseCache::in_memory(3600),
        )
        .with_provider(slow.clone())
        .with_provider(secondary.clone())
        .with_max_retries(3)
        .with_timeouts(1, 1);

        let mut registry = ToolRegistry::new();
        registry.register(news);
        let executor = ToolExecutor::new(registry, 1);

        let result = executor.run("news", json!({"query": "election"})).await;
        assert_eq!(result.outcome, Ok("From google.".to_string()));
        assert_eq!(slow.calls.load(Ordering::SeqCst), 3);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_results_count_as_failure() {
        let llm = Arc::new(MockLlmClient::with_responses(["ok"]));
        let empty = FakeProvider::ok("bing", vec![]);
        let secondary = FakeProvider::ok("google", vec![hit(1)]);
        let news = tool(llm, vec![empty.clone(), secondary.clone()]);

        news.execute(json!({"query": "q"})).await.unwrap();
        assert_eq!(empty.calls(), 2);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let llm = Arc::new(MockLlmClient::new());
        let news = tool(
            llm.clone(),
            vec![FakeProvider::failing("bing"), FakeProvider::failing("google")],
        );

        let err = news.execute(json!({"query": "anything"})).await.unwrap_err();
        match err {
            ToolError::ExternalService(msg) => {
                assert!(msg.contains("bing: HTTP 503"));
                assert!(msg.contains("google: HTTP 503"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_extraction_failure_degrades_and_top_k_applies() {
        let llm = Arc::new(MockLlmClient::with_responses(["answer"]));
        let broken = SearchHit {
            title: "Broken".to_string(),
            url: "https://news.example/broken".to_string(),
            snippet: "still usable snippet".to_string(),
        };
        let provider = FakeProvider::ok("bing", vec![broken, hit(2), hit(3)]);
        let news = tool(llm.clone(), vec![provider]);

        news.execute(json!({"query": "q"})).await.unwrap();

        let prompt = llm.call(0).unwrap()[1].content.clone();
        assert!(prompt.contains("still usable snippet"));
        assert!(!prompt.contains("full article at https://news.example/broken"));
        assert!(prompt.contains("full article at https://news.example/2"));
        assert!(!prompt.contains("Story 3"));
        assert!(prompt.ends_with("Question: q\n\nAnswer:"));
    }

    #[tokio::test]
    async fn test_synthesis_failure_not_cached() {
        let llm = Arc::new(MockLlmClient::new());
        llm.push_response(Err("401 invalid key".to_string()));
        llm.push_response(Ok("second try".to_string()));
        let news = tool(llm, vec![FakeProvider::ok("bing", vec![hit(1)])]);

        let err = news.execute(json!({"query": "q"})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExternalService(_)));
        assert_eq!(news.execute(json!({"query": "q"})).await.unwrap(), "second try");
    }

    #[tokio::test]
    async fn test_no_providers_configured() {
        let err = search_with_fallback(&[], "q", 3).await.unwrap_err();
        assert!(matches!(err, ToolError::ExternalService(_)));
    }
}
