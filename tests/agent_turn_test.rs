//! Agent 单轮编排集成测试（Mock LLM + 假工具，无网络）

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use herald::core::{AgentError, ToolError, TurnPhase};
use herald::llm::{LlmClient, MockLlmClient};
use herald::memory::{Memory, Source};
use herald::planner::{Planner, DEFAULT_SYSTEM_PROMPT};
use herald::tools::news::{PageExtractor, ResponseCache, SearchHit, SearchProvider};
use herald::tools::{NewsTool, TimeTool, Tool, ToolExecutor, ToolRegistry};
use herald::Agent;
use serde_json::Value;

/// 记录调用顺序的假工具；fail=true 时返回 ExternalService
struct Recorder {
    name: &'static str,
    fail: bool,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Tool for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "records its invocation"
    }

    async fn execute(&self, _args: Value) -> Result<String, ToolError> {
        self.log.lock().unwrap().push(self.name.to_string());
        if self.fail {
            Err(ToolError::ExternalService(format!("{} backend down", self.name)))
        } else {
            Ok(format!("{} ok", self.name))
        }
    }
}

fn agent_with(llm: Arc<MockLlmClient>, registry: ToolRegistry, capacity: usize) -> Agent {
    let planner = Planner::new(llm as Arc<dyn LlmClient>, DEFAULT_SYSTEM_PROMPT);
    Agent::new(planner, ToolExecutor::new(registry, 5), Memory::new(capacity))
}

fn recorders(log: &Arc<Mutex<Vec<String>>>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Recorder {
        name: "a",
        fail: true,
        log: log.clone(),
    });
    registry.register(Recorder {
        name: "b",
        fail: false,
        log: log.clone(),
    });
    registry
}

fn prompt_text(llm: &MockLlmClient, call: usize) -> String {
    llm.call(call)
        .unwrap()
        .iter()
        .map(|m| m.content.clone())
        .collect::<Vec<_>>()
        .join("\n")
}

#[tokio::test]
async fn test_direct_answer_runs_no_tools() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let llm = Arc::new(MockLlmClient::with_responses(["Hello! How can I help?"]));
    let mut agent = agent_with(llm.clone(), recorders(&log), 10);

    let answer = agent.handle("hi").await;

    assert_eq!(answer, "Hello! How can I help?");
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(llm.call_count(), 1);
    let sources: Vec<Source> = agent.memory().items().map(|i| i.source()).collect();
    assert_eq!(sources, vec![Source::User, Source::Agent]);
    assert_eq!(agent.phase(), TurnPhase::Idle);
}

#[tokio::test]
async fn test_tools_run_in_order_and_failure_does_not_abort() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let llm = Arc::new(MockLlmClient::with_responses([
        r#"{"tool_calls": [{"tool": "a", "args": {}}, {"tool": "b", "args": {}}]}"#,
        "B says ok, A is unavailable.",
    ]));
    let mut agent = agent_with(llm.clone(), recorders(&log), 10);

    let answer = agent.handle("use a then b").await;

    assert_eq!(answer, "B says ok, A is unavailable.");
    assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    let synthesis = prompt_text(&llm, 1);
    assert!(synthesis.contains("tool a unavailable"));
    assert!(synthesis.contains("a backend down"));
    assert!(synthesis.contains("Result from b"));
    assert!(synthesis.find("tool a").unwrap() < synthesis.find("Result from b").unwrap());
}

#[tokio::test]
async fn test_unknown_tool_becomes_failed_result() {
    let llm = Arc::new(MockLlmClient::with_responses([
        r#"{"tool": "teleport", "args": {"to": "Mars"}}"#,
        "I can't teleport you, sorry.",
    ]));
    let mut agent = agent_with(llm.clone(), ToolRegistry::new(), 10);

    let answer = agent.handle("teleport me to Mars").await;

    assert_eq!(answer, "I can't teleport you, sorry.");
    assert!(prompt_text(&llm, 1).contains("tool teleport unavailable"));
    assert_eq!(agent.memory().len(), 2);
}

#[tokio::test]
async fn test_time_question_end_to_end() {
    let llm = Arc::new(MockLlmClient::with_responses([
        "```json\n{\"tool_calls\": [{\"tool\": \"time\", \"args\": {\"timezone\": \"America/New_York\"}}]}\n```",
        "It is currently evening in New York.",
    ]));
    let mut registry = ToolRegistry::new();
    registry.register(TimeTool::new());
    let mut agent = agent_with(llm.clone(), registry, 10);

    let answer = agent.handle("What time is it in New York?").await;

    assert_eq!(answer, "It is currently evening in New York.");
    let decision = prompt_text(&llm, 0);
    assert!(decision.contains("- time:"));
    assert!(decision.contains("What time is it in New York?"));
    assert!(prompt_text(&llm, 1).contains("Current time in America/New_York"));

    let items: Vec<_> = agent.memory().items().collect();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].content(), "What time is it in New York?");
    assert_eq!(items[1].content(), "It is currently evening in New York.");
}

#[tokio::test]
async fn test_missing_required_argument_reaches_synthesis() {
    let llm = Arc::new(MockLlmClient::with_responses([
        r#"{"tool": "time", "args": {}}"#,
        "Which timezone do you mean?",
    ]));
    let mut registry = ToolRegistry::new();
    registry.register(TimeTool::new());
    let mut agent = agent_with(llm.clone(), registry, 10);

    let answer = agent.handle("what time is it").await;

    assert_eq!(answer, "Which timezone do you mean?");
    let synthesis = prompt_text(&llm, 1);
    assert!(synthesis.contains("tool time unavailable"));
    assert!(synthesis.contains("Invalid argument"));
}

#[tokio::test]
async fn test_decision_failure_is_terminal_and_not_recorded() {
    let llm = Arc::new(MockLlmClient::new());
    llm.push_response(Err("429 rate limited".to_string()));
    let mut agent = agent_with(llm.clone(), ToolRegistry::new(), 10);

    let answer = agent.handle("hello?").await;

    assert!(answer.starts_with("Sorry, I couldn't complete that request"));
    assert!(answer.contains("429 rate limited"));
    let sources: Vec<Source> = agent.memory().items().map(|i| i.source()).collect();
    assert_eq!(sources, vec![Source::User]);
    assert_eq!(agent.phase(), TurnPhase::Idle);
}

#[tokio::test]
async fn test_synthesis_failure_is_terminal() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let llm = Arc::new(MockLlmClient::with_responses([r#"{"tool": "b", "args": {}}"#]));
    llm.push_response(Err("connection reset".to_string()));
    let mut agent = agent_with(llm.clone(), recorders(&log), 10);

    let err = agent.try_handle("use b").await.unwrap_err();

    assert!(matches!(err, AgentError::ExternalService(ref m) if m.contains("connection reset")));
    assert_eq!(*log.lock().unwrap(), vec!["b"]);
    assert_eq!(agent.memory().len(), 1);
    assert_eq!(agent.phase(), TurnPhase::Idle);
}

#[tokio::test]
async fn test_unparsable_decision_falls_back_to_raw_text() {
    let raw = r#"Sure thing! {"mood": "cheerful"} Have a nice day."#;
    let llm = Arc::new(MockLlmClient::with_responses([raw]));
    let mut agent = agent_with(llm.clone(), ToolRegistry::new(), 10);

    let answer = agent.try_handle("cheer me up").await.unwrap();

    assert_eq!(answer, raw);
    assert_eq!(llm.call_count(), 1);
    assert_eq!(agent.memory().items().last().unwrap().content(), raw);
}

#[tokio::test]
async fn test_empty_decision_output_is_terminal() {
    let llm = Arc::new(MockLlmClient::with_responses(["   "]));
    let mut agent = agent_with(llm, ToolRegistry::new(), 10);

    let err = agent.try_handle("anything").await.unwrap_err();
    assert!(matches!(err, AgentError::ExternalService(_)));
    assert_eq!(agent.memory().len(), 1);
}

#[tokio::test]
async fn test_memory_is_bounded_and_feeds_next_decision() {
    let llm = Arc::new(MockLlmClient::with_responses(["first answer", "second answer", "third answer"]));
    let mut agent = agent_with(llm.clone(), ToolRegistry::new(), 3);

    agent.handle("first question").await;
    agent.handle("second question").await;
    agent.handle("third question").await;

    let contents: Vec<&str> = agent.memory().items().map(|i| i.content()).collect();
    assert_eq!(contents, vec!["second answer", "third question", "third answer"]);
    assert!(prompt_text(&llm, 1).contains("agent: first answer"));

    agent.clear_memory();
    assert!(agent.memory().is_empty());
}

struct ScriptedProvider {
    name: &'static str,
    result: Result<Vec<SearchHit>, ToolError>,
    calls: AtomicUsize,
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

struct DeadExtractor;

#[async_trait]
impl PageExtractor for DeadExtractor {
    async fn extract(&self, url: &str) -> Result<String, String> {
        Err(format!("{} blocked", url))
    }
}

#[tokio::test]
async fn test_news_question_uses_fallback_provider_and_snippets() {
    let primary = Arc::new(ScriptedProvider {
        name: "bing",
        result: Err(ToolError::ExternalService("bing: HTTP 503".to_string())),
        calls: AtomicUsize::new(0),
    });
    let secondary = Arc::new(ScriptedProvider {
        name: "serpapi",
        result: Ok(vec![SearchHit {
            title: "Rust 2027 edition announced".to_string(),
            url: "https://blog.example.org/rust-2027".to_string(),
            snippet: "The Rust project announced the next edition.".to_string(),
        }]),
        calls: AtomicUsize::new(0),
    });
    let news_llm = Arc::new(MockLlmClient::with_responses([
        "The Rust project announced its next edition.",
    ]));
    let news = NewsTool::new(
        news_llm.clone() as Arc<dyn LlmClient>,
        Arc::new(DeadExtractor),
        ResponseCache::in_memory(60),
    )
    .with_provider(primary.clone())
    .with_provider(secondary.clone())
    .with_max_retries(2);

    let mut registry = ToolRegistry::new();
    registry.register(news);
    let llm = Arc::new(MockLlmClient::with_responses([
        r#"{"tool": "news", "args": {"query": "latest Rust news"}}"#,
        "Big news: the Rust project announced its next edition.",
    ]));
    let mut agent = agent_with(llm.clone(), registry, 10);

    let answer = agent.handle("What's the latest Rust news?").await;

    assert_eq!(answer, "Big news: the Rust project announced its next edition.");
    assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    assert!(prompt_text(&news_llm, 0).contains("The Rust project announced the next edition."));
    assert!(prompt_text(&llm, 1).contains("Result from news"));

    // 第二次相同问题命中缓存，不再搜索
    llm.push_response(Ok(r#"{"tool": "news", "args": {"query": "Latest Rust news?"}}"#.to_string()));
    llm.push_response(Ok("Same as before.".to_string()));
    agent.handle("Any Rust news again?").await;
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
    assert_eq!(news_llm.call_count(), 1);
}
