//! Agent 运行时
//!
//! Agent 独占 Memory 与工具执行器，驱动单轮对话：
//! 记录用户输入 -> decide -> 直接回答，或按序执行工具（失败转为 ToolResult，不中止）-> synthesize
//! -> 记录回答 -> 返回。LLM 自身调用失败时本轮终止，返回给用户的错误提示不会写入记忆。
//! build_agent 按配置与 API Key 装配 LLM、工具与记忆。

use std::path::Path;
use std::sync::Arc;

use crate::config::{ApiKeys, AppConfig, LlmProvider};
use crate::core::{AgentError, TurnPhase};
use crate::llm::{create_groq_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::memory::{Memory, Source};
use crate::planner::{Decision, Planner, DEFAULT_SYSTEM_PROMPT};
use crate::tools::news::{
    BingRapidApi, GoogleCustomSearch, HtmlExtractor, ResponseCache, SerpApi, SerpStack,
};
use crate::tools::weather::Units;
use crate::tools::{NewsTool, TimeTool, ToolDescriptor, ToolExecutor, ToolRegistry, WeatherTool};

/// 对话式编排 Agent
pub struct Agent {
    planner: Planner,
    executor: ToolExecutor,
    memory: Memory,
    phase: TurnPhase,
}

impl Agent {
    pub fn new(planner: Planner, executor: ToolExecutor, memory: Memory) -> Self {
        Self {
            planner,
            executor,
            memory,
            phase: TurnPhase::Idle,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn clear_memory(&mut self) {
        self.memory.clear();
    }

    pub fn tool_catalog(&self) -> Vec<ToolDescriptor> {
        self.executor.descriptors()
    }

    fn transition(&mut self, next: TurnPhase) {
        if !self.phase.can_transition_to(next) {
            tracing::warn!(from = %self.phase, to = %next, "unexpected phase transition");
        }
        tracing::debug!(from = %self.phase, to = %next, "phase");
        self.phase = next;
    }

    /// 处理一轮对话；LLM 调用失败时返回面向用户的错误提示
    pub async fn handle(&mut self, utterance: &str) -> String {
        match self.try_handle(utterance).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                format!("Sorry, I couldn't complete that request: {}", e)
            }
        }
    }

    /// 处理一轮对话；Err 仅来自 LLM 客户端本身（决策或汇总），此时回答不写入记忆
    pub async fn try_handle(&mut self, utterance: &str) -> Result<String, AgentError> {
        let result = self.run_turn(utterance.trim()).await;
        self.transition(TurnPhase::Idle);
        result
    }

    async fn run_turn(&mut self, utterance: &str) -> Result<String, AgentError> {
        self.memory.record(Source::User, utterance);

        self.transition(TurnPhase::AwaitingDecision);
        let catalog = self.executor.descriptors();
        let decision = match self
            .planner
            .decide(utterance, &self.memory.context(), &catalog)
            .await
        {
            Ok(d) => d,
            Err(AgentError::ResponseParse { raw, reason }) => {
                tracing::warn!(reason = %reason, "decision unparsable, using raw model text as answer");
                if raw.trim().is_empty() {
                    return Err(AgentError::ExternalService(
                        "language model returned an empty response".to_string(),
                    ));
                }
                Decision::NoToolNeeded(raw.trim().to_string())
            }
            Err(e) => return Err(e),
        };

        let answer = match decision {
            Decision::NoToolNeeded(answer) => {
                self.transition(TurnPhase::DirectAnswer);
                answer
            }
            Decision::Invoke(invocations) => {
                self.transition(TurnPhase::ExecutingTools);
                let mut results = Vec::with_capacity(invocations.len());
                for inv in invocations {
                    tracing::info!(tool = %inv.tool, "executing tool");
                    results.push(self.executor.run(&inv.tool, inv.args).await);
                }
                self.transition(TurnPhase::AwaitingSynthesis);
                self.planner.synthesize(utterance, &results).await?
            }
        };

        self.memory.record(Source::Agent, answer.clone());
        let (prompt, completion, total) = self.planner.token_usage();
        tracing::debug!(prompt, completion, total, "cumulative token usage");
        Ok(answer)
    }
}

/// 根据配置选择 Agent 的 LLM 后端（Groq / OpenAI 兼容 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig, keys: &ApiKeys) -> Result<Arc<dyn LlmClient>, AgentError> {
    let missing = |name: &str| AgentError::Config(format!("{} is not set", name));
    let llm: Arc<dyn LlmClient> = match cfg.llm.provider {
        LlmProvider::Groq => {
            let key = keys.groq.as_deref().ok_or_else(|| missing("GROQ_API_KEY"))?;
            let client = create_groq_client(key, cfg.llm.model.as_deref())
                .with_max_tokens(cfg.llm.max_tokens)
                .with_temperature(cfg.llm.temperature);
            tracing::info!("Using Groq LLM ({})", client.model());
            Arc::new(client)
        }
        LlmProvider::OpenAi => {
            let key = keys.openai.as_deref().ok_or_else(|| missing("OPENAI_API_KEY"))?;
            let model = cfg.llm.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            tracing::info!("Using OpenAI LLM ({})", model);
            Arc::new(
                OpenAiClient::new(cfg.llm.base_url.as_deref(), &model, key)
                    .with_max_tokens(cfg.llm.max_tokens)
                    .with_temperature(cfg.llm.temperature),
            )
        }
        LlmProvider::Mock => {
            tracing::warn!("llm.provider = mock, answers are echoed");
            Arc::new(MockLlmClient::new())
        }
    };
    Ok(llm)
}

/// 读取 system prompt：配置路径 > config/prompts/system.txt > 内置默认
fn load_system_prompt(cfg: &AppConfig) -> String {
    let configured = cfg.app.system_prompt_path.as_deref();
    configured
        .into_iter()
        .chain([
            Path::new("config/prompts/system.txt"),
            Path::new("../config/prompts/system.txt"),
        ])
        .find_map(|p| std::fs::read_to_string(p).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
}

/// 按配置注册工具：time / weather / news（仅注册启用的工具）
fn build_registry(cfg: &AppConfig, keys: &ApiKeys) -> Result<ToolRegistry, AgentError> {
    let mut tools = ToolRegistry::new();

    if cfg.tools.time.enabled {
        tools.register(TimeTool::new());
    }

    if cfg.tools.weather.enabled {
        let w = &cfg.tools.weather;
        let key = keys
            .openweathermap
            .as_deref()
            .ok_or_else(|| AgentError::Config("OPENWEATHERMAP_API_KEY is not set".to_string()))?;
        let units = Units::parse(&w.units)
            .map_err(|e| AgentError::Config(format!("tools.weather.units: {}", e)))?;
        tools.register(
            WeatherTool::new(key, w.timeout_secs)
                .with_base_url(w.base_url.clone())
                .with_default_units(units),
        );
    }

    if cfg.tools.news.enabled {
        let n = &cfg.tools.news;
        let groq_key = keys
            .groq
            .as_deref()
            .ok_or_else(|| AgentError::Config("GROQ_API_KEY is not set".to_string()))?;
        let news_llm = create_groq_client(groq_key, n.model.as_deref())
            .with_max_tokens(n.max_tokens)
            .with_temperature(n.temperature);
        let cache = ResponseCache::open(&n.cache_dir, n.cache_ttl_secs).map_err(|e| {
            AgentError::Config(format!("cannot open news cache {}: {}", n.cache_dir.display(), e))
        })?;
        let mut news = NewsTool::new(
            Arc::new(news_llm),
            Arc::new(HtmlExtractor::new(n.timeout_secs, n.max_source_chars)),
            cache,
        )
        .with_max_retries(n.max_retries)
        .with_top_k(n.top_k);

        if let Some(key) = &keys.rapidapi {
            news = news.with_provider(Arc::new(BingRapidApi::new(key.clone(), n.timeout_secs)));
        }
        if let (Some(key), Some(cx)) = (&keys.google_search, &keys.google_cx) {
            news = news.with_provider(Arc::new(GoogleCustomSearch::new(
                key.clone(),
                cx.clone(),
                n.timeout_secs,
            )));
        }
        if let Some(key) = &keys.serp_api {
            news = news.with_provider(Arc::new(SerpApi::new(key.clone(), n.timeout_secs)));
        }
        if let Some(key) = &keys.serp_stack {
            news = news.with_provider(Arc::new(SerpStack::new(key.clone(), n.timeout_secs)));
        }
        let news = news.with_timeouts(n.timeout_secs, cfg.llm.timeouts.request);
        tracing::info!(
            providers = ?news.provider_names(),
            budget_secs = news.worst_case_duration().as_secs(),
            "news tool search chain"
        );
        tools.register(news);
    }

    Ok(tools)
}

/// 装配 Agent：先统一校验 API Key（缺失时立即失败），再创建 LLM、工具与记忆
pub fn build_agent(cfg: &AppConfig, keys: &ApiKeys) -> Result<Agent, AgentError> {
    keys.validate(cfg)?;

    let llm = create_llm_from_config(cfg, keys)?;
    let planner = Planner::new(llm, load_system_prompt(cfg))
        .with_request_timeout(cfg.llm.timeouts.request);
    let registry = build_registry(cfg, keys)?;
    tracing::info!(tools = ?registry.tool_names(), "tools registered");

    Ok(Agent::new(
        planner,
        ToolExecutor::new(registry, cfg.tools.tool_timeout_secs),
        Memory::new(cfg.app.memory_capacity),
    ))
}
