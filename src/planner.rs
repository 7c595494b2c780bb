//! Planner（LLM 客户端的提示词层）：工具选择决策与结果汇总
//!
//! decide：把记忆上下文与工具目录交给 LLM，解析为 Decision（直接回答 / 按序调用工具）；
//! synthesize：把原始请求与全部 ToolResult（失败也包含在内）交给 LLM 得到最终回答。
//! parse_decision 从文本中提取 JSON 并严格解析，格式不符返回 ResponseParse（携带原文）。

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::llm::LlmClient;
use crate::memory::Message;
use crate::tools::{tool_call_schema_json, ToolDescriptor, ToolResult};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Herald, a helpful assistant that can look up the current time, the weather and recent news.";

const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user's request using the tool results provided. \
If a tool was unavailable, briefly say which information could not be retrieved and answer with what you have.";

/// LLM 选择的一次工具调用：{"tool": "time", "args": {"timezone": "UTC"}}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolInvocation {
    #[serde(alias = "name")]
    pub tool: String,
    #[serde(default = "empty_args", alias = "arguments")]
    pub args: Value,
}

fn empty_args() -> Value {
    Value::Object(Default::default())
}

impl ToolInvocation {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }
}

/// Planner 决策
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// 直接回答用户
    NoToolNeeded(String),
    /// 按顺序执行这些工具
    Invoke(Vec<ToolInvocation>),
}

fn parse_error(raw: &str, reason: impl Into<String>) -> AgentError {
    AgentError::ResponseParse {
        raw: raw.to_string(),
        reason: reason.into(),
    }
}

/// 从输出中截取候选 JSON：优先 ```json 代码块；否则分别从第一个 { 与第一个 [ 截到最后一个对应的闭合符，按出现位置排序
fn json_candidates(trimmed: &str) -> Vec<&str> {
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return vec![rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())];
    }
    let mut spans: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = trimmed.find(open)?;
            let end = trimmed.rfind(close)?;
            (end > start).then(|| (start, &trimmed[start..=end]))
        })
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    spans.into_iter().map(|(_, span)| span).collect()
}

fn parse_invocation(raw: &str, value: Value) -> Result<ToolInvocation, AgentError> {
    let mut inv: ToolInvocation = serde_json::from_value(value)
        .map_err(|e| parse_error(raw, format!("invalid tool call: {}", e)))?;
    inv.tool = inv.tool.trim().to_string();
    if inv.tool.is_empty() {
        return Err(parse_error(raw, "tool call without a tool name"));
    }
    // OpenAI 风格的 arguments 可能是 JSON 字符串
    if let Value::String(s) = &inv.args {
        inv.args = serde_json::from_str(s)
            .map_err(|e| parse_error(raw, format!("tool arguments are not JSON: {}", e)))?;
    }
    if inv.args.is_null() {
        inv.args = empty_args();
    }
    if !inv.args.is_object() {
        return Err(parse_error(raw, "tool arguments must be a JSON object"));
    }
    Ok(inv)
}

fn parse_invocations(raw: &str, items: Vec<Value>) -> Result<Decision, AgentError> {
    if items.is_empty() {
        return Err(parse_error(raw, "empty tool call list"));
    }
    let calls = items
        .into_iter()
        .map(|v| parse_invocation(raw, v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Decision::Invoke(calls))
}

/// 解析决策输出：纯文本为直接回答；JSON 支持单个调用、{"tool_calls": [...]}、数组、{"answer": "..."}
pub fn parse_decision(output: &str) -> Result<Decision, AgentError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Err(parse_error(output, "empty model output"));
    }

    let candidates = json_candidates(trimmed);
    if candidates.is_empty() {
        return Ok(Decision::NoToolNeeded(trimmed.to_string()));
    }

    // 第一个候选不是合法 JSON 时（如 "[thinking] {...}"）再试另一个
    let mut first_err = None;
    let value = candidates.iter().find_map(|c| match serde_json::from_str::<Value>(c) {
        Ok(v) => Some(v),
        Err(e) => {
            first_err.get_or_insert_with(|| format!("{}: {}", e, c));
            None
        }
    });
    let value = match value {
        Some(v) => v,
        None => return Err(parse_error(trimmed, first_err.unwrap_or_default())),
    };

    match value {
        Value::Array(items) => parse_invocations(trimmed, items),
        Value::Object(mut map) => {
            if let Some(calls) = map.remove("tool_calls") {
                match calls {
                    Value::Array(items) if !items.is_empty() => parse_invocations(trimmed, items),
                    _ => match map.get("answer").and_then(|a| a.as_str()) {
                        Some(answer) => Ok(Decision::NoToolNeeded(answer.trim().to_string())),
                        None => Err(parse_error(trimmed, "tool_calls must be a non-empty array")),
                    },
                }
            } else if map.contains_key("tool")
                || (map.contains_key("name") && map.contains_key("arguments"))
            {
                Ok(Decision::Invoke(vec![parse_invocation(trimmed, Value::Object(map))?]))
            } else if let Some(answer) = map.get("answer").and_then(|a| a.as_str()) {
                Ok(Decision::NoToolNeeded(answer.trim().to_string()))
            } else {
                Err(parse_error(trimmed, "unrecognized JSON structure"))
            }
        }
        _ => Err(parse_error(trimmed, "expected a JSON object or array")),
    }
}

/// 渲染工具目录（供决策 prompt 使用）
pub fn render_catalog(catalog: &[ToolDescriptor]) -> String {
    if catalog.is_empty() {
        return "(no tools available)".to_string();
    }
    catalog
        .iter()
        .map(|t| format!("- {}: {}\n  parameters: {}", t.name, t.description, t.parameters))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Planner：持有 LLM、基础 system prompt 与单次请求超时
pub struct Planner {
    llm: Arc<dyn LlmClient>,
    system_prompt: String,
    request_timeout: Duration,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmClient>, system_prompt: impl Into<String>) -> Self {
        Self {
            llm,
            system_prompt: system_prompt.into(),
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout = Duration::from_secs(secs);
        self
    }

    /// 获取 LLM 累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, AgentError> {
        match timeout(self.request_timeout, self.llm.complete(messages)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(AgentError::ExternalService(e)),
            Err(_) => Err(AgentError::ExternalService(format!(
                "LLM request timed out after {}s",
                self.request_timeout.as_secs()
            ))),
        }
    }

    /// 决策 system prompt：基础 prompt + 工具目录 + 调用格式
    fn decision_system(&self, catalog: &[ToolDescriptor]) -> String {
        format!(
            "{}\n\n## Available tools\n{}\n\n## How to respond\n\
            If the request needs fresh information from the tools, reply with ONLY a JSON object \
            listing the calls in execution order, matching this schema:\n{}\n\
            Example: {{\"tool_calls\": [{{\"tool\": \"time\", \"args\": {{\"timezone\": \"Asia/Tokyo\"}}}}]}}\n\
            Otherwise answer the user directly in plain text, without JSON.",
            self.system_prompt,
            render_catalog(catalog),
            tool_call_schema_json()
        )
    }

    /// 决定直接回答还是调用工具；输出格式不符时返回 ResponseParse
    pub async fn decide(
        &self,
        utterance: &str,
        memory_context: &str,
        catalog: &[ToolDescriptor],
    ) -> Result<Decision, AgentError> {
        let messages = vec![
            Message::system(self.decision_system(catalog)),
            Message::user(format!(
                "## Conversation so far\n{}\n\n## Current request\n{}",
                memory_context, utterance
            )),
        ];
        let output = self.complete(&messages).await?;
        parse_decision(&output)
    }

    /// 基于工具结果生成最终回答；失败结果以 "tool X unavailable: reason" 呈现
    pub async fn synthesize(
        &self,
        utterance: &str,
        results: &[ToolResult],
    ) -> Result<String, AgentError> {
        let results_block = if results.is_empty() {
            "(no tool results)".to_string()
        } else {
            results
                .iter()
                .map(ToolResult::to_prompt_line)
                .collect::<Vec<_>>()
                .join("\n\n")
        };
        let messages = vec![
            Message::system(SYNTHESIS_SYSTEM_PROMPT),
            Message::user(format!(
                "User request: {}\n\nTool results:\n{}\n\nAnswer:",
                utterance, results_block
            )),
        ];
        let answer = self.complete(&messages).await?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(AgentError::ExternalService(
                "language model returned an empty answer".to_string(),
            ));
        }
        Ok(answer.to_string())
    }
}
