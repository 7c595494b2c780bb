//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，run(tool_name, args) 先按 schema 的 required 校验参数，
//! 再在超时内调用工具；未知工具、参数错误、工具失败与超时全部转为失败的 ToolResult，从不向上抛出。
//! 每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::ToolError;
use crate::tools::{ToolDescriptor, ToolRegistry, ToolResult};

/// 工具执行器：对每次调用施加超时，并将结果映射为 ToolResult
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；任何失败都记录为 success=false 的 ToolResult
    pub async fn run(&self, tool_name: &str, args: Value) -> ToolResult {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = self.try_run(tool_name, args).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ToolError::UnknownTool(_)) => "unknown_tool",
            Err(ToolError::InvalidArgument(_)) => "invalid_argument",
            Err(ToolError::Timeout(_)) => "timeout",
            Err(ToolError::ExternalService(_)) => "external_service",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(payload) => ToolResult::success(tool_name, payload),
            Err(e) => {
                tracing::warn!(tool = %tool_name, error = %e, "tool failed");
                ToolResult::failure(tool_name, &e)
            }
        }
    }

    async fn try_run(&self, tool_name: &str, args: Value) -> Result<String, ToolError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;
        validate_required(&tool.parameters_schema(), &args)?;
        let limit = tool
            .timeout_budget()
            .map_or(self.timeout, |budget| budget.max(self.timeout));
        match timeout(limit, tool.execute(args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(limit.as_secs())),
        }
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.registry.descriptors()
    }
}

/// 校验 schema 中 required 列出的参数均存在，且字符串参数非空
fn validate_required(schema: &Value, args: &Value) -> Result<(), ToolError> {
    let required = match schema.get("required").and_then(|r| r.as_array()) {
        Some(r) => r,
        None => return Ok(()),
    };
    let missing: Vec<&str> = required
        .iter()
        .filter_map(|name| name.as_str())
        .filter(|name| match args.get(*name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ToolError::InvalidArgument(format!(
            "missing required argument(s): {}",
            missing.join(", ")
        )))
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.len() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
