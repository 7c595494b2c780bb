//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找，
//! ToolExecutor 在调用时校验参数、加超时，并把任何失败转成 ToolResult。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::core::ToolError;

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（决策 JSON 中的 "tool" 字段，注册表内唯一）
    fn name(&self) -> &str;

    /// 工具描述（原样放入工具目录）
    fn description(&self) -> &str;

    /// 参数 JSON Schema；执行前按其中的 required 列表校验参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 工具自身需要的最长执行时间；执行器取它与全局超时中较大者
    fn timeout_budget(&self) -> Option<Duration> {
        None
    }

    /// 执行工具，返回可读文本
    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

/// 工具目录条目（静态，供 LLM 决策使用）
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 单次工具调用的结果：成功为文本载荷，失败为错误详情
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_name: String,
    pub outcome: Result<String, String>,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            outcome: Ok(payload.into()),
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: &ToolError) -> Self {
        Self {
            tool_name: tool_name.into(),
            outcome: Err(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// 汇总 prompt 中的一行：成功原样，失败标注 "tool X unavailable: reason"
    pub fn to_prompt_line(&self) -> String {
        match &self.outcome {
            Ok(payload) => format!("Result from {}:\n{}", self.tool_name, payload),
            Err(detail) => format!("tool {} unavailable: {}", self.tool_name, detail),
        }
    }
}

/// 工具注册表：保持注册顺序（工具目录顺序稳定），同名注册覆盖旧工具
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        if let Some(slot) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            tracing::warn!(tool = %tool.name(), "tool registered twice, replacing previous");
            *slot = tool;
        } else {
            self.tools.push(tool);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 全部工具的目录条目（注册顺序）
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}
