//! 错误类型
//!
//! 两层错误：ToolError 只在工具层出现，最终都会被转成失败的 ToolResult；
//! AgentError 来自 LLM 客户端自身（决策 / 汇总调用）与启动配置，决定本轮是否终止。

use thiserror::Error;

/// 单个工具执行失败的原因（不会中止整轮对话）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// 参数缺失或无法解析（未知时区、拼错的城市名等）
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// 外部数据源不可达、返回非 2xx 或数据格式错误
    #[error("External service error: {0}")]
    ExternalService(String),

    /// LLM 点名了未注册的工具
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool timeout after {0}s")]
    Timeout(u64),
}

/// Agent 层错误：LLM 调用失败、输出无法解析、配置缺失
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM 提供方调用失败（网络 / 鉴权 / 限流 / 超时）
    #[error("External service error: {0}")]
    ExternalService(String),

    /// 模型输出不符合约定的结构化格式；携带原始文本以便回退为直接回答
    #[error("Response parse error: {reason}")]
    ResponseParse { raw: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),
}
