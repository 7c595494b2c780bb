//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Groq / Mock）实现 LlmClient：给定消息列表返回模型的文本回复。

use async_trait::async_trait;

use crate::memory::Message;

/// LLM 客户端 trait：一次请求 / 一次回复
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成；Err 为提供方错误描述（网络、鉴权、限流等）
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
