//! Groq API 客户端（OpenAI 兼容格式）
//!
//! Groq 提供与 OpenAI 兼容的 Chat Completions 接口。
//! - Base URL: https://api.groq.com/openai/v1
//! - 默认模型: llama3-8b-8192（Agent 决策/汇总与新闻问答共用）

use crate::llm::OpenAiClient;

/// Groq API 常量
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_LLAMA3_8B: &str = "llama3-8b-8192";

/// 创建 Groq 客户端；model 为空时使用 llama3-8b-8192
pub fn create_groq_client(api_key: &str, model: Option<&str>) -> OpenAiClient {
    let model = model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(GROQ_LLAMA3_8B);
    OpenAiClient::new(Some(GROQ_BASE_URL), model, api_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model() {
        assert_eq!(create_groq_client("gsk-test", None).model(), GROQ_LLAMA3_8B);
        assert_eq!(create_groq_client("gsk-test", Some("  ")).model(), GROQ_LLAMA3_8B);
        assert_eq!(
            create_groq_client("gsk-test", Some("llama-3.1-70b-versatile")).model(),
            "llama-3.1-70b-versatile"
        );
    }
}
