//! Herald - 对话式工具编排助手
//!
//! 模块划分：
//! - **agent**: Agent 运行时（单轮编排）与按配置装配
//! - **config**: 应用配置加载（TOML + 环境变量）与 API Key 校验
//! - **core**: 错误类型、单轮状态机
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Groq / Mock）
//! - **memory**: 有界对话记忆
//! - **observability**: 日志初始化
//! - **planner**: 工具决策与结果汇总的 Prompt 层
//! - **tools**: 工具契约、注册表、执行器，以及 time / weather / news 工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod planner;
pub mod tools;

pub use agent::{build_agent, Agent};
