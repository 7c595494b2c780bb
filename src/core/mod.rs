//! 核心类型：错误分类与单轮阶段状态机

pub mod error;
pub mod state;

pub use error::{AgentError, ToolError};
pub use state::TurnPhase;
