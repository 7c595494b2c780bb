//! 记忆层：有界对话记忆（FIFO）与 LLM 消息格式

pub mod conversation;

pub use conversation::{Memory, MemoryItem, Message, Role, Source, DEFAULT_MEMORY_CAPACITY};
