//! 短期记忆：对话历史
//!
//! Memory 是固定容量的 FIFO 环形缓冲：保留最近 N 条 MemoryItem（用户输入与 Agent 回答各占一条），
//! 超出容量时丢弃最旧的一条。context() 渲染为供 LLM prompt 使用的纯文本。
//! Message / Role 是发往 LLM API 的消息格式，与记忆条目分开。

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 单条 LLM 消息
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 记忆条目来源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    User,
    Agent,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::User => f.write_str("user"),
            Source::Agent => f.write_str("agent"),
        }
    }
}

/// 单条记忆：创建后不可变
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemoryItem {
    source: Source,
    content: String,
    timestamp: DateTime<Utc>,
}

impl MemoryItem {
    pub fn source(&self) -> Source {
        self.source
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

pub const DEFAULT_MEMORY_CAPACITY: usize = 10;

const EMPTY_CONTEXT: &str = "(no previous conversation)";

/// 有界对话记忆：len() <= capacity 恒成立
#[derive(Clone, Debug)]
pub struct Memory {
    items: VecDeque<MemoryItem>,
    capacity: usize,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

impl Memory {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 以当前时间追加一条记忆
    pub fn record(&mut self, source: Source, content: impl Into<String>) {
        self.record_at(source, content, Utc::now());
    }

    /// 以指定时间追加一条记忆；超出容量时从头部淘汰
    pub fn record_at(&mut self, source: Source, content: impl Into<String>, timestamp: DateTime<Utc>) {
        self.items.push_back(MemoryItem {
            source,
            content: content.into(),
            timestamp,
        });
        while self.items.len() > self.capacity {
            self.items.pop_front();
        }
    }

    /// 按时间顺序（最旧在前）渲染全部条目，每行 `[时间] 来源: 内容`
    pub fn context(&self) -> String {
        if self.items.is_empty() {
            return EMPTY_CONTEXT.to_string();
        }
        self.items
            .iter()
            .map(|item| {
                format!(
                    "[{}] {}: {}",
                    item.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                    item.source,
                    item.content
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn items(&self) -> impl Iterator<Item = &MemoryItem> {
        self.items.iter()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
