//! 新闻回答缓存：按规范化查询缓存合成后的回答，带 TTL
//!
//! 单文件 JSON（<cache_dir>/cache.json），打开时加载，每次写入时清理过期条目并整体落盘。
//! 读取时过期条目视为不存在。内部 Mutex 保证 &self 下的并发安全。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 默认 TTL：一周
pub const DEFAULT_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

const CACHE_FILE: &str = "cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: String,
    inserted_at: DateTime<Utc>,
}

/// 规范化查询作为缓存键：去首尾空白、小写、合并连续空白、去掉末尾 ?!.
pub fn normalize_query(query: &str) -> String {
    let joined = query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    joined
        .trim_end_matches(|c: char| matches!(c, '?' | '!' | '.'))
        .trim_end()
        .to_string()
}

/// 带 TTL 的响应缓存；path 为 None 时仅在内存中
#[derive(Debug)]
pub struct ResponseCache {
    path: Option<PathBuf>,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    /// 打开磁盘缓存目录（不存在则创建）；已有文件损坏时记录告警并从空缓存开始
    pub fn open(dir: impl AsRef<Path>, ttl_secs: u64) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CACHE_FILE);
        let entries = if path.exists() {
            let data = std::fs::read_to_string(&path)?;
            serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "news cache unreadable, starting empty");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };
        Ok(Self {
            path: Some(path),
            ttl: ttl_duration(ttl_secs),
            entries: Mutex::new(entries),
        })
    }

    pub fn in_memory(ttl_secs: u64) -> Self {
        Self {
            path: None,
            ttl: ttl_duration(ttl_secs),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Utc::now())
    }

    /// 以指定时刻判断是否过期
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|e| now - e.inserted_at < self.ttl)
            .map(|e| e.value.clone())
    }

    pub fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.set_at(key, value, Utc::now())
    }

    /// 写入条目，同时清理过期条目并落盘
    pub fn set_at(&self, key: &str, value: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("news cache lock poisoned"))?;
        let ttl = self.ttl;
        entries.retain(|_, e| now - e.inserted_at < ttl);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                inserted_at: now,
            },
        );
        if let Some(path) = &self.path {
            std::fs::write(path, serde_json::to_string_pretty(&*entries)?)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn ttl_duration(ttl_secs: u64) -> Duration {
    Duration::seconds(i64::try_from(ttl_secs).unwrap_or(i64::MAX).min(i64::MAX / 1000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  Who won   the Match?? "), "who won the match");
        assert_eq!(normalize_query("Latest AI news."), "latest ai news");
        assert_eq!(normalize_query("what's new"), "what's new");
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = ResponseCache::in_memory(60);
        let t0 = Utc::now();
        cache.set_at("q", "answer", t0).unwrap();
        assert_eq!(cache.get_at("q", t0 + Duration::seconds(59)).as_deref(), Some("answer"));
        assert_eq!(cache.get_at("q", t0 + Duration::seconds(60)), None);
    }

    #[test]
    fn test_expired_entries_purged_on_write() {
        let cache = ResponseCache::in_memory(10);
        let t0 = Utc::now();
        cache.set_at("old", "a", t0).unwrap();
        cache.set_at("new", "b", t0 + Duration::seconds(30)).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = ResponseCache::open(dir.path(), DEFAULT_CACHE_TTL_SECS).unwrap();
            cache.set("latest rust release", "Rust 1.90 shipped.").unwrap();
        }
        let reopened = ResponseCache::open(dir.path(), DEFAULT_CACHE_TTL_SECS).unwrap();
        assert_eq!(
            reopened.get("latest rust release").as_deref(),
            Some("Rust 1.90 shipped.")
        );
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CACHE_FILE), "not json").unwrap();
        let cache = ResponseCache::open(dir.path(), 60).unwrap();
        assert!(cache.is_empty());
    }
}
