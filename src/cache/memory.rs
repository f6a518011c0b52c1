//! # 内存缓存实现
//!
//! 进程内 `CacheStore` 实现，带 TTL 惰性过期，用于单测与集成测试。

use crate::cache::CacheStore;
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StringEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl StringEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() > at)
    }
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, StringEntry>,
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// 内存缓存
#[derive(Default)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.lock().expect("memory cache poisoned");
        if let Some(entry) = inner.strings.get(key) {
            if entry.is_expired() {
                inner.strings.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory cache poisoned");
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut inner = self.inner.lock().expect("memory cache poisoned");
        let existed = inner.strings.remove(key).is_some()
            || inner.sets.remove(key).is_some()
            || inner.hashes.remove(key).is_some();
        Ok(existed)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut inner = self.inner.lock().expect("memory cache poisoned");
        let current = match inner.strings.get(key) {
            Some(entry) if !entry.is_expired() => entry
                .value
                .parse::<i64>()
                .map_err(|e| GatewayError::cache_with_source(format!("计数器不是整数: {key}"), e))?,
            _ => 0,
        };
        let next = current + delta;
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: next.to_string(),
                expires_at: None,
            },
        );
        Ok(next)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut inner = self.inner.lock().expect("memory cache poisoned");
        Ok(inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut inner = self.inner.lock().expect("memory cache poisoned");
        Ok(inner
            .sets
            .get_mut(key)
            .is_some_and(|set| set.remove(member)))
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock().expect("memory cache poisoned");
        Ok(inner
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn set_card(&self, key: &str) -> Result<u64> {
        let inner = self.inner.lock().expect("memory cache poisoned");
        Ok(inner.sets.get(key).map(|set| set.len() as u64).unwrap_or(0))
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let inner = self.inner.lock().expect("memory cache poisoned");
        Ok(inner
            .hashes
            .get(key)
            .and_then(|hash| hash.get(field).cloned()))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("memory cache poisoned");
        inner
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut inner = self.inner.lock().expect("memory cache poisoned");
        let occupied = inner
            .strings
            .get(key)
            .is_some_and(|entry| !entry.is_expired());
        if occupied {
            return Ok(false);
        }
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }
}
