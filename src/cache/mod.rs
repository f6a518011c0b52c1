//! # 缓存模块
//!
//! 统一的缓存抽象：生产环境使用 Redis，测试使用内存实现。
//! 操作面覆盖调度核心需要的逻辑操作：带 TTL 的字符串读写、
//! 集合、哈希、计数器与互斥锁。

mod client;
mod keys;
mod memory;
mod store;

pub use client::RedisCache;
pub use keys::CacheKey;
pub use memory::MemoryCache;
pub use store::CacheStore;

use crate::error::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// 带类型序列化的缓存句柄，进程内共享
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// 底层存储（集合/哈希/计数器操作直接走这里）
    #[must_use]
    pub fn store(&self) -> &dyn CacheStore {
        self.store.as_ref()
    }

    /// 读取 JSON 序列化的缓存值
    pub async fn get_json<T>(&self, key: &CacheKey) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let raw = self.store.get(&key.build()).await?;
        match raw {
            // 缓存内容损坏按未命中处理，交由上层回源后覆盖
            Some(raw) => Ok(serde_json::from_str(&raw).ok()),
            None => Ok(None),
        }
    }

    /// 写入 JSON 序列化的缓存值
    pub async fn set_json<T>(&self, key: &CacheKey, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize,
    {
        let raw = serde_json::to_string(value)?;
        self.store.set_with_ttl(&key.build(), &raw, Some(ttl)).await
    }

    /// 删除缓存键
    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        self.store.delete(&key.build()).await
    }

    /// 计数器自增
    pub async fn incr_by(&self, key: &CacheKey, delta: i64) -> Result<i64> {
        self.store.incr_by(&key.build(), delta).await
    }

    /// 读取计数器当前值（缺省为 0）
    pub async fn counter(&self, key: &CacheKey) -> Result<i64> {
        let raw = self.store.get(&key.build()).await?;
        Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    /// 尝试获取互斥锁（SET NX EX 语义），成功返回 true
    pub async fn try_lock(&self, key: &CacheKey, ttl: Duration) -> Result<bool> {
        self.store.set_nx_ex(&key.build(), "1", ttl).await
    }

    /// 释放互斥锁
    pub async fn unlock(&self, key: &CacheKey) -> Result<()> {
        self.store.delete(&key.build()).await.map(|_| ())
    }
}
