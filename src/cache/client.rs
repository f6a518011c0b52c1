//! # Redis 缓存客户端
//!
//! 基于 `ConnectionManager` 的连接复用，所有命令失败统一映射为缓存错误。

use crate::cache::CacheStore;
use crate::config::RedisConfig;
use crate::error::{GatewayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Redis 缓存客户端
pub struct RedisCache {
    /// Redis 连接管理器
    connection_manager: ConnectionManager,
}

impl RedisCache {
    /// 创建新的缓存客户端
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Cache,
            "connect_to_redis",
            &format!("正在连接 Redis 服务器: {}:{}", config.host, config.port)
        );

        let client = Client::open(config.build_url())
            .map_err(|e| GatewayError::cache_with_source("创建 Redis 客户端失败", e))?;

        let connection_manager = ConnectionManager::new(client)
            .await
            .map_err(|e| GatewayError::cache_with_source("建立 Redis 连接失败", e))?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Cache,
            "redis_connected",
            "Redis 连接建立成功"
        );

        Ok(Self { connection_manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.connection_manager.clone()
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        conn.get(key)
            .await
            .map_err(|e| GatewayError::cache_with_source(format!("读取缓存失败: {key}"), e))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        ldebug!(
            "system",
            LogStage::Cache,
            LogComponent::Cache,
            "set_cache",
            &format!("设置缓存: key={key}, ttl={ttl:?}")
        );
        let mut conn = self.conn();
        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs())
                .await
                .map_err(|e| GatewayError::cache_with_source(format!("设置缓存失败: {key}"), e)),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|e| GatewayError::cache_with_source(format!("设置缓存失败: {key}"), e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn
            .del(key)
            .await
            .map_err(|e| GatewayError::cache_with_source(format!("删除缓存失败: {key}"), e))?;
        Ok(removed > 0)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn();
        conn.incr(key, delta)
            .await
            .map_err(|e| GatewayError::cache_with_source(format!("计数器自增失败: {key}"), e))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn();
        let added: i64 = conn
            .sadd(key, member)
            .await
            .map_err(|e| GatewayError::cache_with_source(format!("集合添加失败: {key}"), e))?;
        Ok(added > 0)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn();
        let removed: i64 = conn
            .srem(key, member)
            .await
            .map_err(|e| GatewayError::cache_with_source(format!("集合移除失败: {key}"), e))?;
        Ok(removed > 0)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn();
        conn.smembers(key)
            .await
            .map_err(|e| GatewayError::cache_with_source(format!("集合读取失败: {key}"), e))
    }

    async fn set_card(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn();
        conn.scard(key)
            .await
            .map_err(|e| GatewayError::cache_with_source(format!("集合基数读取失败: {key}"), e))
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn();
        conn.hget(key, field)
            .await
            .map_err(|e| GatewayError::cache_with_source(format!("哈希读取失败: {key}"), e))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn();
        conn.hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(|e| GatewayError::cache_with_source(format!("哈希写入失败: {key}"), e))
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| GatewayError::cache_with_source(format!("获取锁失败: {key}"), e))?;
        Ok(reply.is_some())
    }
}
