//! # 缓存抽象层
//!
//! 按规格需要的逻辑操作定义统一接口，方法全部以字符串为载体，
//! 保持 trait 对象安全；类型化读写由 [`super::Cache`] 封装。

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// 缓存存储 trait
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 读取字符串值
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 写入字符串值，`ttl` 为 None 时不过期
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// 删除键，返回键是否存在
    async fn delete(&self, key: &str) -> Result<bool>;

    /// 计数器自增，返回自增后的值
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64>;

    /// 集合添加成员，返回是否新增
    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;

    /// 集合移除成员，返回是否存在
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool>;

    /// 集合全部成员
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// 集合基数
    async fn set_card(&self, key: &str) -> Result<u64>;

    /// 哈希字段读取
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// 哈希字段写入
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// SET NX EX：键不存在时写入并设置过期，返回是否写入成功
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;
}
