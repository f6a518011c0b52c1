//! # 错误处理模块
//!
//! 统一的错误类型定义和处理

mod types;

pub use types::*;

/// 应用结果类型
pub type Result<T> = std::result::Result<T, GatewayError>;

/// 错误上下文扩展trait
pub trait ErrorContext<T> {
    /// 添加数据库错误上下文
    fn with_database_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// 添加网络错误上下文
    fn with_network_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// 添加缓存错误上下文
    fn with_cache_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn with_database_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| GatewayError::database_with_source(f(), e.into()))
    }

    fn with_network_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| GatewayError::network_with_source(f(), e.into()))
    }

    fn with_cache_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| GatewayError::cache_with_source(f(), e.into()))
    }
}
