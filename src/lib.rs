//! # Nursor 网关核心库
//!
//! Envoy ext_proc 外部处理器：对每条下游 HTTP/2 事务做用户鉴权、
//! 上游凭证改写、响应观察与异步事务记录。

pub mod app;
pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod logging;
pub mod maintainer;
pub mod proto;
pub mod recorder;
pub mod users;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{GatewayError, Result};
