//! # 凭证调度模块
//!
//! 账号管理服务（凭证池属主）的 HTTP 客户端。

mod client;
mod types;

pub use client::DispatchClient;
pub use types::{AccountInfo, AcquireOutcome};
