//! # 用户与权益模块
//!
//! 内部令牌 → 用户解析、订阅可用性评估与待生效订阅激活。

mod service;

pub use service::{SubscriptionWithTier, UserService};
