//! # 缓存键命名规范
//!
//! 定义统一的缓存键生成策略，避免各模块散落手拼字符串。

use std::fmt;

/// 缓存键类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    /// 用户缓存（按内部令牌） - `user_cache:innertoken:{token}`
    UserInnerToken { token: String },

    /// 用户订阅列表缓存 - `user_subscription_cache:{user_id}:{status}`
    UserSubscription { user_id: i32, status: String },

    /// 订阅激活互斥锁 - `user_cache:activation_lock:{user_id}`
    ActivationLock { user_id: i32 },

    /// 就绪凭证集合 - `dispatch:available_accounts`
    AvailableAccounts,

    /// 单凭证使用量计数器 - `dispatch:account_usage:{account_id}`
    AccountUsage { account_id: i32 },
}

impl CacheKey {
    /// 生成缓存键字符串
    #[must_use]
    pub fn build(&self) -> String {
        match self {
            Self::UserInnerToken { token } => {
                format!("user_cache:innertoken:{token}")
            }
            Self::UserSubscription { user_id, status } => {
                format!("user_subscription_cache:{user_id}:{status}")
            }
            Self::ActivationLock { user_id } => {
                format!("user_cache:activation_lock:{user_id}")
            }
            Self::AvailableAccounts => "dispatch:available_accounts".to_string(),
            Self::AccountUsage { account_id } => {
                format!("dispatch:account_usage:{account_id}")
            }
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formats_are_stable() {
        assert_eq!(
            CacheKey::UserInnerToken {
                token: "T1".to_string()
            }
            .build(),
            "user_cache:innertoken:T1"
        );
        assert_eq!(
            CacheKey::UserSubscription {
                user_id: 7,
                status: "active".to_string()
            }
            .build(),
            "user_subscription_cache:7:active"
        );
        assert_eq!(
            CacheKey::AccountUsage { account_id: 775 }.build(),
            "dispatch:account_usage:775"
        );
        assert_eq!(
            CacheKey::AvailableAccounts.build(),
            "dispatch:available_accounts"
        );
    }
}
