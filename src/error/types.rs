//! # 错误类型定义

use thiserror::Error;

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 数据库相关错误
    #[error("数据库错误: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 缓存相关错误
    #[error("缓存错误: {message}")]
    Cache {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 网络通信错误（账号管理服务等瞬态依赖故障）
    #[error("网络错误: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 鉴权错误：令牌缺失、非法或查无此人
    #[error("认证错误: {message}")]
    Auth {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 权益耗尽：配额用完且无可激活的待生效订阅，或调度端返回 402
    #[error("权益耗尽: {message}")]
    EntitlementExhausted { message: String },

    /// 订阅过期
    #[error("订阅过期: {message}")]
    SubscriptionExpired { message: String },

    /// 事务记录管道错误
    #[error("记录管道错误: {message}")]
    Recorder {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 序列化/反序列化错误
    #[error("序列化错误: {message}")]
    Serialization {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// 系统内部错误
    #[error("内部错误: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl GatewayError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<anyhow::Error>,
    {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn database<S: Into<String>>(message: S) -> Self {
        Self::Database {
            message: message.into(),
            source: None,
        }
    }

    pub fn database_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<anyhow::Error>,
    {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
            source: None,
        }
    }

    pub fn cache_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<anyhow::Error>,
    {
        Self::Cache {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn network_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<anyhow::Error>,
    {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
            source: None,
        }
    }

    pub fn entitlement_exhausted<S: Into<String>>(message: S) -> Self {
        Self::EntitlementExhausted {
            message: message.into(),
        }
    }

    pub fn subscription_expired<S: Into<String>>(message: S) -> Self {
        Self::SubscriptionExpired {
            message: message.into(),
        }
    }

    pub fn recorder<S: Into<String>>(message: S) -> Self {
        Self::Recorder {
            message: message.into(),
            source: None,
        }
    }

    pub fn recorder_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<anyhow::Error>,
    {
        Self::Recorder {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn serialization_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<anyhow::Error>,
    {
        Self::Serialization {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: Into<anyhow::Error>,
    {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 是否为权益耗尽（调度侧需要区分 402 与瞬态故障）
    #[must_use]
    pub const fn is_entitlement_exhausted(&self) -> bool {
        matches!(self, Self::EntitlementExhausted { .. })
    }
}

impl From<sea_orm::DbErr> for GatewayError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::database_with_source("数据库操作失败", err)
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_with_source("JSON 编解码失败", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructor_helpers_keep_message() {
        let err = GatewayError::auth("token missing");
        assert!(matches!(err, GatewayError::Auth { .. }));
        assert!(err.to_string().contains("token missing"));
    }

    #[test]
    fn entitlement_exhausted_is_detectable() {
        let err = GatewayError::entitlement_exhausted("quota - over");
        assert!(err.is_entitlement_exhausted());
        assert!(!GatewayError::network("502").is_entitlement_exhausted());
    }
}
