//! # 凭证调度类型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 账号管理服务返回的凭证投影
///
/// 凭证行归账号管理服务所有，本服务只读不改。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: i32,
    #[serde(default)]
    pub cursor_id: Option<String>,
    /// 上游提供商 Bearer 令牌
    pub access_token: String,
    /// 客户端身份键，随凭证一并注入出站请求
    pub client_key: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub usage: Option<i64>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// `POST /acquire` 的成功结果
#[derive(Debug, Clone, Deserialize)]
pub struct AcquireOutcome {
    pub account: AccountInfo,
    /// 是否复用了该用户已绑定的凭证
    pub reused: bool,
}

/// 账号管理服务的结构化错误体
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: String,
    pub message: String,
}

/// 请求体：按用户获取凭证
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AcquireRequest {
    pub user_id: String,
}

/// 请求体：凭证使用量自增
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IncrUsageRequest {
    pub account_id: i32,
}

/// 请求体：批量获取就绪凭证
#[derive(Debug, Serialize)]
pub(crate) struct FetchAvailableRequest {
    pub count: usize,
}

/// 响应体：批量获取就绪凭证
#[derive(Debug, Deserialize)]
pub(crate) struct FetchAvailableResponse {
    pub accounts: Vec<AccountInfo>,
}
