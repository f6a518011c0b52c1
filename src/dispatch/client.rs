//! # 账号管理服务客户端
//!
//! 所有调用同步等待、30 秒超时、JSON 载荷。客户端自身不做重试，
//! 402 映射为权益耗尽，其余 4xx/5xx 映射为瞬态网络错误；
//! 错误体兼容 `{error, message}` 与裸文本两种形态。

use crate::dispatch::types::{
    AcquireRequest, ApiErrorBody, FetchAvailableRequest, FetchAvailableResponse, IncrUsageRequest,
};
use crate::dispatch::{AccountInfo, AcquireOutcome};
use crate::error::{GatewayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo};
use reqwest::StatusCode;
use std::time::Duration;

/// 单次调用超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 凭证池客户端
pub struct DispatchClient {
    http: reqwest::Client,
    base_url: String,
}

impl DispatchClient {
    /// 创建客户端，`base_url` 结尾斜杠可有可无
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let mut base_url = base_url.into();
        if base_url.is_empty() {
            return Err(GatewayError::config("账号管理服务地址未配置"));
        }
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::network_with_source("创建 HTTP 客户端失败", e))?;
        Ok(Self { http, base_url })
    }

    /// 为用户获取（或复用）一个上游凭证
    ///
    /// `POST /acquire`，402 表示用户权益耗尽。
    pub async fn acquire(&self, user_id: i32) -> Result<AcquireOutcome> {
        let url = format!("{}acquire", self.base_url);
        linfo!(
            "system",
            LogStage::Dispatch,
            LogComponent::Dispatch,
            "acquire_account",
            &format!("为用户 {user_id} 请求凭证: {url}")
        );

        let response = self
            .http
            .post(&url)
            .json(&AcquireRequest {
                user_id: user_id.to_string(),
            })
            .send()
            .await
            .map_err(|e| GatewayError::network_with_source("请求账号管理服务失败", e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::network_with_source("读取账号管理服务响应失败", e))?;

        if status == StatusCode::PAYMENT_REQUIRED {
            return Err(GatewayError::entitlement_exhausted(parse_error_body(&body)));
        }
        if status.as_u16() >= 400 {
            return Err(GatewayError::network(format!(
                "账号管理服务返回错误 (status {}): {}",
                status.as_u16(),
                parse_error_body(&body)
            )));
        }

        let outcome: AcquireOutcome = serde_json::from_slice(&body).map_err(|e| {
            GatewayError::serialization_with_source("解析 acquire 响应失败", e)
        })?;
        linfo!(
            "system",
            LogStage::Dispatch,
            LogComponent::Dispatch,
            "acquire_account_ok",
            &format!(
                "用户 {user_id} 获得凭证: account_id={}, reused={}",
                outcome.account.id, outcome.reused
            )
        );
        Ok(outcome)
    }

    /// 凭证使用量加一
    ///
    /// `POST /usage/inc`
    pub async fn increment_usage(&self, account_id: i32) -> Result<()> {
        let url = format!("{}usage/inc", self.base_url);
        ldebug!(
            "system",
            LogStage::Dispatch,
            LogComponent::Dispatch,
            "increment_usage",
            &format!("凭证 {account_id} 使用量自增: {url}")
        );

        let response = self
            .http
            .post(&url)
            .json(&IncrUsageRequest { account_id })
            .send()
            .await
            .map_err(|e| GatewayError::network_with_source("请求账号管理服务失败", e))?;
        self.expect_ok(response, "usage/inc").await
    }

    /// 禁用凭证并触发池侧轮换检查
    ///
    /// `POST /account/{id}/disable-with-check`
    pub async fn disable_with_check(&self, account_id: i32) -> Result<()> {
        let url = format!("{}account/{account_id}/disable-with-check", self.base_url);
        linfo!(
            "system",
            LogStage::Dispatch,
            LogComponent::Dispatch,
            "disable_account",
            &format!("禁用凭证 {account_id}: {url}")
        );

        let response = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| GatewayError::network_with_source("请求账号管理服务失败", e))?;
        self.expect_ok(response, "disable-with-check").await
    }

    /// 批量获取就绪凭证（池维护任务的补充来源）
    ///
    /// `POST /accounts/available`
    pub async fn fetch_available(&self, count: usize) -> Result<Vec<AccountInfo>> {
        let url = format!("{}accounts/available", self.base_url);
        ldebug!(
            "system",
            LogStage::Dispatch,
            LogComponent::Dispatch,
            "fetch_available",
            &format!("请求 {count} 个就绪凭证: {url}")
        );

        let response = self
            .http
            .post(&url)
            .json(&FetchAvailableRequest { count })
            .send()
            .await
            .map_err(|e| GatewayError::network_with_source("请求账号管理服务失败", e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::network_with_source("读取账号管理服务响应失败", e))?;
        if status.as_u16() >= 400 {
            return Err(GatewayError::network(format!(
                "账号管理服务返回错误 (status {}): {}",
                status.as_u16(),
                parse_error_body(&body)
            )));
        }
        let parsed: FetchAvailableResponse = serde_json::from_slice(&body).map_err(|e| {
            GatewayError::serialization_with_source("解析 accounts/available 响应失败", e)
        })?;
        Ok(parsed.accounts)
    }

    async fn expect_ok(&self, response: reqwest::Response, operation: &str) -> Result<()> {
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }
        let body = response.bytes().await.unwrap_or_default();
        Err(GatewayError::network(format!(
            "账号管理服务 {operation} 返回错误 (status {}): {}",
            status.as_u16(),
            parse_error_body(&body)
        )))
    }
}

/// 错误体解析：优先结构化 `{error, message}`，否则原样返回文本
fn parse_error_body(body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ApiErrorBody>(body) {
        return format!("{} - {}", parsed.error, parsed.message);
    }
    String::from_utf8_lossy(body).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_prefers_structured_shape() {
        let parsed = parse_error_body(br#"{"error":"quota","message":"over"}"#);
        assert_eq!(parsed, "quota - over");
    }

    #[test]
    fn error_body_falls_back_to_raw_text() {
        let parsed = parse_error_body(b"upstream blew up");
        assert_eq!(parsed, "upstream blew up");
    }

    #[test]
    fn base_url_gets_normalized() {
        let client = DispatchClient::new("http://127.0.0.1:31219").unwrap();
        assert!(client.base_url.ends_with('/'));
        assert!(DispatchClient::new("").is_err());
    }
}
