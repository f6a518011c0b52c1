//! # 流过滤引擎
//!
//! 按阶段处理一条代理流：请求头阶段完成鉴权与凭证改写，
//! 响应阶段观察上游状态并隐藏耗尽载荷。引擎本身不持流，
//! 收发循环在 [`super::service`]，因此阶段逻辑可以被直接驱动测试。

use crate::dispatch::DispatchClient;
use crate::error::GatewayError;
use crate::filter::{
    responses, StreamState, ALLOWED_PROVIDER_DOMAINS, BUG_REPORT_RPC, CHAT_RPC, GET_EMAIL_RPC,
    INNER_TOKEN_HEADER, METRICS_HOST_PREFIX, RESOURCE_EXHAUSTED_MARKER,
};
use crate::filter::{ACCESS_DENIED_BODY, TOKEN_EXPIRED_BODY};
use crate::logging::{LogComponent, LogStage};
use crate::proto::{HeaderValue, HttpBody, HttpHeaders, ProcessingResponse};
use crate::users::UserService;
use crate::{ldebug, lerror, linfo, lwarn};
use std::sync::Arc;

/// 阶段处理结果
pub enum PhaseOutcome {
    /// 发送应答并继续收取后续阶段
    Reply(ProcessingResponse),
    /// 发送应答并结束本条流
    ReplyAndClose(ProcessingResponse),
}

/// 流过滤引擎
pub struct FilterEngine {
    users: Arc<UserService>,
    dispatch: Arc<DispatchClient>,
}

impl FilterEngine {
    #[must_use]
    pub fn new(users: Arc<UserService>, dispatch: Arc<DispatchClient>) -> Self {
        Self { users, dispatch }
    }

    /// 请求头阶段
    ///
    /// 决策树按序匹配，先中先出：观测域名丢弃 → 非提供商域透传 →
    /// 身份探测伪装 → 缺陷上报丢弃 → 令牌解析与凭证改写。
    pub async fn on_request_headers(
        &self,
        state: &mut StreamState,
        headers: &HttpHeaders,
    ) -> PhaseOutcome {
        let header_list: &[HeaderValue] = headers
            .headers
            .as_ref()
            .map(|m| m.headers.as_slice())
            .unwrap_or(&[]);

        let mut authority = String::new();
        let mut path = String::new();
        let mut scheme = String::new();
        for header in header_list {
            let value = header_text(header);
            if value.contains(CHAT_RPC) {
                state.is_chat_request = true;
            }
            match header.key.as_str() {
                ":method" => state.record.method = value.clone(),
                ":authority" => authority = value.clone(),
                ":path" => path = value.clone(),
                ":scheme" => scheme = value.clone(),
                _ => {}
            }
            state.record.add_request_header(&header.key, &value);
        }

        if !authority.is_empty() {
            state.record.host = authority.clone();
            state.record.http_version = "http/2.0".to_string();
            let scheme = if scheme.is_empty() { "http" } else { &scheme };
            state.record.url = format!("{scheme}://{authority}{path}");
        }

        // 1. 客户端观测流量在边缘丢弃
        if authority.starts_with(METRICS_HOST_PREFIX) {
            ldebug!(
                &state.stream_id,
                LogStage::RequestHeaders,
                LogComponent::Filter,
                "drop_metrics_host",
                &format!("丢弃观测域名流量: {authority}")
            );
            return PhaseOutcome::ReplyAndClose(responses::immediate_empty());
        }

        // 2. 非提供商域：原样透传，不做用户解析
        if !is_provider_host(&authority) {
            return PhaseOutcome::Reply(responses::pass_through_request_headers());
        }

        // 3. 身份探测必须伪装，不能由真实凭证应答
        if path.contains(GET_EMAIL_RPC) {
            linfo!(
                &state.stream_id,
                LogStage::RequestHeaders,
                LogComponent::Filter,
                "spoof_identity",
                "伪装应答身份探测 RPC"
            );
            return PhaseOutcome::ReplyAndClose(responses::identity_spoof());
        }

        // 4. 缺陷上报直接丢弃
        if path.contains(BUG_REPORT_RPC) {
            return PhaseOutcome::ReplyAndClose(responses::immediate_empty());
        }

        // 5. 提取内部令牌
        let Some(token) = extract_inner_token(header_list) else {
            lwarn!(
                &state.stream_id,
                LogStage::Authentication,
                LogComponent::Filter,
                "token_missing",
                "请求未携带内部令牌"
            );
            return PhaseOutcome::ReplyAndClose(responses::immediate_empty());
        };

        // 6. 解析用户
        let user = match self.users.resolve(&token).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                lwarn!(
                    &state.stream_id,
                    LogStage::Authentication,
                    LogComponent::Filter,
                    "token_unknown",
                    "内部令牌未绑定用户"
                );
                return PhaseOutcome::ReplyAndClose(responses::immediate_unauthorized(
                    TOKEN_EXPIRED_BODY,
                ));
            }
            Err(err) => {
                lerror!(
                    &state.stream_id,
                    LogStage::Authentication,
                    LogComponent::Filter,
                    "resolve_failed",
                    &format!("用户解析失败: {err}")
                );
                return PhaseOutcome::ReplyAndClose(responses::immediate_unauthorized(
                    ACCESS_DENIED_BODY,
                ));
            }
        };
        state.record.user_id = user.id;
        state.record.inner_token_id = user.inner_token.clone();

        // 7. 绑定凭证（权益耗尽与瞬态故障一律失败关闭）
        let outcome = match self.dispatch.acquire(user.id).await {
            Ok(outcome) => outcome,
            Err(err @ GatewayError::EntitlementExhausted { .. }) => {
                lwarn!(
                    &state.stream_id,
                    LogStage::Dispatch,
                    LogComponent::Filter,
                    "entitlement_exhausted",
                    &format!("用户 {} 权益耗尽: {err}", user.id)
                );
                return PhaseOutcome::ReplyAndClose(responses::immediate_unauthorized(
                    ACCESS_DENIED_BODY,
                ));
            }
            Err(err) => {
                lerror!(
                    &state.stream_id,
                    LogStage::Dispatch,
                    LogComponent::Filter,
                    "acquire_failed",
                    &format!("凭证获取失败: {err}")
                );
                return PhaseOutcome::ReplyAndClose(responses::immediate_unauthorized(
                    ACCESS_DENIED_BODY,
                ));
            }
        };

        // 8. 改写出站凭证
        state.record.account_id = outcome.account.id;
        let reply = responses::credential_rewrite(&outcome.account);
        linfo!(
            &state.stream_id,
            LogStage::RequestHeaders,
            LogComponent::Filter,
            "credential_bound",
            &format!(
                "用户 {} 绑定凭证 {} (reused={})",
                user.id, outcome.account.id, outcome.reused
            )
        );
        state.account = Some(outcome.account);
        PhaseOutcome::Reply(reply)
    }

    /// 请求 body 阶段：只累积，不检查内容
    pub fn on_request_body(&self, state: &mut StreamState, body: &HttpBody) -> PhaseOutcome {
        state.record.append_request_body(&body.body);
        PhaseOutcome::Reply(responses::pass_through_request_body())
    }

    /// 响应头阶段：记录头部，状态 ≥ 400 视为上游异常
    ///
    /// 异常时向下游发送短路应答；流本身保持打开，后续 body 消息
    /// 仍按一问一答处理（代理端收到短路后会主动终止流）。
    pub fn on_response_headers(&self, state: &mut StreamState, headers: &HttpHeaders) -> PhaseOutcome {
        let header_list: &[HeaderValue] = headers
            .headers
            .as_ref()
            .map(|m| m.headers.as_slice())
            .unwrap_or(&[]);

        for header in header_list {
            let value = header_text(header);
            if header.key.eq_ignore_ascii_case(":status") {
                match value.parse::<i32>() {
                    Ok(status) => {
                        state.record.status = status;
                        if status >= 400 {
                            state.chat_exception = true;
                        }
                    }
                    Err(err) => lwarn!(
                        &state.stream_id,
                        LogStage::ResponseHeaders,
                        LogComponent::Filter,
                        "bad_status",
                        &format!("响应状态解析失败: {value} ({err})")
                    ),
                }
            }
            state.record.add_response_header(&header.key, &value);
        }

        if state.chat_exception {
            lwarn!(
                &state.stream_id,
                LogStage::ResponseHeaders,
                LogComponent::Filter,
                "upstream_exception",
                &format!("上游响应异常: status={}", state.record.status)
            );
            PhaseOutcome::Reply(responses::immediate_empty())
        } else {
            PhaseOutcome::Reply(responses::pass_through_response_headers())
        }
    }

    /// 响应 body 阶段：累积，并对耗尽载荷整体替换
    pub fn on_response_body(&self, state: &mut StreamState, body: &HttpBody) -> PhaseOutcome {
        let chunk_exhausted = contains_marker(&body.body, RESOURCE_EXHAUSTED_MARKER);
        state.record.append_response_body(&body.body);

        let mutate = chunk_exhausted || state.chat_exception;
        if chunk_exhausted {
            lwarn!(
                &state.stream_id,
                LogStage::ResponseBody,
                LogComponent::Filter,
                "resource_exhausted",
                "上游响应载荷出现耗尽特征，整体替换"
            );
        }
        PhaseOutcome::Reply(responses::response_body_reply(mutate))
    }
}

/// 读取 header 值：优先二进制 `raw_value`，回落到 `value`
fn header_text(header: &HeaderValue) -> String {
    if header.raw_value.is_empty() {
        header.value.clone()
    } else {
        String::from_utf8_lossy(&header.raw_value).into_owned()
    }
}

fn is_provider_host(authority: &str) -> bool {
    ALLOWED_PROVIDER_DOMAINS
        .iter()
        .any(|domain| authority == *domain || authority.ends_with(&format!(".{domain}")))
}

/// 内部令牌提取
///
/// `nursor-token` 头优先；否则取 `authorization: Bearer <…>` 的
/// 最后一个点分段。
fn extract_inner_token(headers: &[HeaderValue]) -> Option<String> {
    for header in headers {
        if header.key.eq_ignore_ascii_case(INNER_TOKEN_HEADER) {
            let value = header_text(header);
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    for header in headers {
        if header.key.eq_ignore_ascii_case("authorization") {
            let value = header_text(header);
            let token = value.strip_prefix("Bearer ").unwrap_or(&value);
            if token.contains('.') {
                return token
                    .rsplit('.')
                    .next()
                    .filter(|segment| !segment.is_empty())
                    .map(str::to_string);
            }
        }
    }
    None
}

fn contains_marker(chunk: &[u8], marker: &str) -> bool {
    chunk
        .windows(marker.len())
        .any(|window| window == marker.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(key: &str, value: &str) -> HeaderValue {
        HeaderValue {
            key: key.to_string(),
            raw_value: value.as_bytes().to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn inner_token_header_is_preferred() {
        let headers = vec![
            header("authorization", "Bearer aaa.bbb.ccc"),
            header("nursor-token", "T1"),
        ];
        assert_eq!(extract_inner_token(&headers).as_deref(), Some("T1"));
    }

    #[test]
    fn bearer_fallback_takes_last_dot_segment() {
        let headers = vec![header("authorization", "Bearer aaa.bbb.T9")];
        assert_eq!(extract_inner_token(&headers).as_deref(), Some("T9"));
    }

    #[test]
    fn dotless_authorization_yields_nothing() {
        let headers = vec![header("authorization", "Bearer opaque")];
        assert_eq!(extract_inner_token(&headers), None);
        assert_eq!(extract_inner_token(&[]), None);
    }

    #[test]
    fn provider_host_matches_by_suffix() {
        assert!(is_provider_host("api.cursor.com"));
        assert!(is_provider_host("cursor.sh"));
        assert!(!is_provider_host("example.com"));
        assert!(!is_provider_host("cursor.com.evil.net"));
    }

    #[test]
    fn marker_detection_scans_raw_bytes() {
        assert!(contains_marker(
            br#"{"error":"resource_exhausted"}"#,
            RESOURCE_EXHAUSTED_MARKER
        ));
        assert!(!contains_marker(b"pong", RESOURCE_EXHAUSTED_MARKER));
    }
}
