//! # 阶段应答构造
//!
//! 集中构造各阶段的 ProcessingResponse：透传、凭证改写、
//! 短路应答与 body 替换。

use crate::dispatch::AccountInfo;
use crate::filter::{CLIENT_KEY_HEADER, EXHAUSTED_REPLACEMENT_BODY, INNER_TOKEN_HEADER};
use crate::proto::{
    body_mutation, processing_response, BodyMutation, BodyResponse, CommonResponse,
    HeaderMutation, HeaderValue, HeaderValueOption, HeadersResponse, HttpStatus,
    ImmediateResponse, ProcessingResponse, StatusCode,
};

/// 伪装的"查询邮箱"应答：protobuf 帧——field 1 为固定邮箱，field 2 为 1
const SPOOFED_IDENTITY_BODY: &[u8] = b"\x0a\x10jimmylee@mit.edu\x10\x01";

/// 请求头阶段：空头部变换（透传）
#[must_use]
pub fn pass_through_request_headers() -> ProcessingResponse {
    ProcessingResponse {
        response: Some(processing_response::Response::RequestHeaders(
            HeadersResponse {
                response: Some(CommonResponse {
                    header_mutation: Some(HeaderMutation::default()),
                    ..Default::default()
                }),
            },
        )),
        ..Default::default()
    }
}

/// 请求头阶段：摘除入站鉴权头，注入池凭证与客户端身份键
#[must_use]
pub fn credential_rewrite(account: &AccountInfo) -> ProcessingResponse {
    ProcessingResponse {
        response: Some(processing_response::Response::RequestHeaders(
            HeadersResponse {
                response: Some(CommonResponse {
                    header_mutation: Some(HeaderMutation {
                        remove_headers: vec![
                            "authorization".to_string(),
                            INNER_TOKEN_HEADER.to_string(),
                        ],
                        set_headers: vec![
                            set_header(
                                "authorization",
                                format!("Bearer {}", account.access_token).into_bytes(),
                            ),
                            set_header(CLIENT_KEY_HEADER, account.client_key.clone().into_bytes()),
                        ],
                    }),
                    ..Default::default()
                }),
            },
        )),
        ..Default::default()
    }
}

/// 请求 body 阶段：透传
#[must_use]
pub fn pass_through_request_body() -> ProcessingResponse {
    ProcessingResponse {
        response: Some(processing_response::Response::RequestBody(BodyResponse {
            response: Some(CommonResponse::default()),
        })),
        ..Default::default()
    }
}

/// 响应头阶段：透传
#[must_use]
pub fn pass_through_response_headers() -> ProcessingResponse {
    ProcessingResponse {
        response: Some(processing_response::Response::ResponseHeaders(
            HeadersResponse {
                response: Some(CommonResponse::default()),
            },
        )),
        ..Default::default()
    }
}

/// 响应 body 阶段：透传或整体替换为耗尽占位字节
#[must_use]
pub fn response_body_reply(mutate: bool) -> ProcessingResponse {
    let body_mutation = mutate.then(|| BodyMutation {
        mutation: Some(body_mutation::Mutation::Body(
            EXHAUSTED_REPLACEMENT_BODY.to_vec(),
        )),
    });
    ProcessingResponse {
        response: Some(processing_response::Response::ResponseBody(BodyResponse {
            response: Some(CommonResponse {
                body_mutation,
                ..Default::default()
            }),
        })),
        ..Default::default()
    }
}

/// 空短路应答（终止下游请求，不附带正文）
#[must_use]
pub fn immediate_empty() -> ProcessingResponse {
    ProcessingResponse {
        response: Some(processing_response::Response::ImmediateResponse(
            ImmediateResponse::default(),
        )),
        ..Default::default()
    }
}

/// 401 短路应答，附带纯文本原因
#[must_use]
pub fn immediate_unauthorized(body: &str) -> ProcessingResponse {
    ProcessingResponse {
        response: Some(processing_response::Response::ImmediateResponse(
            ImmediateResponse {
                status: Some(HttpStatus {
                    code: StatusCode::Unauthorized as i32,
                }),
                body: body.as_bytes().to_vec(),
                headers: Some(HeaderMutation {
                    set_headers: vec![set_header("Content-Type", b"text/plain".to_vec())],
                    ..Default::default()
                }),
                ..Default::default()
            },
        )),
        ..Default::default()
    }
}

/// 伪装身份短路应答（"查询邮箱"RPC）
#[must_use]
pub fn identity_spoof() -> ProcessingResponse {
    ProcessingResponse {
        response: Some(processing_response::Response::ImmediateResponse(
            ImmediateResponse {
                body: SPOOFED_IDENTITY_BODY.to_vec(),
                ..Default::default()
            },
        )),
        ..Default::default()
    }
}

fn set_header(key: &str, raw_value: Vec<u8>) -> HeaderValueOption {
    HeaderValueOption {
        header: Some(HeaderValue {
            key: key.to_string(),
            raw_value,
            ..Default::default()
        }),
        append: Some(envoy_types::pb::google::protobuf::BoolValue { value: false }),
        ..Default::default()
    }
}
