//! # ext_proc 协议类型
//!
//! Envoy `ext_proc` v3 的 protobuf / tonic 绑定统一出口，
//! 业务代码不直接引用生成树的深层路径。

pub use envoy_types::pb::envoy::config::core::v3::{HeaderMap, HeaderValue, HeaderValueOption};
pub use envoy_types::pb::envoy::r#type::v3::{HttpStatus, StatusCode};
pub use envoy_types::pb::envoy::service::ext_proc::v3::{
    body_mutation, external_processor_server, processing_request, processing_response,
    BodyMutation, BodyResponse, CommonResponse, HeaderMutation, HeadersResponse, HttpBody,
    HttpHeaders, ImmediateResponse, ProcessingRequest, ProcessingResponse,
};
