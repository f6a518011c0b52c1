//! # 事务记录类型
//!
//! 一条代理事务的完整快照：流打开时创建，流存活期间由流引擎
//! 独占修改，流关闭后交给记录管道，此后不可变。

use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// 单侧 body 缓冲上限（2 MiB）；超限后降级为占位内容
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// 记录时间戳使用的时区，进程内设置一次；未设置时用 UTC
static RECORD_TIMEZONE: OnceLock<Tz> = OnceLock::new();

/// 设置记录时间戳时区（重复设置为空操作）；时区名非法返回 false
pub fn set_record_timezone(timezone: &str) -> bool {
    match timezone.parse::<Tz>() {
        Ok(tz) => {
            let _ = RECORD_TIMEZONE.set(tz);
            true
        }
        Err(_) => false,
    }
}

fn wall_clock_string() -> String {
    let format = "%Y-%m-%d %H:%M:%S";
    match RECORD_TIMEZONE.get() {
        Some(tz) => Utc::now().with_timezone(tz).format(format).to_string(),
        None => Utc::now().format(format).to_string(),
    }
}

/// 超限占位内容
const TRUNCATED_PLACEHOLDER: &[u8] = b"[body omitted: buffer cap exceeded]";

/// HTTP 事务记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub request_headers: HashMap<String, String>,
    #[serde(with = "base64_bytes")]
    pub request_body: Vec<u8>,
    pub response_headers: HashMap<String, String>,
    #[serde(with = "base64_bytes")]
    pub response_body: Vec<u8>,
    pub url: String,
    pub method: String,
    pub host: String,
    pub create_at: String,
    pub http_version: String,
    pub user_id: i32,
    pub account_id: i32,
    pub inner_token_id: String,
    pub status: i32,
    #[serde(skip)]
    request_truncated: bool,
    #[serde(skip)]
    response_truncated: bool,
}

impl TransactionRecord {
    /// 创建新记录，`create_at` 取当前墙钟时间
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_headers: HashMap::new(),
            request_body: Vec::new(),
            response_headers: HashMap::new(),
            response_body: Vec::new(),
            url: String::new(),
            method: "POST".to_string(),
            host: String::new(),
            create_at: wall_clock_string(),
            http_version: "http/1.1".to_string(),
            user_id: 0,
            account_id: 0,
            inner_token_id: String::new(),
            status: 200,
            request_truncated: false,
            response_truncated: false,
        }
    }

    /// 记录请求头；重复键首值优先
    pub fn add_request_header(&mut self, key: &str, value: &str) {
        self.request_headers
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// 记录响应头；重复键首值优先
    pub fn add_response_header(&mut self, key: &str, value: &str) {
        self.response_headers
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// 追加请求 body 分块（按到达顺序），超限降级为占位内容
    pub fn append_request_body(&mut self, chunk: &[u8]) {
        append_bounded(&mut self.request_body, &mut self.request_truncated, chunk);
    }

    /// 追加响应 body 分块（按到达顺序），超限降级为占位内容
    pub fn append_response_body(&mut self, chunk: &[u8]) {
        append_bounded(&mut self.response_body, &mut self.response_truncated, chunk);
    }
}

impl Default for TransactionRecord {
    fn default() -> Self {
        Self::new()
    }
}

fn append_bounded(buffer: &mut Vec<u8>, truncated: &mut bool, chunk: &[u8]) {
    if *truncated {
        return;
    }
    if buffer.len() + chunk.len() > MAX_BODY_BYTES {
        *truncated = true;
        buffer.clear();
        buffer.extend_from_slice(TRUNCATED_PLACEHOLDER);
        return;
    }
    buffer.extend_from_slice(chunk);
}

/// body 字段的 JSON 编码：base64 字符串
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_stream_open_semantics() {
        let record = TransactionRecord::new();
        assert_eq!(record.status, 200);
        assert_eq!(record.user_id, 0);
        assert_eq!(record.account_id, 0);
        assert_eq!(record.method, "POST");
        assert!(!record.create_at.is_empty());
    }

    #[test]
    fn duplicate_header_keeps_first_value() {
        let mut record = TransactionRecord::new();
        record.add_request_header("x-test", "first");
        record.add_request_header("x-test", "second");
        assert_eq!(record.request_headers["x-test"], "first");
    }

    #[test]
    fn body_chunks_accumulate_in_order() {
        let mut record = TransactionRecord::new();
        record.append_request_body(b"hel");
        record.append_request_body(b"lo");
        assert_eq!(record.request_body, b"hello");
    }

    #[test]
    fn oversized_body_degrades_to_placeholder() {
        let mut record = TransactionRecord::new();
        record.append_response_body(&vec![0u8; MAX_BODY_BYTES]);
        record.append_response_body(b"x");
        assert_eq!(record.response_body, b"[body omitted: buffer cap exceeded]");
        // 后续分块被忽略
        record.append_response_body(b"more");
        assert_eq!(record.response_body, b"[body omitted: buffer cap exceeded]");
    }

    #[test]
    fn json_shape_encodes_bodies_as_base64() {
        let mut record = TransactionRecord::new();
        record.append_request_body(b"hello");
        record.append_response_body(b"pong");
        let json: serde_json::Value = serde_json::to_value(&record).unwrap();
        assert_eq!(json["request_body"], "aGVsbG8=");
        assert_eq!(json["response_body"], "cG9uZw==");

        let decoded: TransactionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.request_body, b"hello");
        assert_eq!(decoded.response_body, b"pong");
    }
}
