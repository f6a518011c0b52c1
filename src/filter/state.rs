//! # 流内状态

use crate::dispatch::AccountInfo;
use crate::recorder::TransactionRecord;

/// 单条代理流的全部可变状态
///
/// 每条流独占一份，流内单线程访问，响应顺序不变式由此天然成立。
pub struct StreamState {
    /// 日志关联用的流 ID
    pub stream_id: String,
    /// 本条流的事务快照
    pub record: TransactionRecord,
    /// 是否命中受监控的聊天 RPC
    pub is_chat_request: bool,
    /// 上游响应状态 ≥ 400
    pub chat_exception: bool,
    /// 本条流绑定的上游凭证
    pub account: Option<AccountInfo>,
}

impl StreamState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stream_id: uuid::Uuid::new_v4().to_string()[..8].to_string(),
            record: TransactionRecord::new(),
            is_chat_request: false,
            chat_exception: false,
            account: None,
        }
    }
}

impl Default for StreamState {
    fn default() -> Self {
        Self::new()
    }
}
