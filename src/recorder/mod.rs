//! # 事务记录模块
//!
//! 生产端 → 持久化日志 → 消费端的异步记录管道：
//! 流引擎在流关闭时投递完整事务快照，消费端批量落库。

mod consumer;
mod producer;
mod record;
mod store;

pub use consumer::{process_payload, RecordConsumer};
pub use producer::{JetStreamSink, RecordSink};
pub use record::{set_record_timezone, TransactionRecord};
pub use store::RecordStore;

/// 持久化日志主题
pub const RECORD_SUBJECT: &str = "http-records";
/// JetStream 流名
pub const RECORD_STREAM: &str = "HTTP_RECORDS";
