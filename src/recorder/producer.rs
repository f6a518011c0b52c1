//! # 记录生产端
//!
//! 流引擎通过 `RecordSink` 投递完整事务；JetStream 实现进程内
//! 共享一个发布句柄，投递即忘（失败仅记日志，不影响请求链路）。

use crate::error::{GatewayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::recorder::{TransactionRecord, RECORD_SUBJECT};
use crate::{ldebug, lwarn};
use async_nats::jetstream;
use async_trait::async_trait;

/// 记录投递接口
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// 序列化并写入持久化日志（至少一次语义）
    async fn enqueue(&self, record: &TransactionRecord) -> Result<()>;
}

/// JetStream 记录生产端
pub struct JetStreamSink {
    js: jetstream::Context,
}

impl JetStreamSink {
    #[must_use]
    pub fn new(js: jetstream::Context) -> Self {
        Self { js }
    }
}

#[async_trait]
impl RecordSink for JetStreamSink {
    async fn enqueue(&self, record: &TransactionRecord) -> Result<()> {
        let payload = serde_json::to_vec(record)?;
        let ack = self
            .js
            .publish(RECORD_SUBJECT, payload.into())
            .await
            .map_err(|e| GatewayError::recorder_with_source("记录写入持久化日志失败", e))?;
        // 等待 broker 确认，保证至少一次
        ack.await
            .map_err(|e| GatewayError::recorder_with_source("持久化日志未确认写入", e))?;

        ldebug!(
            "system",
            LogStage::PostFlight,
            LogComponent::RecordProducer,
            "record_enqueued",
            &format!(
                "事务记录已入队: url={}, status={}, user_id={}",
                record.url, record.status, record.user_id
            )
        );
        Ok(())
    }
}

/// 确认流存在；不存在时告警并创建（启动检查，失败不阻断启动）
pub async fn ensure_stream(js: &jetstream::Context) {
    use crate::recorder::RECORD_STREAM;

    if js.get_stream(RECORD_STREAM).await.is_ok() {
        return;
    }
    lwarn!(
        "system",
        LogStage::Startup,
        LogComponent::RecordProducer,
        "stream_missing",
        &format!("持久化日志流 {RECORD_STREAM} 不存在，尝试创建")
    );
    if let Err(err) = js
        .get_or_create_stream(jetstream::stream::Config {
            name: RECORD_STREAM.to_string(),
            subjects: vec![RECORD_SUBJECT.to_string()],
            ..Default::default()
        })
        .await
    {
        lwarn!(
            "system",
            LogStage::Startup,
            LogComponent::RecordProducer,
            "stream_create_failed",
            &format!("创建持久化日志流失败: {err}")
        );
    }
}
