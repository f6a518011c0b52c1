//! # 记录消费端
//!
//! 单读者循环 + 宽度 5 的工作池：读取持久化日志中的事务记录，
//! 反序列化后落库。读失败退避重试，连续出错重建读者；
//! 落库失败记日志后丢弃该条（消费进度以处理成功为准）。

use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::recorder::{RecordStore, TransactionRecord, RECORD_STREAM, RECORD_SUBJECT};
use crate::{ldebug, lerror, linfo, lwarn};
use async_nats::jetstream;
use async_nats::jetstream::consumer::{pull, AckPolicy, DeliverPolicy};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 工作池宽度
const WORKER_POOL_SIZE: usize = 5;
/// 连续读错误达到该值后重建读者
const MAX_CONSECUTIVE_ERRORS: u32 = 5;
/// 流结束（EOF）后的退避
const EOF_BACKOFF: Duration = Duration::from_secs(5);
/// 其他读错误的退避
const ERROR_BACKOFF: Duration = Duration::from_secs(2);

/// 记录消费端
pub struct RecordConsumer {
    js: jetstream::Context,
    store: Arc<RecordStore>,
    workers: Arc<Semaphore>,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl RecordConsumer {
    #[must_use]
    pub fn new(js: jetstream::Context, store: Arc<RecordStore>) -> Self {
        Self {
            js,
            store,
            workers: Arc::new(Semaphore::new(WORKER_POOL_SIZE)),
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// 启动消费循环
    ///
    /// 启动前校验主题存在（缺失仅告警并创建，不阻断启动）。
    pub async fn start(&self) -> Result<()> {
        super::producer::ensure_stream(&self.js).await;

        let js = self.js.clone();
        let store = self.store.clone();
        let workers = self.workers.clone();
        let shutdown = self.shutdown.clone();

        let handle = tokio::spawn(async move {
            reader_loop(js, store, workers, shutdown).await;
        });
        *self.handle.lock().await = Some(handle);

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::RecordConsumer,
            "consumer_started",
            "记录消费端已启动"
        );
        Ok(())
    }

    /// 停止消费：关闭读者并等待在途工作协程排空
    pub async fn stop(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            if let Err(err) = handle.await {
                lwarn!(
                    "system",
                    LogStage::Shutdown,
                    LogComponent::RecordConsumer,
                    "reader_join_failed",
                    &format!("等待读者退出失败: {err}")
                );
            }
        }
        // 占满全部槽位即代表在途工作全部完成
        let _ = self
            .workers
            .acquire_many(WORKER_POOL_SIZE as u32)
            .await
            .expect("worker semaphore closed");
        linfo!(
            "system",
            LogStage::Shutdown,
            LogComponent::RecordConsumer,
            "consumer_stopped",
            "记录消费端已停止"
        );
    }
}

/// 读者主循环：外层负责（重）建读者，内层逐条分发
async fn reader_loop(
    js: jetstream::Context,
    store: Arc<RecordStore>,
    workers: Arc<Semaphore>,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            return;
        }

        let mut messages = match build_reader(&js).await {
            Ok(messages) => messages,
            Err(err) => {
                lwarn!(
                    "system",
                    LogStage::BackgroundTask,
                    LogComponent::RecordConsumer,
                    "reader_build_failed",
                    &format!("创建持久化日志读者失败: {err}")
                );
                tokio::select! {
                    () = shutdown.cancelled() => return,
                    () = tokio::time::sleep(ERROR_BACKOFF) => continue,
                }
            }
        };

        let mut consecutive_errors: u32 = 0;
        loop {
            let next = tokio::select! {
                () = shutdown.cancelled() => return,
                next = messages.next() => next,
            };

            match next {
                Some(Ok(message)) => {
                    consecutive_errors = 0;
                    let permit = workers
                        .clone()
                        .acquire_owned()
                        .await
                        .expect("worker semaphore closed");
                    let store = store.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        handle_message(&store, message).await;
                    });
                }
                Some(Err(err)) => {
                    consecutive_errors += 1;
                    lwarn!(
                        "system",
                        LogStage::BackgroundTask,
                        LogComponent::RecordConsumer,
                        "read_failed",
                        &format!(
                            "读取持久化日志失败 ({consecutive_errors}/{MAX_CONSECUTIVE_ERRORS}): {err}"
                        )
                    );
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        // 关闭当前读者并重建连接
                        break;
                    }
                    tokio::select! {
                        () = shutdown.cancelled() => return,
                        () = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
                None => {
                    ldebug!(
                        "system",
                        LogStage::BackgroundTask,
                        LogComponent::RecordConsumer,
                        "reader_eof",
                        "持久化日志读者到达流末尾，退避后重建"
                    );
                    tokio::select! {
                        () = shutdown.cancelled() => return,
                        () = tokio::time::sleep(EOF_BACKOFF) => {}
                    }
                    break;
                }
            }
        }
    }
}

/// 建立从最新位点开始的简单读者（无消费组）
async fn build_reader(js: &jetstream::Context) -> Result<pull::Stream> {
    use crate::error::GatewayError;

    let stream = js
        .get_or_create_stream(jetstream::stream::Config {
            name: RECORD_STREAM.to_string(),
            subjects: vec![RECORD_SUBJECT.to_string()],
            ..Default::default()
        })
        .await
        .map_err(|e| GatewayError::recorder_with_source("获取持久化日志流失败", e))?;

    let consumer = stream
        .create_consumer(pull::Config {
            deliver_policy: DeliverPolicy::New,
            ack_policy: AckPolicy::Explicit,
            ..Default::default()
        })
        .await
        .map_err(|e| GatewayError::recorder_with_source("创建持久化日志读者失败", e))?;

    consumer
        .messages()
        .await
        .map_err(|e| GatewayError::recorder_with_source("订阅持久化日志失败", e))
}

async fn handle_message(store: &RecordStore, message: jetstream::Message) {
    if let Err(err) = process_payload(store, &message.payload).await {
        // 落库失败丢弃该条，不做重投
        lerror!(
            "system",
            LogStage::BackgroundTask,
            LogComponent::RecordConsumer,
            "process_failed",
            &format!("处理事务记录失败: {err}")
        );
    }
    if let Err(err) = message.ack().await {
        lwarn!(
            "system",
            LogStage::BackgroundTask,
            LogComponent::RecordConsumer,
            "ack_failed",
            &format!("确认消息失败: {err}")
        );
    }
}

/// 处理一条日志载荷：反序列化并落库
pub async fn process_payload(store: &RecordStore, payload: &[u8]) -> Result<()> {
    let record: TransactionRecord = serde_json::from_slice(payload)?;
    store.save(&record).await?;
    ldebug!(
        "system",
        LogStage::BackgroundTask,
        LogComponent::RecordConsumer,
        "record_processed",
        &format!(
            "事务记录已落库: url={}, method={}, status={}",
            record.url, record.method, record.status
        )
    );
    Ok(())
}
