//! # 流收尾
//!
//! 流关闭后的异步收尾：投递事务记录，并按结果做用量入账或
//! 凭证轮换。收尾运行在与代理流无关的新任务上，代理取消不影响它；
//! 所有错误记日志后吞掉。

use crate::cache::{Cache, CacheKey};
use crate::dispatch::DispatchClient;
use crate::filter::StreamState;
use crate::logging::{LogComponent, LogStage};
use crate::recorder::RecordSink;
use crate::users::UserService;
use crate::{ldebug, lerror, lwarn};
use std::sync::Arc;

/// 收尾执行器
pub struct PostFlight {
    dispatch: Arc<DispatchClient>,
    users: Arc<UserService>,
    sink: Arc<dyn RecordSink>,
    cache: Cache,
}

impl PostFlight {
    #[must_use]
    pub fn new(
        dispatch: Arc<DispatchClient>,
        users: Arc<UserService>,
        sink: Arc<dyn RecordSink>,
        cache: Cache,
    ) -> Self {
        Self {
            dispatch,
            users,
            sink,
            cache,
        }
    }

    /// 执行收尾
    ///
    /// 记录永远投递；聊天流按是否异常二选一：正常入账用量，
    /// 异常禁用凭证并触发池侧轮换（禁用即不入账）。
    pub async fn run(&self, state: StreamState) {
        let stream_id = state.stream_id.clone();

        if let Err(err) = self.sink.enqueue(&state.record).await {
            lerror!(
                &stream_id,
                LogStage::PostFlight,
                LogComponent::Filter,
                "enqueue_failed",
                &format!("事务记录投递失败（本条丢失）: {err}")
            );
        }

        if !state.is_chat_request {
            return;
        }
        let Some(account) = state.account else {
            return;
        };

        if state.chat_exception {
            if let Err(err) = self.dispatch.disable_with_check(account.id).await {
                lerror!(
                    &stream_id,
                    LogStage::PostFlight,
                    LogComponent::Filter,
                    "disable_failed",
                    &format!("禁用凭证 {} 失败: {err}", account.id)
                );
            }
            // 本地就绪集合同步剔除；下次请求会重新绑定
            let _ = self
                .cache
                .store()
                .set_remove(
                    &CacheKey::AvailableAccounts.build(),
                    &account.id.to_string(),
                )
                .await;
            let _ = self
                .cache
                .delete(&CacheKey::AccountUsage {
                    account_id: account.id,
                })
                .await;
            return;
        }

        if let Err(err) = self.dispatch.increment_usage(account.id).await {
            lwarn!(
                &stream_id,
                LogStage::PostFlight,
                LogComponent::Filter,
                "usage_inc_failed",
                &format!("凭证 {} 用量入账失败: {err}", account.id)
            );
        }
        if let Err(err) = self
            .cache
            .incr_by(
                &CacheKey::AccountUsage {
                    account_id: account.id,
                },
                1,
            )
            .await
        {
            lwarn!(
                &stream_id,
                LogStage::PostFlight,
                LogComponent::Filter,
                "usage_counter_failed",
                &format!("凭证 {} 用量计数失败: {err}", account.id)
            );
        }

        // 用户侧调用配额入账；耗尽/过期在下一次解析时生效
        if !state.record.inner_token_id.is_empty() {
            if let Err(err) = self
                .users
                .increment_ask_usage(&state.record.inner_token_id)
                .await
            {
                lwarn!(
                    &stream_id,
                    LogStage::PostFlight,
                    LogComponent::Filter,
                    "ask_usage_failed",
                    &format!("用户调用配额入账失败: {err}")
                );
            }
        }

        ldebug!(
            &stream_id,
            LogStage::PostFlight,
            LogComponent::Filter,
            "post_flight_done",
            &format!("流收尾完成: account_id={}", account.id)
        );
    }
}
