//! # 凭证池维护任务
//!
//! 周期 10 秒的后台循环：超过轮换阈值的就绪凭证触发禁用轮换，
//! 就绪量低于保有目标时从凭证池补充。单步失败记日志，下个周期继续。

use crate::cache::{Cache, CacheKey};
use crate::dispatch::DispatchClient;
use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo, lwarn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 维护周期
const MAINTAIN_PERIOD: Duration = Duration::from_secs(10);

/// 凭证池维护任务
pub struct PoolMaintainer {
    dispatch: Arc<DispatchClient>,
    cache: Cache,
    /// 就绪凭证保有目标
    keep_size: usize,
    /// 单凭证轮换阈值
    rotate_threshold: i64,
    shutdown: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PoolMaintainer {
    #[must_use]
    pub fn new(
        dispatch: Arc<DispatchClient>,
        cache: Cache,
        keep_size: usize,
        rotate_threshold: i64,
    ) -> Self {
        Self {
            dispatch,
            cache,
            keep_size,
            rotate_threshold,
            shutdown: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// 启动周期任务
    pub async fn start(self: &Arc<Self>) {
        let maintainer = self.clone();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MAINTAIN_PERIOD);
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                if let Err(err) = maintainer.run_once().await {
                    lwarn!(
                        "system",
                        LogStage::BackgroundTask,
                        LogComponent::Maintainer,
                        "maintain_tick_failed",
                        &format!("凭证池维护失败: {err}")
                    );
                }
            }
        });
        *self.handle.lock().await = Some(handle);
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Maintainer,
            "maintainer_started",
            &format!(
                "凭证池维护任务已启动: keep_size={}, rotate_threshold={}",
                self.keep_size, self.rotate_threshold
            )
        );
    }

    /// 停止周期任务
    pub async fn stop(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.handle.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// 单次维护：先轮换超限凭证，再补足就绪量
    pub async fn run_once(&self) -> Result<()> {
        let ready_key = CacheKey::AvailableAccounts.build();
        let members = self.cache.store().set_members(&ready_key).await?;

        for member in &members {
            let Ok(account_id) = member.parse::<i32>() else {
                lwarn!(
                    "system",
                    LogStage::BackgroundTask,
                    LogComponent::Maintainer,
                    "bad_member",
                    &format!("就绪集合中存在非法成员: {member}")
                );
                continue;
            };
            let usage_key = CacheKey::AccountUsage { account_id };
            let usage = self.cache.counter(&usage_key).await?;
            if usage <= self.rotate_threshold {
                continue;
            }

            linfo!(
                "system",
                LogStage::BackgroundTask,
                LogComponent::Maintainer,
                "rotate_account",
                &format!("凭证 {account_id} 用量 {usage} 超过阈值，触发轮换")
            );
            if let Err(err) = self.dispatch.disable_with_check(account_id).await {
                lwarn!(
                    "system",
                    LogStage::BackgroundTask,
                    LogComponent::Maintainer,
                    "rotate_failed",
                    &format!("凭证 {account_id} 轮换失败: {err}")
                );
                continue;
            }
            self.cache.store().set_remove(&ready_key, member).await?;
            self.cache.delete(&usage_key).await?;
        }

        let ready = self.cache.store().set_card(&ready_key).await? as usize;
        if ready < self.keep_size {
            let deficit = self.keep_size - ready;
            match self.dispatch.fetch_available(deficit).await {
                Ok(accounts) => {
                    let fetched = accounts.len();
                    for account in accounts {
                        self.cache
                            .store()
                            .set_add(&ready_key, &account.id.to_string())
                            .await?;
                    }
                    ldebug!(
                        "system",
                        LogStage::BackgroundTask,
                        LogComponent::Maintainer,
                        "replenished",
                        &format!("补充就绪凭证 {fetched}/{deficit}")
                    );
                }
                Err(err) => lwarn!(
                    "system",
                    LogStage::BackgroundTask,
                    LogComponent::Maintainer,
                    "replenish_failed",
                    &format!("补充就绪凭证失败: {err}")
                ),
            }
        }

        Ok(())
    }
}
