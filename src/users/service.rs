//! # 用户服务
//!
//! 带短 TTL 缓存的用户解析与订阅权益评估。订阅状态机单向：
//! pending → active → expired；激活路径持有按用户的缓存锁，
//! 并发激活下全局至多一条 active。

use crate::cache::{Cache, CacheKey};
use crate::error::{GatewayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};
use chrono::Utc;
use entity::user_subscriptions::{PAYMENT_PAID, STATUS_ACTIVE, STATUS_EXPIRED, STATUS_PENDING};
use entity::{subscriptions, user_subscriptions, users};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 用户缓存 TTL
const USER_CACHE_TTL: Duration = Duration::from_secs(300);
/// 订阅列表缓存 TTL
const SUBSCRIPTION_CACHE_TTL: Duration = Duration::from_secs(300);
/// 激活锁 TTL，防止持锁方崩溃后死锁
const ACTIVATION_LOCK_TTL: Duration = Duration::from_secs(10);

/// 订阅及其套餐的联合投影（订阅缓存的存储单元）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionWithTier {
    pub subscription: user_subscriptions::Model,
    pub tier: Option<subscriptions::Model>,
}

/// 用户服务
pub struct UserService {
    db: DatabaseConnection,
    cache: Cache,
}

impl UserService {
    #[must_use]
    pub fn new(db: DatabaseConnection, cache: Cache) -> Self {
        Self { db, cache }
    }

    /// 按内部令牌解析用户
    ///
    /// 缓存命中直接返回；未命中回源用户库并缓存 5 分钟。解析成功后
    /// 评估权益，不可用时尝试激活待生效订阅——激活与否都返回用户，
    /// 真正的拒绝由凭证池的 402 完成。查无此人返回 `Ok(None)`。
    pub async fn resolve(&self, inner_token: &str) -> Result<Option<users::Model>> {
        let Some(user) = self.fetch_by_inner_token(inner_token).await? else {
            return Ok(None);
        };

        let available = self.availability(&user).await?;
        if !available {
            match self.activate_pending(user.id).await? {
                Some(activated) => ldebug!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::UserService,
                    "subscription_activated",
                    &format!(
                        "用户 {} 激活待生效订阅 {}",
                        user.id, activated.id
                    )
                ),
                None => lwarn!(
                    "system",
                    LogStage::Authentication,
                    LogComponent::UserService,
                    "no_pending_subscription",
                    &format!("用户 {} 无可激活的待生效订阅", user.id)
                ),
            }
        }

        Ok(Some(user))
    }

    /// 按用户 ID 直查（不走缓存）
    pub async fn get_by_id(&self, user_id: i32) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(user_id)
            .one(&self.db)
            .await
            .map_err(Into::into)
    }

    /// 评估用户权益是否可用
    ///
    /// 逐条检查 active 订阅：到期、流量超限或调用次数超限的订阅
    /// 原子降级为 expired；任何降级都会失效订阅缓存。
    pub async fn availability(&self, user: &users::Model) -> Result<bool> {
        let subs = self
            .subscriptions_with_status(user.id, STATUS_ACTIVE)
            .await?;

        let now = Utc::now().naive_utc();
        let mut usable = false;
        let mut demoted = false;
        for entry in subs {
            let sub = entry.subscription;
            let Some(tier) = entry.tier else {
                lwarn!(
                    "system",
                    LogStage::Db,
                    LogComponent::UserService,
                    "tier_missing",
                    &format!("订阅 {} 缺少套餐记录", sub.id)
                );
                continue;
            };
            let over_traffic = tier
                .traffic_limit
                .is_some_and(|limit| sub.used_traffic >= limit);
            let over_asks = sub.cursor_ask_usage >= tier.cursor_ask_count;
            if sub.end_date <= now || over_traffic || over_asks {
                self.demote_to_expired(sub).await?;
                demoted = true;
                continue;
            }
            usable = true;
            break;
        }

        if demoted || !usable {
            self.clear_subscription_cache(user.id).await;
        }

        Ok(usable)
    }

    /// 激活最早的待生效订阅
    ///
    /// 已有 active 订阅则不动作。激活在按用户的缓存锁内执行，
    /// 锁内重读 active 集合，保证并发激活时至多一条 active。
    pub async fn activate_pending(
        &self,
        user_id: i32,
    ) -> Result<Option<user_subscriptions::Model>> {
        if !self
            .load_subscriptions(user_id, STATUS_ACTIVE)
            .await?
            .is_empty()
        {
            return Ok(None);
        }

        let lock_key = CacheKey::ActivationLock { user_id };
        if !self.cache.try_lock(&lock_key, ACTIVATION_LOCK_TTL).await? {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::UserService,
                "activation_contended",
                &format!("用户 {user_id} 的订阅激活锁被占用，跳过")
            );
            return Ok(None);
        }

        let outcome = self.activate_pending_locked(user_id).await;
        if let Err(err) = self.cache.unlock(&lock_key).await {
            lwarn!(
                "system",
                LogStage::Cache,
                LogComponent::UserService,
                "unlock_failed",
                &format!("释放激活锁失败: {err}")
            );
        }
        outcome
    }

    async fn activate_pending_locked(
        &self,
        user_id: i32,
    ) -> Result<Option<user_subscriptions::Model>> {
        // 锁内重读，挡住锁外检查与加锁之间完成激活的并发方
        if !self
            .load_subscriptions(user_id, STATUS_ACTIVE)
            .await?
            .is_empty()
        {
            return Ok(None);
        }

        let mut pending = self.load_subscriptions(user_id, STATUS_PENDING).await?;
        if pending.is_empty() {
            return Ok(None);
        }
        let (sub, tier) = pending.remove(0);
        let tier = tier.ok_or_else(|| {
            GatewayError::database(format!("订阅 {} 缺少套餐记录，无法计算有效期", sub.id))
        })?;

        let now = Utc::now().naive_utc();
        let mut active: user_subscriptions::ActiveModel = sub.into();
        active.status = Set(STATUS_ACTIVE.to_string());
        active.start_date = Set(now);
        active.end_date = Set(now + chrono::Duration::days(i64::from(tier.duration)));
        active.updated_at = Set(now);
        let updated = active.update(&self.db).await?;

        self.clear_subscription_cache(user_id).await;
        Ok(Some(updated))
    }

    /// 用户侧调用计数：active 订阅的 `cursor_ask_usage` 加一
    ///
    /// 达到套餐上限或订阅已过期时降级为 expired 并尝试激活下一条，
    /// 分别报告权益耗尽 / 订阅过期。
    pub async fn increment_ask_usage(&self, inner_token: &str) -> Result<()> {
        let user = self
            .fetch_by_inner_token(inner_token)
            .await?
            .ok_or_else(|| GatewayError::auth(format!("令牌未绑定用户: {inner_token}")))?;

        let mut subs = self.load_subscriptions(user.id, STATUS_ACTIVE).await?;
        if subs.is_empty() {
            return Err(GatewayError::entitlement_exhausted("no active subscription"));
        }
        let (sub, tier) = subs.remove(0);
        let tier = tier
            .ok_or_else(|| GatewayError::database(format!("订阅 {} 缺少套餐记录", sub.id)))?;

        let now = Utc::now().naive_utc();
        let next_usage = sub.cursor_ask_usage + 1;

        if next_usage >= tier.cursor_ask_count {
            let mut expired: user_subscriptions::ActiveModel = sub.into();
            expired.cursor_ask_usage = Set(next_usage);
            expired.status = Set(STATUS_EXPIRED.to_string());
            expired.updated_at = Set(now);
            expired.update(&self.db).await?;
            self.clear_subscription_cache(user.id).await;
            self.activate_next_quietly(user.id).await;
            return Err(GatewayError::entitlement_exhausted(
                "cursor ask usage limit reached",
            ));
        }

        if sub.end_date <= now {
            self.demote_to_expired(sub).await?;
            self.clear_subscription_cache(user.id).await;
            self.activate_next_quietly(user.id).await;
            return Err(GatewayError::subscription_expired("subscription expired"));
        }

        let mut bumped: user_subscriptions::ActiveModel = sub.into();
        bumped.cursor_ask_usage = Set(next_usage);
        bumped.updated_at = Set(now);
        bumped.update(&self.db).await?;
        Ok(())
    }

    /// 带缓存的订阅列表读取（5 分钟，状态变更时显式失效）
    pub async fn subscriptions_with_status(
        &self,
        user_id: i32,
        status: &str,
    ) -> Result<Vec<SubscriptionWithTier>> {
        let key = CacheKey::UserSubscription {
            user_id,
            status: status.to_string(),
        };
        if let Some(cached) = self.cache.get_json::<Vec<SubscriptionWithTier>>(&key).await? {
            return Ok(cached);
        }

        let loaded = self
            .load_subscriptions(user_id, status)
            .await?
            .into_iter()
            .map(|(subscription, tier)| SubscriptionWithTier { subscription, tier })
            .collect::<Vec<_>>();

        if let Err(err) = self
            .cache
            .set_json(&key, &loaded, SUBSCRIPTION_CACHE_TTL)
            .await
        {
            lwarn!(
                "system",
                LogStage::Cache,
                LogComponent::UserService,
                "subscription_cache_write_failed",
                &format!("订阅缓存写入失败: {err}")
            );
        }
        Ok(loaded)
    }

    /// 订阅列表直查（绕过缓存；激活等写路径使用）
    async fn load_subscriptions(
        &self,
        user_id: i32,
        status: &str,
    ) -> Result<Vec<(user_subscriptions::Model, Option<subscriptions::Model>)>> {
        user_subscriptions::Entity::find()
            .filter(user_subscriptions::Column::UserId.eq(user_id))
            .filter(user_subscriptions::Column::Status.eq(status))
            .filter(user_subscriptions::Column::PaymentStatus.eq(PAYMENT_PAID))
            .order_by_asc(user_subscriptions::Column::CreatedAt)
            .find_also_related(subscriptions::Entity)
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    async fn fetch_by_inner_token(&self, inner_token: &str) -> Result<Option<users::Model>> {
        let key = CacheKey::UserInnerToken {
            token: inner_token.to_string(),
        };
        if let Some(user) = self.cache.get_json::<users::Model>(&key).await? {
            return Ok(Some(user));
        }

        let user = users::Entity::find()
            .filter(users::Column::InnerToken.eq(inner_token))
            .one(&self.db)
            .await?;

        if let Some(user) = &user {
            if let Err(err) = self.cache.set_json(&key, user, USER_CACHE_TTL).await {
                lwarn!(
                    "system",
                    LogStage::Cache,
                    LogComponent::UserService,
                    "user_cache_write_failed",
                    &format!("用户缓存写入失败: {err}")
                );
            }
        }
        Ok(user)
    }

    async fn demote_to_expired(&self, sub: user_subscriptions::Model) -> Result<()> {
        let mut expired: user_subscriptions::ActiveModel = sub.into();
        expired.status = Set(STATUS_EXPIRED.to_string());
        expired.updated_at = Set(Utc::now().naive_utc());
        expired.update(&self.db).await?;
        Ok(())
    }

    async fn activate_next_quietly(&self, user_id: i32) {
        if let Err(err) = self.activate_pending(user_id).await {
            lwarn!(
                "system",
                LogStage::Authentication,
                LogComponent::UserService,
                "activate_pending_failed",
                &format!("用户 {user_id} 激活待生效订阅失败: {err}")
            );
        }
    }

    /// 失效某用户全部状态的订阅缓存
    pub async fn clear_subscription_cache(&self, user_id: i32) {
        for status in [STATUS_ACTIVE, STATUS_PENDING, STATUS_EXPIRED] {
            let key = CacheKey::UserSubscription {
                user_id,
                status: status.to_string(),
            };
            if let Err(err) = self.cache.delete(&key).await {
                lwarn!(
                    "system",
                    LogStage::Cache,
                    LogComponent::UserService,
                    "subscription_cache_clear_failed",
                    &format!("订阅缓存失效失败 ({key}): {err}")
                );
            }
        }
    }

    /// 失效用户令牌缓存（订阅状态跃迁后的显式失效入口）
    pub async fn invalidate_user_cache(&self, inner_token: &str) {
        let key = CacheKey::UserInnerToken {
            token: inner_token.to_string(),
        };
        if let Err(err) = self.cache.delete(&key).await {
            lwarn!(
                "system",
                LogStage::Cache,
                LogComponent::UserService,
                "user_cache_clear_failed",
                &format!("用户缓存失效失败: {err}")
            );
        }
    }
}
