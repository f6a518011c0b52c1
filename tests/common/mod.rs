//! # 集成测试共享设施
//!
//! 内存 sqlite 用户库/记录库、内存缓存与记录捕获 sink。

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use entity::user_subscriptions::{PAYMENT_PAID, STATUS_ACTIVE};
use entity::{subscriptions, user_subscriptions, users};
use nursor_gateway::cache::{Cache, MemoryCache};
use nursor_gateway::error::Result;
use nursor_gateway::recorder::{RecordSink, TransactionRecord};
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Schema, Set,
};
use std::sync::{Arc, Mutex};

/// 建立内存 sqlite 用户库并创建用户侧三张表
pub async fn setup_user_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect sqlite");
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    for statement in [
        schema.create_table_from_entity(users::Entity),
        schema.create_table_from_entity(subscriptions::Entity),
        schema.create_table_from_entity(user_subscriptions::Entity),
    ] {
        db.execute(backend.build(&statement))
            .await
            .expect("create table");
    }
    db
}

/// 内存缓存句柄
pub fn memory_cache() -> Cache {
    Cache::new(Arc::new(MemoryCache::new()))
}

/// 插入一个套餐
pub async fn seed_tier(
    db: &DatabaseConnection,
    id: i32,
    duration_days: i32,
    cursor_ask_count: i32,
    traffic_limit: Option<i64>,
) -> subscriptions::Model {
    let now = Utc::now().naive_utc();
    subscriptions::ActiveModel {
        id: Set(id),
        name: Set(format!("tier-{id}")),
        duration: Set(duration_days),
        traffic_limit: Set(traffic_limit),
        cursor_ask_count: Set(cursor_ask_count),
        status: Set("active".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert tier")
}

/// 插入一个用户
pub async fn seed_user(db: &DatabaseConnection, id: i32, inner_token: &str) -> users::Model {
    let now = Utc::now().naive_utc();
    users::ActiveModel {
        id: Set(id),
        name: Set(format!("user-{id}")),
        email: Set(format!("user-{id}@example.com")),
        inner_token: Set(inner_token.to_string()),
        membership_type: Set("Premium".to_string()),
        is_dispatched: Set(false),
        usage: Set(0),
        expired_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("insert user")
}

/// 订阅种子参数
pub struct SubscriptionSeed {
    pub id: i32,
    pub user_id: i32,
    pub subscription_id: i32,
    pub status: &'static str,
    pub cursor_ask_usage: i32,
    pub used_traffic: i64,
    /// 距现在的结束偏移（天），负值表示已过期
    pub ends_in_days: i64,
    /// 创建时间相对现在的偏移（秒），用于控制激活顺序
    pub created_offset_secs: i64,
}

impl Default for SubscriptionSeed {
    fn default() -> Self {
        Self {
            id: 1,
            user_id: 1,
            subscription_id: 1,
            status: STATUS_ACTIVE,
            cursor_ask_usage: 0,
            used_traffic: 0,
            ends_in_days: 30,
            created_offset_secs: 0,
        }
    }
}

/// 插入一条订阅
pub async fn seed_subscription(
    db: &DatabaseConnection,
    seed: SubscriptionSeed,
) -> user_subscriptions::Model {
    let now = Utc::now().naive_utc();
    let created = now + ChronoDuration::seconds(seed.created_offset_secs);
    user_subscriptions::ActiveModel {
        id: Set(seed.id),
        user_id: Set(seed.user_id),
        subscription_id: Set(seed.subscription_id),
        start_date: Set(now - ChronoDuration::days(1)),
        end_date: Set(now + ChronoDuration::days(seed.ends_in_days)),
        status: Set(seed.status.to_string()),
        payment_status: Set(PAYMENT_PAID.to_string()),
        used_traffic: Set(seed.used_traffic),
        cursor_ask_usage: Set(seed.cursor_ask_usage),
        created_at: Set(created),
        updated_at: Set(created),
    }
    .insert(db)
    .await
    .expect("insert subscription")
}

/// 捕获型记录 sink：入队即存内存
#[derive(Default)]
pub struct CaptureSink {
    records: Mutex<Vec<TransactionRecord>>,
}

impl CaptureSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn records(&self) -> Vec<TransactionRecord> {
        self.records.lock().expect("capture sink poisoned").clone()
    }
}

#[async_trait]
impl RecordSink for CaptureSink {
    async fn enqueue(&self, record: &TransactionRecord) -> Result<()> {
        self.records
            .lock()
            .expect("capture sink poisoned")
            .push(record.clone());
        Ok(())
    }
}
