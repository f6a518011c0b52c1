//! # 用户服务集成测试
//!
//! sqlite + 内存缓存：令牌解析缓存、可用性评估与降级、
//! 待生效订阅激活、调用配额入账的滚动换挡。

mod common;

use chrono::Utc;
use common::{memory_cache, seed_subscription, seed_tier, seed_user, setup_user_db, SubscriptionSeed};
use entity::user_subscriptions::{STATUS_ACTIVE, STATUS_EXPIRED, STATUS_PENDING};
use entity::{user_subscriptions, users};
use nursor_gateway::error::GatewayError;
use nursor_gateway::users::UserService;
use sea_orm::{ColumnTrait, EntityTrait, ModelTrait, QueryFilter};

#[tokio::test]
async fn resolve_caches_user_for_subsequent_lookups() {
    let db = setup_user_db().await;
    let cache = memory_cache();
    let service = UserService::new(db.clone(), cache);

    seed_tier(&db, 1, 30, 100, None).await;
    let user = seed_user(&db, 1, "T1").await;
    seed_subscription(&db, SubscriptionSeed::default()).await;

    let resolved = service.resolve("T1").await.unwrap().unwrap();
    assert_eq!(resolved.id, 1);

    // 删除数据库行后仍可命中缓存
    user.delete(&db).await.unwrap();
    let cached = service.resolve("T1").await.unwrap().unwrap();
    assert_eq!(cached.inner_token, "T1");
}

#[tokio::test]
async fn resolve_unknown_token_returns_none() {
    let db = setup_user_db().await;
    let service = UserService::new(db, memory_cache());
    assert!(service.resolve("NOPE").await.unwrap().is_none());
}

#[tokio::test]
async fn availability_demotes_expired_subscription() {
    let db = setup_user_db().await;
    let service = UserService::new(db.clone(), memory_cache());

    seed_tier(&db, 1, 30, 100, None).await;
    let user = seed_user(&db, 1, "T1").await;
    seed_subscription(
        &db,
        SubscriptionSeed {
            ends_in_days: -1,
            ..Default::default()
        },
    )
    .await;

    assert!(!service.availability(&user).await.unwrap());
    let sub = user_subscriptions::Entity::find_by_id(1)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, STATUS_EXPIRED);

    // 降级单向：再评估一次，状态不回退
    assert!(!service.availability(&user).await.unwrap());
    let sub = user_subscriptions::Entity::find_by_id(1)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, STATUS_EXPIRED);
}

#[tokio::test]
async fn availability_demotes_on_quota_overrun() {
    let db = setup_user_db().await;
    let service = UserService::new(db.clone(), memory_cache());

    seed_tier(&db, 1, 30, 100, Some(50)).await;
    let user = seed_user(&db, 1, "T1").await;
    // 流量超限
    seed_subscription(
        &db,
        SubscriptionSeed {
            id: 1,
            used_traffic: 50,
            ..Default::default()
        },
    )
    .await;
    // 调用次数超限
    seed_subscription(
        &db,
        SubscriptionSeed {
            id: 2,
            cursor_ask_usage: 100,
            created_offset_secs: 1,
            ..Default::default()
        },
    )
    .await;

    assert!(!service.availability(&user).await.unwrap());
    for id in [1, 2] {
        let sub = user_subscriptions::Entity::find_by_id(id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sub.status, STATUS_EXPIRED, "subscription {id} must expire");
    }
}

#[tokio::test]
async fn activate_pending_promotes_oldest_paid_subscription() {
    let db = setup_user_db().await;
    let service = UserService::new(db.clone(), memory_cache());

    seed_tier(&db, 1, 30, 100, None).await;
    seed_user(&db, 1, "T1").await;
    seed_subscription(
        &db,
        SubscriptionSeed {
            id: 1,
            status: STATUS_PENDING,
            created_offset_secs: -60,
            ..Default::default()
        },
    )
    .await;
    seed_subscription(
        &db,
        SubscriptionSeed {
            id: 2,
            status: STATUS_PENDING,
            ..Default::default()
        },
    )
    .await;

    let activated = service.activate_pending(1).await.unwrap().unwrap();
    assert_eq!(activated.id, 1, "oldest pending wins");
    assert_eq!(activated.status, STATUS_ACTIVE);

    // 有效期 = 激活时刻 + 套餐时长（30 天）
    let lifetime = activated.end_date - activated.start_date;
    assert_eq!(lifetime.num_days(), 30);
    let started_secs = (activated.start_date - Utc::now().naive_utc())
        .num_seconds()
        .abs();
    assert!(started_secs < 5, "start date anchors at activation time");

    // 已有 active：再次激活为 no-op，全局仍只有一条 active
    assert!(service.activate_pending(1).await.unwrap().is_none());
    let active_count = user_subscriptions::Entity::find()
        .filter(user_subscriptions::Column::UserId.eq(1))
        .filter(user_subscriptions::Column::Status.eq(STATUS_ACTIVE))
        .all(&db)
        .await
        .unwrap()
        .len();
    assert_eq!(active_count, 1);
}

#[tokio::test]
async fn activate_pending_without_candidates_is_none() {
    let db = setup_user_db().await;
    let service = UserService::new(db.clone(), memory_cache());
    seed_user(&db, 1, "T1").await;
    assert!(service.activate_pending(1).await.unwrap().is_none());
}

#[tokio::test]
async fn increment_ask_usage_bumps_active_subscription() {
    let db = setup_user_db().await;
    let service = UserService::new(db.clone(), memory_cache());

    seed_tier(&db, 1, 30, 100, None).await;
    seed_user(&db, 1, "T1").await;
    seed_subscription(
        &db,
        SubscriptionSeed {
            cursor_ask_usage: 3,
            ..Default::default()
        },
    )
    .await;

    service.increment_ask_usage("T1").await.unwrap();
    let sub = user_subscriptions::Entity::find_by_id(1)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.cursor_ask_usage, 4);
    assert_eq!(sub.status, STATUS_ACTIVE);
}

#[tokio::test]
async fn increment_ask_usage_rolls_over_at_the_ceiling() {
    let db = setup_user_db().await;
    let service = UserService::new(db.clone(), memory_cache());

    seed_tier(&db, 1, 30, 100, None).await;
    seed_user(&db, 1, "T1").await;
    seed_subscription(
        &db,
        SubscriptionSeed {
            id: 1,
            cursor_ask_usage: 99,
            ..Default::default()
        },
    )
    .await;
    seed_subscription(
        &db,
        SubscriptionSeed {
            id: 2,
            status: STATUS_PENDING,
            created_offset_secs: 1,
            ..Default::default()
        },
    )
    .await;

    let err = service.increment_ask_usage("T1").await.unwrap_err();
    assert!(err.is_entitlement_exhausted(), "got {err}");

    // 触顶订阅降级，待生效订阅顶上
    let first = user_subscriptions::Entity::find_by_id(1)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, STATUS_EXPIRED);
    assert_eq!(first.cursor_ask_usage, 100);
    let second = user_subscriptions::Entity::find_by_id(2)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.status, STATUS_ACTIVE);
}

#[tokio::test]
async fn increment_ask_usage_reports_expiry() {
    let db = setup_user_db().await;
    let service = UserService::new(db.clone(), memory_cache());

    seed_tier(&db, 1, 30, 100, None).await;
    seed_user(&db, 1, "T1").await;
    seed_subscription(
        &db,
        SubscriptionSeed {
            ends_in_days: -1,
            cursor_ask_usage: 3,
            ..Default::default()
        },
    )
    .await;

    let err = service.increment_ask_usage("T1").await.unwrap_err();
    assert!(matches!(err, GatewayError::SubscriptionExpired { .. }));
    let sub = user_subscriptions::Entity::find_by_id(1)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, STATUS_EXPIRED);
}

#[tokio::test]
async fn resolve_activates_pending_when_nothing_active() {
    let db = setup_user_db().await;
    let service = UserService::new(db.clone(), memory_cache());

    seed_tier(&db, 1, 30, 100, None).await;
    seed_user(&db, 1, "T1").await;
    seed_subscription(
        &db,
        SubscriptionSeed {
            status: STATUS_PENDING,
            ..Default::default()
        },
    )
    .await;

    // 解析路径内完成激活，仍返回用户
    let user = service.resolve("T1").await.unwrap().unwrap();
    assert_eq!(user.id, 1);
    let sub = user_subscriptions::Entity::find_by_id(1)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sub.status, STATUS_ACTIVE);
}

#[tokio::test]
async fn get_by_id_reads_straight_from_store() {
    let db = setup_user_db().await;
    let service = UserService::new(db.clone(), memory_cache());
    seed_user(&db, 9, "T9").await;

    assert_eq!(service.get_by_id(9).await.unwrap().unwrap().id, 9);
    assert!(service.get_by_id(10).await.unwrap().is_none());

    // 不经缓存：删除后立即不可见
    users::Entity::delete_by_id(9).exec(&db).await.unwrap();
    assert!(service.get_by_id(9).await.unwrap().is_none());
}
