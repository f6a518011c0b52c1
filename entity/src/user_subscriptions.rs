//! # 用户订阅实体定义
//!
//! 用户订阅表（`vpn_user_subscription`）：用户当前的权益窗口。
//! 状态机单向：pending → active → expired。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 订阅状态常量
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_EXPIRED: &str = "expired";

/// 支付状态：只有 paid 的订阅才参与权益评估
pub const PAYMENT_PAID: &str = "paid";

/// 用户订阅实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "vpn_user_subscription")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub subscription_id: i32,
    pub start_date: DateTime,
    pub end_date: DateTime,
    pub status: String,
    pub payment_status: String,
    /// 已使用流量（GB）
    pub used_traffic: i64,
    /// 已使用的 AI 调用次数
    pub cursor_ask_usage: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::subscriptions::Entity",
        from = "Column::SubscriptionId",
        to = "super::subscriptions::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    Subscription,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::subscriptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscription.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
