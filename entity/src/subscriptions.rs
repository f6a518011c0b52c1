//! # 订阅套餐实体定义
//!
//! 套餐表（`vpn_subscription`）的投影：核心只读取时长与配额上限。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 订阅套餐实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "vpn_subscription")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// 套餐时长（天）
    pub duration: i32,
    /// 流量上限（GB），NULL 表示不限流量
    pub traffic_limit: Option<i64>,
    /// AI 调用次数上限
    pub cursor_ask_count: i32,
    pub status: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::user_subscriptions::Entity")]
    UserSubscriptions,
}

impl Related<super::user_subscriptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserSubscriptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
