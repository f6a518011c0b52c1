//! # 用户实体定义
//!
//! 用户基础信息表（`user_user`）的 Sea-ORM 实体模型，
//! 仅保留调度核心需要读取的投影列。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 用户实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "user_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    /// 对内签发的不透明用户令牌，鉴权的唯一键
    #[sea_orm(unique)]
    pub inner_token: String,
    pub membership_type: String,
    pub is_dispatched: bool,
    #[sea_orm(column_name = "usage")]
    pub usage: i32,
    pub expired_at: Option<DateTime>,
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
