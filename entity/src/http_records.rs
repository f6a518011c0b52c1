//! # HTTP 事务记录实体定义
//!
//! 记录库（`http_records`）的 Sea-ORM 实体模型：每一条完整的
//! 代理事务快照，头部以 JSON 保存并带倒排索引支持。

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// HTTP 事务记录实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "http_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub request_headers: Json,
    #[sea_orm(column_type = "Blob")]
    pub request_body: Vec<u8>,
    pub response_headers: Json,
    #[sea_orm(column_type = "Blob")]
    pub response_body: Vec<u8>,
    #[sea_orm(column_type = "Text")]
    pub url: String,
    pub method: String,
    pub host: String,
    /// 流打开时刻的墙钟时间（格式化字符串，来自生产端）
    pub create_at: String,
    pub http_version: String,
    pub inner_token_id: String,
    pub status: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
