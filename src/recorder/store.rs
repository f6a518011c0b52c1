//! # 记录库
//!
//! 事务记录的持久化与检索。表结构与索引由迁移幂等初始化，
//! 启动时执行，失败视为致命错误。

use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo};
use crate::recorder::TransactionRecord;
use chrono::Utc;
use entity::http_records;
use migration::MigratorTrait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::time::Duration;

/// 检索缺省条数上限
const DEFAULT_QUERY_LIMIT: u64 = 100;

/// 记录库
pub struct RecordStore {
    db: DatabaseConnection,
}

impl RecordStore {
    /// 连接记录库并应用连接池参数（≤20 连接 / ≥5 空闲 / 生命周期 30 分钟）
    pub async fn connect(database_url: &str) -> Result<Self> {
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::RecordStore,
            "connect_record_store",
            "正在连接记录库"
        );
        let mut options = ConnectOptions::new(database_url.to_string());
        options
            .max_connections(20)
            .min_connections(5)
            .max_lifetime(Duration::from_secs(30 * 60));
        let db = Database::connect(options).await?;
        Ok(Self { db })
    }

    /// 从已有连接构建（测试用）
    #[must_use]
    pub fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 幂等初始化表结构与全部索引
    pub async fn init_schema(&self) -> Result<()> {
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::RecordStore,
            "init_schema",
            "开始初始化记录库表结构"
        );
        migration::Migrator::up(&self.db, None).await?;
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::RecordStore,
            "init_schema_ok",
            "记录库表结构就绪"
        );
        Ok(())
    }

    /// 持久化一条事务记录，返回行 ID
    pub async fn save(&self, record: &TransactionRecord) -> Result<i32> {
        let now = Utc::now().naive_utc();
        let row = http_records::ActiveModel {
            request_headers: Set(serde_json::to_value(&record.request_headers)?),
            request_body: Set(record.request_body.clone()),
            response_headers: Set(serde_json::to_value(&record.response_headers)?),
            response_body: Set(record.response_body.clone()),
            url: Set(record.url.clone()),
            method: Set(record.method.clone()),
            host: Set(record.host.clone()),
            create_at: Set(record.create_at.clone()),
            http_version: Set(record.http_version.clone()),
            inner_token_id: Set(record.inner_token_id.clone()),
            status: Set(record.status),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let inserted = row.insert(&self.db).await?;
        ldebug!(
            "system",
            LogStage::Db,
            LogComponent::RecordStore,
            "record_saved",
            &format!(
                "事务记录落库: id={}, url={}, status={}",
                inserted.id, inserted.url, inserted.status
            )
        );
        Ok(inserted.id)
    }

    /// 按内部令牌回溯最近事务
    pub async fn find_by_inner_token(
        &self,
        inner_token_id: &str,
        limit: Option<u64>,
    ) -> Result<Vec<http_records::Model>> {
        http_records::Entity::find()
            .filter(http_records::Column::InnerTokenId.eq(inner_token_id))
            .order_by_desc(http_records::Column::CreatedAt)
            .limit(limit.unwrap_or(DEFAULT_QUERY_LIMIT))
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// 按主机与状态码检索
    pub async fn find_by_host_and_status(
        &self,
        host: &str,
        status: i32,
        limit: Option<u64>,
    ) -> Result<Vec<http_records::Model>> {
        http_records::Entity::find()
            .filter(http_records::Column::Host.eq(host))
            .filter(http_records::Column::Status.eq(status))
            .order_by_desc(http_records::Column::CreatedAt)
            .limit(limit.unwrap_or(DEFAULT_QUERY_LIMIT))
            .all(&self.db)
            .await
            .map_err(Into::into)
    }

    /// 按方法与状态码检索
    pub async fn find_by_method_and_status(
        &self,
        method: &str,
        status: i32,
        limit: Option<u64>,
    ) -> Result<Vec<http_records::Model>> {
        http_records::Entity::find()
            .filter(http_records::Column::Method.eq(method))
            .filter(http_records::Column::Status.eq(status))
            .order_by_desc(http_records::Column::CreatedAt)
            .limit(limit.unwrap_or(DEFAULT_QUERY_LIMIT))
            .all(&self.db)
            .await
            .map_err(Into::into)
    }
}
