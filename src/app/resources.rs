//! # 进程级资源
//!
//! 用户库、记录库、Redis 与持久化日志 broker 的连接在启动时建立一次，
//! 失败即启动失败（记录库表结构初始化失败同样致命）。

use crate::cache::{Cache, RedisCache};
use crate::config::AppConfig;
use crate::error::{GatewayError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::recorder::RecordStore;
use crate::linfo;
use async_nats::jetstream;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::sync::Arc;
use std::time::Duration;

/// 进程级资源集合
pub struct AppResources {
    pub config: AppConfig,
    pub user_db: DatabaseConnection,
    pub record_store: Arc<RecordStore>,
    pub cache: Cache,
    pub jetstream: jetstream::Context,
}

impl AppResources {
    /// 建立全部外部连接并初始化记录库表结构
    pub async fn init(config: AppConfig) -> Result<Self> {
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "init_resources",
            "正在建立外部依赖连接"
        );

        let user_db = connect_database(&config.user_database_url).await?;

        let record_store = Arc::new(RecordStore::connect(&config.record_database_url).await?);
        // 表结构与索引幂等初始化；失败视为致命
        record_store.init_schema().await?;

        let cache = Cache::new(Arc::new(RedisCache::new(&config.redis).await?));

        let nats = async_nats::connect(config.nats.addr.as_str())
            .await
            .map_err(|e| GatewayError::recorder_with_source("连接持久化日志 broker 失败", e))?;
        let jetstream = jetstream::new(nats);

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "resources_ready",
            "外部依赖连接就绪"
        );

        Ok(Self {
            config,
            user_db,
            record_store,
            cache,
            jetstream,
        })
    }
}

/// 建立数据库连接（连接池：≤20 连接 / ≥5 空闲 / 生命周期 30 分钟）
async fn connect_database(database_url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_string());
    options
        .max_connections(20)
        .min_connections(5)
        .max_lifetime(Duration::from_secs(30 * 60));
    Database::connect(options).await.map_err(Into::into)
}
