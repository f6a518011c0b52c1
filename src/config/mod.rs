//! # 配置管理模块

mod app_config;

pub use app_config::{AppConfig, NatsConfig, RedisConfig};
