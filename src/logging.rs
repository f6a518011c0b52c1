//! # 统一日志工具模块
//!
//! 结构化业务日志：每条日志携带 stream_id / 阶段 / 组件 / 操作字段，
//! 便于按流和组件聚合检索。

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 日志阶段枚举
#[derive(Debug, Clone, Copy)]
pub enum LogStage {
    RequestHeaders,
    RequestBody,
    ResponseHeaders,
    ResponseBody,
    Authentication,
    Dispatch,
    PostFlight,
    BackgroundTask,
    Cache,
    ExternalApi,
    Db,
    Startup,
    Shutdown,
    Error,
}

impl LogStage {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RequestHeaders => "request_headers",
            Self::RequestBody => "request_body",
            Self::ResponseHeaders => "response_headers",
            Self::ResponseBody => "response_body",
            Self::Authentication => "authentication",
            Self::Dispatch => "dispatch",
            Self::PostFlight => "post_flight",
            Self::BackgroundTask => "background_task",
            Self::Cache => "cache",
            Self::ExternalApi => "external_api",
            Self::Db => "db",
            Self::Startup => "startup",
            Self::Shutdown => "shutdown",
            Self::Error => "error",
        }
    }
}

/// 组件枚举
#[derive(Debug, Clone, Copy)]
pub enum LogComponent {
    Main,
    Config,
    Database,
    Cache,
    ExtProc,
    Filter,
    Dispatch,
    UserService,
    RecordProducer,
    RecordConsumer,
    RecordStore,
    Maintainer,
}

impl LogComponent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Config => "config",
            Self::Database => "database",
            Self::Cache => "cache",
            Self::ExtProc => "ext_proc",
            Self::Filter => "filter",
            Self::Dispatch => "dispatch",
            Self::UserService => "user_service",
            Self::RecordProducer => "record_producer",
            Self::RecordConsumer => "record_consumer",
            Self::RecordStore => "record_store",
            Self::Maintainer => "maintainer",
        }
    }
}

/// 标准日志宏 - 信息级别
#[macro_export]
macro_rules! linfo {
    ($stream_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::info!(
            stream_id = %$stream_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($stream_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::info!(
            stream_id = %$stream_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 标准日志宏 - 调试级别
#[macro_export]
macro_rules! ldebug {
    ($stream_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::debug!(
            stream_id = %$stream_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($stream_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::debug!(
            stream_id = %$stream_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 标准日志宏 - 警告级别
#[macro_export]
macro_rules! lwarn {
    ($stream_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::warn!(
            stream_id = %$stream_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($stream_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::warn!(
            stream_id = %$stream_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 标准日志宏 - 错误级别
#[macro_export]
macro_rules! lerror {
    ($stream_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr, $($rest:tt)*) => {
        tracing::error!(
            stream_id = %$stream_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
            $($rest)*
        )
    };
    ($stream_id:expr, $stage:expr, $component:expr, $operation:expr, $description:expr) => {
        tracing::error!(
            stream_id = %$stream_id,
            stage = $stage.as_str(),
            operation = $operation,
            component = $component.as_str(),
            message = %$description,
        )
    };
}

/// 初始化日志系统
///
/// 过滤级别由 `RUST_LOG` 控制，默认 `info`。
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();
}
