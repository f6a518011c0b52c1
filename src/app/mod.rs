//! # 应用装配模块
//!
//! 进程级资源与服务的一次性装配：资源（库连接、缓存、日志 broker）
//! 先行建立，服务在其上组装，全部以 `Arc` 句柄共享。

mod resources;
mod services;

pub use resources::AppResources;
pub use services::AppServices;
