//! # 服务装配
//!
//! 在 [`super::AppResources`] 之上组装业务服务：凭证池客户端、
//! 用户服务、记录管道、流引擎与后台任务。

use crate::app::AppResources;
use crate::dispatch::DispatchClient;
use crate::error::Result;
use crate::filter::{ExtProcService, FilterEngine, PostFlight};
use crate::maintainer::PoolMaintainer;
use crate::recorder::{JetStreamSink, RecordConsumer, RecordSink};
use crate::users::UserService;
use std::sync::Arc;

/// 进程级服务集合
pub struct AppServices {
    pub dispatch: Arc<DispatchClient>,
    pub users: Arc<UserService>,
    pub sink: Arc<dyn RecordSink>,
    pub engine: Arc<FilterEngine>,
    pub post_flight: Arc<PostFlight>,
    pub consumer: Arc<RecordConsumer>,
    pub maintainer: Arc<PoolMaintainer>,
}

impl AppServices {
    /// 装配全部服务
    pub fn build(resources: &AppResources) -> Result<Arc<Self>> {
        let dispatch = Arc::new(DispatchClient::new(
            resources.config.account_manager_url.clone(),
        )?);
        let users = Arc::new(UserService::new(
            resources.user_db.clone(),
            resources.cache.clone(),
        ));
        let sink: Arc<dyn RecordSink> =
            Arc::new(JetStreamSink::new(resources.jetstream.clone()));

        let engine = Arc::new(FilterEngine::new(users.clone(), dispatch.clone()));
        let post_flight = Arc::new(PostFlight::new(
            dispatch.clone(),
            users.clone(),
            sink.clone(),
            resources.cache.clone(),
        ));

        let consumer = Arc::new(RecordConsumer::new(
            resources.jetstream.clone(),
            resources.record_store.clone(),
        ));
        let maintainer = Arc::new(PoolMaintainer::new(
            dispatch.clone(),
            resources.cache.clone(),
            resources.config.token_keep_size,
            resources.config.token_max_usage,
        ));

        Ok(Arc::new(Self {
            dispatch,
            users,
            sink,
            engine,
            post_flight,
            consumer,
            maintainer,
        }))
    }

    /// 构造 ext_proc gRPC 服务实例
    #[must_use]
    pub fn ext_proc_service(&self) -> ExtProcService {
        ExtProcService::new(self.engine.clone(), self.post_flight.clone())
    }
}
