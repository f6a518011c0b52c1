//! # Nursor 网关
//!
//! 进程入口：装配资源与服务，启动记录消费端与凭证池维护任务，
//! 在配置的地址上伺服 ext_proc gRPC，直到收到中断信号后优雅排空。

use nursor_gateway::app::{AppResources, AppServices};
use nursor_gateway::logging::{init_logging, LogComponent, LogStage};
use nursor_gateway::proto::external_processor_server::ExternalProcessorServer;
use nursor_gateway::{linfo, lwarn, AppConfig, GatewayError};
use tonic::transport::Server;

#[tokio::main]
async fn main() -> nursor_gateway::Result<()> {
    init_logging();

    let config = AppConfig::from_env();
    if !nursor_gateway::recorder::set_record_timezone(&config.timezone) {
        lwarn!(
            "system",
            LogStage::Startup,
            LogComponent::Main,
            "bad_timezone",
            &format!("时区 {} 非法，回落到 UTC", config.timezone)
        );
    }
    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "boot",
        &format!(
            "nursor-gateway 启动: listen={}, account_manager={}",
            config.grpc_listen_addr, config.account_manager_url
        )
    );

    let listen_addr = config
        .grpc_listen_addr
        .parse()
        .map_err(|e| GatewayError::config_with_source("gRPC 监听地址非法", e))?;

    let resources = AppResources::init(config).await?;
    let services = AppServices::build(&resources)?;

    services.consumer.start().await?;
    services.maintainer.start().await;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::Main,
        "serving",
        &format!("ext_proc gRPC 开始伺服: {listen_addr}")
    );

    Server::builder()
        .add_service(ExternalProcessorServer::new(services.ext_proc_service()))
        .serve_with_shutdown(listen_addr, async {
            let _ = tokio::signal::ctrl_c().await;
            linfo!(
                "system",
                LogStage::Shutdown,
                LogComponent::Main,
                "signal",
                "收到中断信号，开始退出"
            );
        })
        .await
        .map_err(|e| GatewayError::internal_with_source("gRPC 服务异常退出", e))?;

    // 先停周期任务，再排空消费端在途工作
    services.maintainer.stop().await;
    services.consumer.stop().await;

    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::Main,
        "bye",
        "nursor-gateway 已退出"
    );
    Ok(())
}
