//! # ext_proc gRPC 服务
//!
//! 每条双向流一个任务：顺序收取分阶段消息，交给引擎决策，
//! 一问一答原样回写。流结束（EOF、代理取消或短路）后在独立任务上
//! 运行收尾，不受代理侧取消影响。

use crate::filter::{FilterEngine, PhaseOutcome, PostFlight, StreamState};
use crate::logging::{LogComponent, LogStage};
use crate::proto::{
    external_processor_server::ExternalProcessor, processing_request, ProcessingRequest,
    ProcessingResponse,
};
use crate::{ldebug, linfo, lwarn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Request, Response, Status, Streaming};

/// 单条流的应答通道深度
const RESPONSE_CHANNEL_DEPTH: usize = 16;

/// ext_proc 服务实现
pub struct ExtProcService {
    engine: Arc<FilterEngine>,
    post_flight: Arc<PostFlight>,
}

impl ExtProcService {
    #[must_use]
    pub fn new(engine: Arc<FilterEngine>, post_flight: Arc<PostFlight>) -> Self {
        Self {
            engine,
            post_flight,
        }
    }
}

#[tonic::async_trait]
impl ExternalProcessor for ExtProcService {
    type ProcessStream = ReceiverStream<Result<ProcessingResponse, Status>>;

    async fn process(
        &self,
        request: Request<Streaming<ProcessingRequest>>,
    ) -> Result<Response<Self::ProcessStream>, Status> {
        let mut inbound = request.into_inner();
        let (tx, rx) = mpsc::channel(RESPONSE_CHANNEL_DEPTH);
        let engine = self.engine.clone();
        let post_flight = self.post_flight.clone();

        tokio::spawn(async move {
            let mut state = StreamState::new();
            let started = Instant::now();
            ldebug!(
                &state.stream_id,
                LogStage::RequestHeaders,
                LogComponent::ExtProc,
                "stream_opened",
                "代理流已打开"
            );

            loop {
                let message = match inbound.message().await {
                    Ok(Some(message)) => message,
                    Ok(None) => {
                        ldebug!(
                            &state.stream_id,
                            LogStage::Shutdown,
                            LogComponent::ExtProc,
                            "stream_eof",
                            "客户端关闭流"
                        );
                        break;
                    }
                    Err(status) if status.code() == Code::Cancelled => {
                        // 代理取消视为正常流结束，收尾照常执行
                        ldebug!(
                            &state.stream_id,
                            LogStage::Shutdown,
                            LogComponent::ExtProc,
                            "stream_cancelled",
                            "代理取消流"
                        );
                        break;
                    }
                    Err(status) => {
                        lwarn!(
                            &state.stream_id,
                            LogStage::Error,
                            LogComponent::ExtProc,
                            "recv_failed",
                            &format!("读取代理流失败: {status}")
                        );
                        break;
                    }
                };

                let outcome = match message.request {
                    Some(processing_request::Request::RequestHeaders(headers)) => {
                        engine.on_request_headers(&mut state, &headers).await
                    }
                    Some(processing_request::Request::RequestBody(body)) => {
                        engine.on_request_body(&mut state, &body)
                    }
                    Some(processing_request::Request::ResponseHeaders(headers)) => {
                        engine.on_response_headers(&mut state, &headers)
                    }
                    Some(processing_request::Request::ResponseBody(body)) => {
                        engine.on_response_body(&mut state, &body)
                    }
                    // 其余阶段（trailers 等）不做处理
                    _ => PhaseOutcome::Reply(ProcessingResponse::default()),
                };

                match outcome {
                    PhaseOutcome::Reply(reply) => {
                        if tx.send(Ok(reply)).await.is_err() {
                            break;
                        }
                    }
                    PhaseOutcome::ReplyAndClose(reply) => {
                        let _ = tx.send(Ok(reply)).await;
                        break;
                    }
                }
            }

            linfo!(
                &state.stream_id,
                LogStage::Shutdown,
                LogComponent::ExtProc,
                "stream_closed",
                &format!("流关闭，耗时 {:?}", started.elapsed())
            );

            // 收尾挂到全新的后台任务上，与已取消的流上下文解耦
            tokio::spawn(async move {
                post_flight.run(state).await;
            });
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
