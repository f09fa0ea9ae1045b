use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tonic::{Request, Response, Status};

use crate::error::{StartError, StopError};
use crate::process::ExitOutcome;
use crate::service::streamer_server::Streamer;
use crate::service::{
    exit_info, ExitInfo, SessionStatus, SessionUpdate, StartStreamRequest, StatusReply,
    StopStreamRequest, StreamStatusRequest, WatchSessionsRequest,
};
use crate::session::{SessionEvent, StartRequest, StreamStatus};
use crate::supervisor::{StatusReport, Supervisor};

type SessionUpdateStream = Pin<Box<dyn Stream<Item = Result<SessionUpdate, Status>> + Send>>;

pub struct ServerInner {
    supervisor: Supervisor,
}

impl ServerInner {
    pub fn new(supervisor: Supervisor) -> Self {
        ServerInner { supervisor }
    }
}

#[tonic::async_trait]
impl Streamer for ServerInner {
    async fn start_stream(
        &self,
        request: Request<StartStreamRequest>,
    ) -> Result<Response<StatusReply>, Status> {
        let request = request.into_inner();

        let report = self
            .supervisor
            .start(StartRequest {
                input_source: request.input_source,
                rtmp_url: request.rtmp_url,
                stream_key: request.stream_key,
                loop_input: request.loop_input,
            })
            .await
            .map_err(start_error_status)?;

        Ok(Response::new(StatusReply::from(report)))
    }

    async fn stop_stream(
        &self,
        _request: Request<StopStreamRequest>,
    ) -> Result<Response<StatusReply>, Status> {
        let report = self.supervisor.stop().await.map_err(stop_error_status)?;
        Ok(Response::new(StatusReply::from(report)))
    }

    async fn stream_status(
        &self,
        _request: Request<StreamStatusRequest>,
    ) -> Result<Response<StatusReply>, Status> {
        Ok(Response::new(StatusReply::from(self.supervisor.status())))
    }

    type WatchSessionsStream = SessionUpdateStream;

    async fn watch_sessions(
        &self,
        _request: Request<WatchSessionsRequest>,
    ) -> Result<Response<Self::WatchSessionsStream>, Status> {
        info!("session watcher subscribed");
        let updates: SessionUpdateStream = Box::pin(
            BroadcastStream::new(self.supervisor.subscribe()).filter_map(|event| match event {
                Ok(event) => Some(Ok(SessionUpdate::from(&event))),
                Err(e) => {
                    warn!("session watcher lagging: {}", e);
                    None
                }
            }),
        );

        Ok(Response::new(updates))
    }
}

fn start_error_status(err: StartError) -> Status {
    let message = err.to_string();
    match err {
        StartError::MissingParameters(_) | StartError::InvalidDestination => {
            Status::invalid_argument(message)
        }
        StartError::Busy(_) => Status::failed_precondition(message),
        StartError::ProcessSpawnFailed(_) => Status::internal(message),
        StartError::ReadinessTimeout(_) => Status::deadline_exceeded(message),
        StartError::ProcessExitedEarly(_) => Status::aborted(message),
        StartError::Cancelled => Status::cancelled(message),
    }
}

fn stop_error_status(err: StopError) -> Status {
    Status::internal(err.to_string())
}

impl From<StreamStatus> for SessionStatus {
    fn from(status: StreamStatus) -> Self {
        match status {
            StreamStatus::Idle => SessionStatus::Idle,
            StreamStatus::Starting => SessionStatus::Starting,
            StreamStatus::Live => SessionStatus::Live,
            StreamStatus::Stopping => SessionStatus::Stopping,
            StreamStatus::Stopped => SessionStatus::Stopped,
            StreamStatus::Error => SessionStatus::Error,
        }
    }
}

impl From<ExitOutcome> for ExitInfo {
    fn from(outcome: ExitOutcome) -> Self {
        let kind = match outcome {
            ExitOutcome::Code(code) => exit_info::Kind::Code(code),
            ExitOutcome::Signal(signal) => exit_info::Kind::Signal(signal),
            ExitOutcome::Unknown => exit_info::Kind::Unknown(true),
        };
        ExitInfo { kind: Some(kind) }
    }
}

impl From<StatusReport> for StatusReply {
    fn from(report: StatusReport) -> Self {
        StatusReply {
            status: SessionStatus::from(report.status) as i32,
            has_active_process: report.has_active_process,
            session_id: report.session_id.unwrap_or_default(),
            error_message: report.error_message.unwrap_or_default(),
            exit: report.exit.map(ExitInfo::from),
        }
    }
}

impl From<&SessionEvent> for SessionUpdate {
    fn from(event: &SessionEvent) -> Self {
        SessionUpdate {
            session_id: event.session_id,
            status: SessionStatus::from(event.status) as i32,
            started_at_ms: epoch_millis(event.started_at),
            ended_at_ms: event.ended_at.map(epoch_millis).unwrap_or_default(),
            error_message: event.error_message.clone().unwrap_or_default(),
            exit: event.exit.map(ExitInfo::from),
            input_source: event.input_source.clone(),
            destination: event.destination.clone(),
            loop_input: event.loop_input,
        }
    }
}

fn epoch_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
