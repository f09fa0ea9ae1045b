use std::io;
use std::time::Duration;

use crate::process::ExitOutcome;
use crate::session::StreamStatus;

#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),

    #[error("destination must be an rtmp:// or rtmps:// url")]
    InvalidDestination,

    #[error("supervisor is busy ({0}), retry once it settles")]
    Busy(StreamStatus),

    #[error("failed to spawn ffmpeg: {0}")]
    ProcessSpawnFailed(#[source] io::Error),

    #[error("ffmpeg did not confirm streaming within {0:?}")]
    ReadinessTimeout(Duration),

    #[error("ffmpeg exited before streaming began ({0})")]
    ProcessExitedEarly(ExitOutcome),

    #[error("start was cancelled by a stop request")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum StopError {
    #[error("failed to signal ffmpeg: {0}")]
    Signal(#[source] io::Error),

    #[error("ffmpeg (pid {pid}) did not confirm exit after SIGKILL")]
    Unconfirmed { pid: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}
