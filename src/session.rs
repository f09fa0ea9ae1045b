use std::fmt;
use std::time::SystemTime;

use log::warn;

use crate::command::normalize_input;
use crate::error::StartError;
use crate::process::ExitOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStatus {
    #[default]
    Idle,
    Starting,
    Live,
    Stopping,
    Stopped,
    Error,
}

impl StreamStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamStatus::Stopped | StreamStatus::Error)
    }

    pub fn can_transition_to(self, next: StreamStatus) -> bool {
        use StreamStatus::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Starting, Live | Stopping | Error)
                | (Live, Stopping | Error)
                | (Stopping, Stopped | Error)
        )
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamStatus::Idle => "idle",
            StreamStatus::Starting => "starting",
            StreamStatus::Live => "live",
            StreamStatus::Stopping => "stopping",
            StreamStatus::Stopped => "stopped",
            StreamStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// RTMP target. `Debug` and `Display` never show the stream key.
#[derive(Clone, PartialEq, Eq)]
pub struct Destination {
    base: String,
    key: String,
}

impl Destination {
    pub fn new(rtmp_url: &str, stream_key: &str) -> Self {
        Destination {
            base: rtmp_url.trim().trim_end_matches('/').to_string(),
            key: stream_key.trim().to_string(),
        }
    }

    /// The full target url, key included. Only for handing to the process.
    pub fn url(&self) -> String {
        format!("{}/{}", self.base, self.key)
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/****", self.base)
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Destination")
            .field("base", &self.base)
            .field("key", &"****")
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    pub input_source: String,
    pub rtmp_url: String,
    pub stream_key: String,
    pub loop_input: bool,
}

/// A request that passed validation.
#[derive(Debug, Clone)]
pub struct StreamTarget {
    pub input_source: String,
    pub destination: Destination,
    pub loop_input: bool,
}

impl StartRequest {
    pub fn validate(&self) -> Result<StreamTarget, StartError> {
        let mut missing = Vec::new();
        if self.input_source.trim().is_empty() {
            missing.push("input_source");
        }
        if self.rtmp_url.trim().is_empty() {
            missing.push("rtmp_url");
        }
        if self.stream_key.trim().is_empty() {
            missing.push("stream_key");
        }
        if !missing.is_empty() {
            return Err(StartError::MissingParameters(missing));
        }

        let scheme = self.rtmp_url.trim().to_ascii_lowercase();
        if !(scheme.starts_with("rtmp://") || scheme.starts_with("rtmps://")) {
            return Err(StartError::InvalidDestination);
        }

        Ok(StreamTarget {
            input_source: normalize_input(self.input_source.trim()),
            destination: Destination::new(&self.rtmp_url, &self.stream_key),
            loop_input: self.loop_input,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StreamSession {
    pub id: u64,
    pub status: StreamStatus,
    pub input_source: String,
    pub destination: Destination,
    pub loop_input: bool,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
    pub error_message: Option<String>,
    pub exit: Option<ExitOutcome>,
}

impl StreamSession {
    /// A new session, already in `Starting`.
    pub fn new(id: u64, target: StreamTarget) -> Self {
        StreamSession {
            id,
            status: StreamStatus::Starting,
            input_source: target.input_source,
            destination: target.destination,
            loop_input: target.loop_input,
            started_at: SystemTime::now(),
            ended_at: None,
            error_message: None,
            exit: None,
        }
    }

    /// Moves to `next` if the state machine allows it. Terminal sessions
    /// never change again.
    pub fn advance(&mut self, next: StreamStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!(
                "session {}: refusing transition {} -> {}",
                self.id, self.status, next
            );
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.ended_at = Some(SystemTime::now());
        }
        true
    }

    pub fn fail(&mut self, message: String, exit: Option<ExitOutcome>) -> bool {
        if !self.advance(StreamStatus::Error) {
            return false;
        }
        self.error_message = Some(message);
        self.exit = exit;
        true
    }

    /// Records the outcome of a requested shutdown.
    pub fn finish(&mut self, exit: ExitOutcome) -> bool {
        if exit.is_clean_shutdown() {
            if self.advance(StreamStatus::Stopped) {
                self.exit = Some(exit);
                return true;
            }
            return false;
        }
        self.fail(format!("ffmpeg terminated abnormally ({})", exit), Some(exit))
    }
}

/// Status change notification for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub session_id: u64,
    pub status: StreamStatus,
    pub input_source: String,
    /// Redacted form, safe to persist.
    pub destination: String,
    pub loop_input: bool,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
    pub error_message: Option<String>,
    pub exit: Option<ExitOutcome>,
}

impl From<&StreamSession> for SessionEvent {
    fn from(session: &StreamSession) -> Self {
        SessionEvent {
            session_id: session.id,
            status: session.status,
            input_source: session.input_source.clone(),
            destination: session.destination.to_string(),
            loop_input: session.loop_input,
            started_at: session.started_at,
            ended_at: session.ended_at,
            error_message: session.error_message.clone(),
            exit: session.exit,
        }
    }
}
