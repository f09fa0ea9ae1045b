//! Inferring "actually streaming" from FFmpeg's stderr.
//!
//! FFmpeg has no structured readiness signal, so liveness is read off its
//! log wording. The matching lives behind [`ReadinessDetector`] so a
//! different probe can replace it without touching the supervisor.

use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;
use tokio::time;

use crate::process::{ExitOutcome, ProcessHandle};

/// Printed once FFmpeg has mapped its input streams to the output.
pub const STREAM_MAPPED: &str = "Stream mapping";
/// Prefix of FFmpeg's periodic progress line.
pub const ENCODING_PROGRESS: &str = "frame=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Ready,
}

pub trait ReadinessDetector: Send {
    fn feed(&mut self, line: &str) -> Option<Verdict>;
}

/// Fires on the first line containing any of its patterns, then stays quiet.
pub struct PatternDetector {
    patterns: Vec<String>,
    fired: bool,
}

impl PatternDetector {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PatternDetector {
            patterns: patterns.into_iter().map(Into::into).collect(),
            fired: false,
        }
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        PatternDetector::new([STREAM_MAPPED, ENCODING_PROGRESS])
    }
}

impl ReadinessDetector for PatternDetector {
    fn feed(&mut self, line: &str) -> Option<Verdict> {
        if self.fired {
            return None;
        }
        if self.patterns.iter().any(|p| line.contains(p.as_str())) {
            self.fired = true;
            return Some(Verdict::Ready);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Exited(ExitOutcome),
    TimedOut,
}

/// Waits until `detector` accepts a line, the process exits, or `timeout`
/// elapses, whichever comes first.
pub async fn await_readiness(
    detector: &mut dyn ReadinessDetector,
    lines: &mut mpsc::Receiver<String>,
    handle: &ProcessHandle,
    timeout: Duration,
) -> Readiness {
    let wait = async {
        let mut lines_open = true;
        loop {
            tokio::select! {
                biased;
                line = lines.recv(), if lines_open => match line {
                    Some(line) => {
                        if detector.feed(&line) == Some(Verdict::Ready) {
                            debug!("process {} ready on {:?}", handle.id(), line);
                            return Readiness::Ready;
                        }
                    }
                    None => lines_open = false,
                },
                outcome = handle.exited() => return Readiness::Exited(outcome),
            }
        }
    };

    time::timeout(timeout, wait)
        .await
        .unwrap_or(Readiness::TimedOut)
}
