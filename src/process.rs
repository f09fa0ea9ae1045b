//! Ownership of one spawned FFmpeg child.
//!
//! The child itself lives in a reaper task so its exit can be observed by
//! anyone holding the handle, while stderr is drained by a pump task that
//! splits FFmpeg's output into lines and forwards them for readiness checks.

use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, error, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time;

use crate::error::StopError;

const DIAGNOSTIC_BUFFER: usize = 64;
const SIGNAL_QUEUE: usize = 4;
const KILL_CONFIRM_WINDOW: Duration = Duration::from_secs(2);
const REDACTED: &str = "****";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Code(i32),
    Signal(i32),
    Unknown,
}

impl ExitOutcome {
    /// FFmpeg exits with 255 after handling SIGTERM/SIGINT, so that counts as
    /// a clean shutdown alongside plain signal deaths.
    pub fn is_clean_shutdown(&self) -> bool {
        matches!(
            self,
            ExitOutcome::Code(0)
                | ExitOutcome::Code(255)
                | ExitOutcome::Signal(libc::SIGTERM)
                | ExitOutcome::Signal(libc::SIGINT)
                | ExitOutcome::Signal(libc::SIGKILL)
        )
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        match (status.code(), status.signal()) {
            (Some(code), _) => ExitOutcome::Code(code),
            (None, Some(signal)) => ExitOutcome::Signal(signal),
            (None, None) => ExitOutcome::Unknown,
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Code(code) => write!(f, "exit code {}", code),
            ExitOutcome::Signal(signal) => write!(f, "signal {}", signal),
            ExitOutcome::Unknown => write!(f, "unknown exit status"),
        }
    }
}

/// A freshly launched process together with its diagnostic line feed.
pub struct Spawned {
    pub handle: ProcessHandle,
    pub diagnostics: mpsc::Receiver<String>,
}

type SignalRequest = (libc::c_int, oneshot::Sender<io::Result<()>>);

#[derive(Debug)]
pub struct ProcessHandle {
    pid: u32,
    exit: watch::Receiver<Option<ExitOutcome>>,
    signals: mpsc::Sender<SignalRequest>,
}

impl ProcessHandle {
    /// Spawns `command` with stderr piped. Every occurrence of a string in
    /// `redact` is masked before a diagnostic line is logged or forwarded.
    pub fn spawn(mut command: Command, redact: Vec<String>) -> io::Result<Spawned> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn()?;
        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("child exited before spawn returned"))?;
        let stderr = child.stderr.take();

        let (exit_tx, exit_rx) = watch::channel(None);
        let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_QUEUE);
        tokio::spawn(reap(child, pid, signal_rx, exit_tx));

        let (line_tx, line_rx) = mpsc::channel(DIAGNOSTIC_BUFFER);
        if let Some(stderr) = stderr {
            tokio::spawn(pump_diagnostics(stderr, pid, redact, line_tx));
        }

        Ok(Spawned {
            handle: ProcessHandle {
                pid,
                exit: exit_rx,
                signals: signal_tx,
            },
            diagnostics: line_rx,
        })
    }

    pub fn id(&self) -> u32 {
        self.pid
    }

    pub fn exit_outcome(&self) -> Option<ExitOutcome> {
        *self.exit.borrow()
    }

    pub fn notifier(&self) -> ExitNotifier {
        ExitNotifier {
            exit: self.exit.clone(),
        }
    }

    pub async fn exited(&self) -> ExitOutcome {
        self.notifier().wait().await
    }

    /// Sends SIGTERM.
    pub async fn terminate(&self) -> io::Result<()> {
        self.signal(libc::SIGTERM).await
    }

    /// Sends SIGKILL.
    pub async fn kill(&self) -> io::Result<()> {
        self.signal(libc::SIGKILL).await
    }

    /// Delivered by the reaper task, so a signal never races the child being
    /// reaped. Signalling a process that already exited is a no-op.
    async fn signal(&self, signal: libc::c_int) -> io::Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.signals.send((signal, reply_tx)).await.is_err() {
            return Ok(());
        }
        reply_rx.await.unwrap_or(Ok(()))
    }
}

/// Owns the child until it exits. Signal requests are served here, between
/// polls of `wait`, so the pid is still ours whenever kill(2) runs.
async fn reap(
    mut child: Child,
    pid: u32,
    mut signals: mpsc::Receiver<SignalRequest>,
    exit: watch::Sender<Option<ExitOutcome>>,
) {
    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some((signal, reply)) = signals.recv() => {
                let _ = reply.send(send_signal(pid, signal));
            }
        }
    };

    let outcome = match status {
        Ok(status) => ExitOutcome::from(status),
        Err(e) => {
            error!("failed to wait on process {}: {}", pid, e);
            ExitOutcome::Unknown
        }
    };
    debug!("process {} exited: {}", pid, outcome);
    exit.send_replace(Some(outcome));
}

fn send_signal(pid: u32, signal: libc::c_int) -> io::Result<()> {
    // SAFETY: kill(2) has no memory preconditions. The caller has not reaped
    // the child yet, so the pid cannot have been reused.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        Ok(())
    } else {
        Err(err)
    }
}

/// Wait-only view of a process exit. Cannot signal the process.
#[derive(Debug, Clone)]
pub struct ExitNotifier {
    exit: watch::Receiver<Option<ExitOutcome>>,
}

impl ExitNotifier {
    pub async fn wait(mut self) -> ExitOutcome {
        let outcome = match self.exit.wait_for(Option::is_some).await {
            Ok(outcome) => *outcome,
            Err(_) => None,
        };
        outcome.unwrap_or(ExitOutcome::Unknown)
    }
}

pub trait Launcher: Send + Sync {
    fn launch(&self, args: Vec<String>, redact: Vec<String>) -> io::Result<Spawned>;
}

pub struct FfmpegLauncher {
    program: PathBuf,
}

impl FfmpegLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        FfmpegLauncher {
            program: program.into(),
        }
    }
}

impl Launcher for FfmpegLauncher {
    fn launch(&self, args: Vec<String>, redact: Vec<String>) -> io::Result<Spawned> {
        let mut command = Command::new(&self.program);
        command.args(&args);
        ProcessHandle::spawn(command, redact)
    }
}

/// SIGTERM, then SIGKILL if the process is still around after `grace`.
pub async fn terminate_gracefully(
    handle: &ProcessHandle,
    grace: Duration,
) -> Result<ExitOutcome, StopError> {
    match handle.terminate().await {
        Ok(()) => match time::timeout(grace, handle.exited()).await {
            Ok(outcome) => return Ok(outcome),
            Err(_) => warn!(
                "process {} still running {:?} after SIGTERM, sending SIGKILL",
                handle.id(),
                grace
            ),
        },
        Err(e) => warn!(
            "SIGTERM to process {} failed: {}, sending SIGKILL",
            handle.id(),
            e
        ),
    }

    handle.kill().await.map_err(StopError::Signal)?;
    time::timeout(KILL_CONFIRM_WINDOW, handle.exited())
        .await
        .map_err(|_| StopError::Unconfirmed { pid: handle.id() })
}

async fn pump_diagnostics<R>(mut stderr: R, pid: u32, redact: Vec<String>, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::default();
    let mut buf = [0u8; 4096];
    let mut forwarding = true;

    loop {
        let read = match stderr.read(&mut buf).await {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) => {
                warn!("error reading stderr of process {}: {}", pid, e);
                break;
            }
        };

        for line in splitter.push(&buf[..read]) {
            forward_line(&tx, &mut forwarding, pid, redact_line(line, &redact)).await;
        }
    }

    if let Some(line) = splitter.finish() {
        forward_line(&tx, &mut forwarding, pid, redact_line(line, &redact)).await;
    }
}

async fn forward_line(tx: &mpsc::Sender<String>, forwarding: &mut bool, pid: u32, line: String) {
    debug!("ffmpeg[{}]: {}", pid, line);
    // Once the reader is gone keep draining so the child never blocks on a full pipe.
    if *forwarding && tx.send(line).await.is_err() {
        *forwarding = false;
    }
}

fn redact_line(mut line: String, redact: &[String]) -> String {
    for secret in redact.iter().filter(|s| !s.is_empty()) {
        if line.contains(secret.as_str()) {
            line = line.replace(secret.as_str(), REDACTED);
        }
    }
    line
}

/// Splits a byte stream on `\n` and `\r`; FFmpeg ends progress lines with a bare `\r`.
#[derive(Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if let Some(line) = self.finish() {
                    lines.push(line);
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}
