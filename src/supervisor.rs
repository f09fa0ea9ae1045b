//! Single-owner supervision of the FFmpeg relay process.
//!
//! Every transition (start, stop, and the exit watcher of a live session)
//! runs while holding `Inner::slot`, so at most one call path touches the
//! process handle at a time. Status reads never take that lock: they come
//! from a watch channel republished after each transition.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::{broadcast, watch, Mutex, Notify};

use crate::command;
use crate::error::{StartError, StopError};
use crate::process::{self, ExitNotifier, ExitOutcome, Launcher, ProcessHandle, Spawned};
use crate::readiness::{self, PatternDetector, Readiness, ReadinessDetector};
use crate::session::{SessionEvent, StartRequest, StreamSession, StreamStatus};

pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct SupervisorConfig {
    pub readiness_timeout: Duration,
    pub grace_period: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub status: StreamStatus,
    pub has_active_process: bool,
    pub session_id: Option<u64>,
    pub error_message: Option<String>,
    pub exit: Option<ExitOutcome>,
}

type DetectorFactory = dyn Fn() -> Box<dyn ReadinessDetector> + Send + Sync;

#[derive(Default)]
struct Slot {
    session: Option<StreamSession>,
    handle: Option<ProcessHandle>,
}

impl Slot {
    fn report(&self) -> StatusReport {
        report_of(self.session.as_ref(), self.handle.is_some())
    }
}

fn report_of(session: Option<&StreamSession>, has_active_process: bool) -> StatusReport {
    match session {
        Some(session) => StatusReport {
            status: session.status,
            has_active_process,
            session_id: Some(session.id),
            error_message: session.error_message.clone(),
            exit: session.exit,
        },
        None => StatusReport {
            has_active_process,
            ..StatusReport::default()
        },
    }
}

struct Inner {
    launcher: Box<dyn Launcher>,
    config: SupervisorConfig,
    detector: Box<DetectorFactory>,
    slot: Mutex<Slot>,
    snapshot: watch::Sender<StatusReport>,
    events: broadcast::Sender<SessionEvent>,
    pending_start: StdMutex<Option<Arc<Notify>>>,
    next_id: AtomicU64,
}

#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<Inner>,
}

impl Supervisor {
    pub fn new(launcher: impl Launcher + 'static, config: SupervisorConfig) -> Self {
        let (snapshot, _) = watch::channel(StatusReport::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Supervisor {
            inner: Arc::new(Inner {
                launcher: Box::new(launcher),
                config,
                detector: Box::new(|| {
                    Box::new(PatternDetector::default()) as Box<dyn ReadinessDetector>
                }),
                slot: Mutex::new(Slot::default()),
                snapshot,
                events,
                pending_start: StdMutex::new(None),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Replaces the readiness strategy. Only meaningful before the supervisor is shared.
    pub fn with_detector<F, D>(mut self, factory: F) -> Self
    where
        F: Fn() -> D + Send + Sync + 'static,
        D: ReadinessDetector + 'static,
    {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.detector = Box::new(move || Box::new(factory()) as Box<dyn ReadinessDetector>);
        } else {
            warn!("detector not replaced: supervisor already shared");
        }
        self
    }

    pub fn status(&self) -> StatusReport {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Launches a relay and waits until FFmpeg confirms it is streaming.
    pub async fn start(&self, request: StartRequest) -> Result<StatusReport, StartError> {
        let target = request.validate()?;

        let current = self.status().status;
        if matches!(current, StreamStatus::Starting | StreamStatus::Stopping) {
            return Err(StartError::Busy(current));
        }

        let inner = &self.inner;
        let mut slot = inner.slot.lock().await;

        if slot.handle.is_some() {
            let previous = slot.session.as_ref().map(|s| s.id).unwrap_or_default();
            info!("session {}: superseded by a new start", previous);
            if let Err(e) = inner.shutdown(&mut slot).await {
                warn!("session {}: shutdown before restart failed: {}", previous, e);
            }
        }

        let id = inner.next_id.fetch_add(1, Ordering::SeqCst);
        let args = command::build_args(
            &target.input_source,
            &target.destination.url(),
            target.loop_input,
        );
        let redact = vec![target.destination.key().to_string()];
        info!(
            "session {}: starting relay {} -> {} (loop: {})",
            id, target.input_source, target.destination, target.loop_input
        );

        let cancel = Arc::new(Notify::new());
        inner.set_pending_start(Some(cancel.clone()));
        slot.session = Some(StreamSession::new(id, target));
        inner.publish(&slot);

        let Spawned {
            handle,
            mut diagnostics,
        } = match inner.launcher.launch(args, redact) {
            Ok(spawned) => spawned,
            Err(e) => {
                inner.set_pending_start(None);
                error!("session {}: failed to spawn ffmpeg: {}", id, e);
                if let Some(session) = slot.session.as_mut() {
                    session.fail(format!("failed to spawn ffmpeg: {}", e), None);
                }
                inner.publish(&slot);
                return Err(StartError::ProcessSpawnFailed(e));
            }
        };
        info!("session {}: ffmpeg running as pid {}", id, handle.id());

        let mut detector = (inner.detector)();
        let Slot {
            session,
            handle: held,
        } = &mut *slot;
        let handle = &*held.insert(handle);
        inner.publish_parts(session.as_ref(), true);

        let readiness = tokio::select! {
            readiness = readiness::await_readiness(
                detector.as_mut(),
                &mut diagnostics,
                handle,
                inner.config.readiness_timeout,
            ) => Some(readiness),
            _ = cancel.notified() => None,
        };
        inner.set_pending_start(None);
        // The pump keeps draining stderr into the log after this.
        drop(diagnostics);

        let result = match readiness {
            Some(Readiness::Ready) => {
                if let Some(session) = slot.session.as_mut() {
                    session.advance(StreamStatus::Live);
                }
                if let Some(notifier) = slot.handle.as_ref().map(ProcessHandle::notifier) {
                    tokio::spawn(watch_exit(self.inner.clone(), id, notifier));
                }
                info!("session {}: live", id);
                Ok(())
            }
            Some(Readiness::Exited(outcome)) => {
                slot.handle = None;
                if let Some(session) = slot.session.as_mut() {
                    session.fail(
                        format!("ffmpeg exited before streaming began ({})", outcome),
                        Some(outcome),
                    );
                }
                warn!("session {}: ffmpeg exited early ({})", id, outcome);
                Err(StartError::ProcessExitedEarly(outcome))
            }
            Some(Readiness::TimedOut) => {
                let timeout = inner.config.readiness_timeout;
                warn!("session {}: no readiness within {:?}, terminating", id, timeout);
                let exit = inner.release(&mut slot).await;
                if let Some(session) = slot.session.as_mut() {
                    session.fail(format!("ffmpeg not ready within {:?}", timeout), exit);
                }
                Err(StartError::ReadinessTimeout(timeout))
            }
            None => {
                info!("session {}: start cancelled by stop", id);
                if let Err(e) = inner.shutdown(&mut slot).await {
                    warn!("session {}: cancelling start: {}", id, e);
                }
                Err(StartError::Cancelled)
            }
        };

        inner.publish(&slot);
        result.map(|()| slot.report())
    }

    /// Stops the current relay, if any. Concurrent callers serialize; later
    /// ones observe the outcome of the first.
    pub async fn stop(&self) -> Result<StatusReport, StopError> {
        let pending = self
            .inner
            .pending_start
            .lock()
            .ok()
            .and_then(|mut pending| pending.take());
        if let Some(cancel) = pending {
            cancel.notify_one();
        }

        let mut slot = self.inner.slot.lock().await;
        if slot.handle.is_none() {
            return Ok(slot.report());
        }

        self.inner.shutdown(&mut slot).await?;
        Ok(slot.report())
    }
}

impl Inner {
    fn publish(&self, slot: &Slot) {
        self.publish_parts(slot.session.as_ref(), slot.handle.is_some());
    }

    /// Republishes the status snapshot; emits a session event when the
    /// session or its status changed.
    fn publish_parts(&self, session: Option<&StreamSession>, has_active_process: bool) {
        let report = report_of(session, has_active_process);
        let mut status_changed = false;
        self.snapshot.send_if_modified(|current| {
            if *current == report {
                return false;
            }
            status_changed =
                (current.session_id, current.status) != (report.session_id, report.status);
            *current = report.clone();
            true
        });

        if let (true, Some(session)) = (status_changed, session) {
            // No subscribers is fine.
            let _ = self.events.send(SessionEvent::from(session));
        }
    }

    fn set_pending_start(&self, cancel: Option<Arc<Notify>>) {
        match self.pending_start.lock() {
            Ok(mut pending) => *pending = cancel,
            Err(poisoned) => *poisoned.into_inner() = cancel,
        }
    }

    /// Moves the session to `Stopping`, runs the termination protocol and
    /// records the final status. The handle is released on every path.
    async fn shutdown(&self, slot: &mut Slot) -> Result<ExitOutcome, StopError> {
        let id = slot.session.as_ref().map(|s| s.id).unwrap_or_default();
        if let Some(session) = slot.session.as_mut() {
            session.advance(StreamStatus::Stopping);
        }
        self.publish(slot);
        info!("session {}: stopping", id);

        let result = match slot.handle.as_ref() {
            Some(handle) => process::terminate_gracefully(handle, self.config.grace_period).await,
            None => Ok(ExitOutcome::Unknown),
        };
        slot.handle = None;

        if let Some(session) = slot.session.as_mut() {
            match &result {
                Ok(outcome) => {
                    session.finish(*outcome);
                }
                Err(e) => {
                    session.fail(e.to_string(), None);
                }
            }
            info!("session {}: {}", id, session.status);
        }
        self.publish(slot);
        result
    }

    /// Terminates the process without touching session status. Returns the
    /// exit outcome when it could be confirmed.
    async fn release(&self, slot: &mut Slot) -> Option<ExitOutcome> {
        let handle = slot.handle.take()?;
        match process::terminate_gracefully(&handle, self.config.grace_period).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("failed to terminate process {}: {}", handle.id(), e);
                None
            }
        }
    }
}

/// Records an unexpected exit of a live session. A stop that already owns
/// the session wins, since it holds the slot until the handle is released.
async fn watch_exit(inner: Arc<Inner>, id: u64, notifier: ExitNotifier) {
    let outcome = notifier.wait().await;

    let mut slot = inner.slot.lock().await;
    let current = slot.session.as_ref().map(|s| (s.id, s.status));
    if current != Some((id, StreamStatus::Live)) {
        return;
    }

    slot.handle = None;
    if let Some(session) = slot.session.as_mut() {
        session.fail(format!("ffmpeg exited unexpectedly ({})", outcome), Some(outcome));
    }
    error!("session {}: ffmpeg exited unexpectedly ({})", id, outcome);
    inner.publish(&slot);
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::path::Path;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    use tokio::process::Command;
    use tokio::time::sleep;

    use super::*;
    use crate::process::FfmpegLauncher;

    const READY: &str = "echo 'Stream mapping:' >&2";

    /// Runs a shell script in place of ffmpeg; the generated arguments are
    /// available to the script as `$@`.
    struct ScriptLauncher {
        script: String,
        launches: Arc<AtomicUsize>,
    }

    impl ScriptLauncher {
        fn new(script: impl Into<String>) -> Self {
            ScriptLauncher {
                script: script.into(),
                launches: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Launcher for ScriptLauncher {
        fn launch(&self, args: Vec<String>, redact: Vec<String>) -> io::Result<Spawned> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            let mut command = Command::new("sh");
            command.arg("-c").arg(&self.script).arg("ffmpeg").args(args);
            ProcessHandle::spawn(command, redact)
        }
    }

    fn config() -> SupervisorConfig {
        SupervisorConfig {
            readiness_timeout: Duration::from_secs(5),
            grace_period: Duration::from_secs(2),
        }
    }

    fn request() -> StartRequest {
        StartRequest {
            input_source: "/media/clip.mp4".to_string(),
            rtmp_url: "rtmp://live.example.com/app".to_string(),
            stream_key: "sk-123".to_string(),
            loop_input: false,
        }
    }

    async fn wait_for_status(supervisor: &Supervisor, status: StreamStatus) -> StatusReport {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let report = supervisor.status();
            if report.status == status {
                return report;
            }
            assert!(Instant::now() < deadline, "never reached {status}, last: {report:?}");
            sleep(Duration::from_millis(10)).await;
        }
    }

    fn process_gone(pid: i32) -> bool {
        // SAFETY: signal 0 only checks for existence.
        let rc = unsafe { libc::kill(pid, 0) };
        rc == -1 && io::Error::last_os_error().raw_os_error() == Some(libc::ESRCH)
    }

    fn read_pid(path: &Path) -> i32 {
        std::fs::read_to_string(path).unwrap().trim().parse().unwrap()
    }

    #[tokio::test]
    async fn test_status_is_idle_initially() {
        let supervisor = Supervisor::new(ScriptLauncher::new("exit 0"), config());
        assert_eq!(supervisor.status(), StatusReport::default());
    }

    #[tokio::test]
    async fn test_status_is_starting_before_ready() {
        let supervisor = Supervisor::new(
            ScriptLauncher::new(format!("sleep 0.5; {READY}; exec sleep 30")),
            config(),
        );

        let starter = supervisor.clone();
        let start = tokio::spawn(async move { starter.start(request()).await });

        let report = wait_for_status(&supervisor, StreamStatus::Starting).await;
        assert_eq!(report.session_id, Some(1));

        let report = start.await.unwrap().unwrap();
        assert_eq!(report.status, StreamStatus::Live);
        assert!(report.has_active_process);

        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_ready_then_stop() {
        let supervisor = Supervisor::new(
            ScriptLauncher::new(format!("{READY}; exec sleep 30")),
            config(),
        );

        let report = supervisor.start(request()).await.unwrap();
        assert_eq!(report.status, StreamStatus::Live);
        assert_eq!(supervisor.status().status, StreamStatus::Live);

        let report = supervisor.stop().await.unwrap();
        assert_eq!(report.status, StreamStatus::Stopped);
        assert!(!report.has_active_process);
        assert_eq!(report.exit, Some(ExitOutcome::Signal(libc::SIGTERM)));
    }

    #[tokio::test]
    async fn test_script_receives_generated_args() {
        let dir = tempfile::tempdir().unwrap();
        let args_file = dir.path().join("args");
        let script = format!("echo \"$@\" > {}; {READY}; exec sleep 30", args_file.display());
        let supervisor = Supervisor::new(ScriptLauncher::new(script), config());

        supervisor.start(request()).await.unwrap();
        supervisor.stop().await.unwrap();

        let args = std::fs::read_to_string(&args_file).unwrap();
        assert!(args.starts_with("-re -i /media/clip.mp4 "));
        assert!(args.trim_end().ends_with("-f flv rtmp://live.example.com/app/sk-123"));
    }

    #[tokio::test]
    async fn test_early_exit_reports_code() {
        let supervisor = Supervisor::new(
            ScriptLauncher::new("echo 'rtmp://live.example.com/app/sk-123: I/O error' >&2; exit 1"),
            config(),
        );

        let err = supervisor.start(request()).await.unwrap_err();
        assert!(matches!(err, StartError::ProcessExitedEarly(ExitOutcome::Code(1))));

        let report = supervisor.status();
        assert_eq!(report.status, StreamStatus::Error);
        assert!(!report.has_active_process);
        assert_eq!(report.exit, Some(ExitOutcome::Code(1)));
    }

    #[tokio::test]
    async fn test_readiness_timeout_kills_straggler() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());
        let supervisor = Supervisor::new(
            ScriptLauncher::new(script),
            SupervisorConfig {
                readiness_timeout: Duration::from_millis(300),
                grace_period: Duration::from_secs(2),
            },
        );

        let err = supervisor.start(request()).await.unwrap_err();
        assert!(matches!(err, StartError::ReadinessTimeout(_)));

        let report = supervisor.status();
        assert_eq!(report.status, StreamStatus::Error);
        assert!(!report.has_active_process);
        assert!(process_gone(read_pid(&pid_file)));
    }

    #[tokio::test]
    async fn test_concurrent_stops_signal_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("signals");
        let script = format!(
            "trap 'echo term >> {}; exit 0' TERM; {READY}; while :; do sleep 0.1; done",
            log.display()
        );
        let supervisor = Supervisor::new(ScriptLauncher::new(script), config());
        supervisor.start(request()).await.unwrap();

        let (first, second) = tokio::join!(supervisor.stop(), supervisor.stop());
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.status, StreamStatus::Stopped);
        assert_eq!(first, second);
        assert!(!first.has_active_process);

        let signals = std::fs::read_to_string(&log).unwrap();
        assert_eq!(signals.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_stop_while_starting_terminates_process() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());
        let supervisor = Supervisor::new(ScriptLauncher::new(script), config());

        let starter = supervisor.clone();
        let start = tokio::spawn(async move { starter.start(request()).await });
        wait_for_status(&supervisor, StreamStatus::Starting).await;
        while !pid_file.exists() {
            sleep(Duration::from_millis(10)).await;
        }

        let stopped = supervisor.stop().await.unwrap();
        let started = start.await.unwrap();

        assert!(matches!(started, Err(StartError::Cancelled)));
        assert!(stopped.status.is_terminal());
        assert!(!stopped.has_active_process);
        assert!(process_gone(read_pid(&pid_file)));
    }

    #[tokio::test]
    async fn test_stop_escalates_when_sigterm_ignored() {
        let supervisor = Supervisor::new(
            ScriptLauncher::new(format!("trap '' TERM; {READY}; while :; do sleep 0.1; done")),
            SupervisorConfig {
                readiness_timeout: Duration::from_secs(5),
                grace_period: Duration::from_millis(300),
            },
        );
        supervisor.start(request()).await.unwrap();

        let began = Instant::now();
        let report = supervisor.stop().await.unwrap();

        assert!(began.elapsed() < Duration::from_millis(300) + Duration::from_secs(2));
        assert_eq!(report.status, StreamStatus::Stopped);
        assert_eq!(report.exit, Some(ExitOutcome::Signal(libc::SIGKILL)));
    }

    #[tokio::test]
    async fn test_crash_while_live_is_error() {
        let supervisor = Supervisor::new(
            ScriptLauncher::new(format!("{READY}; sleep 0.3; exit 7")),
            config(),
        );
        supervisor.start(request()).await.unwrap();

        let report = wait_for_status(&supervisor, StreamStatus::Error).await;
        assert!(!report.has_active_process);
        assert_eq!(report.exit, Some(ExitOutcome::Code(7)));
        assert!(report.error_message.unwrap().contains("unexpectedly"));

        // Nothing left to stop.
        let report = supervisor.stop().await.unwrap();
        assert_eq!(report.status, StreamStatus::Error);
    }

    #[tokio::test]
    async fn test_start_supersedes_live_session() {
        let supervisor = Supervisor::new(
            ScriptLauncher::new(format!("{READY}; exec sleep 30")),
            config(),
        );
        let mut events = supervisor.subscribe();

        let first = supervisor.start(request()).await.unwrap();
        let second = supervisor.start(request()).await.unwrap();
        assert_eq!(first.session_id, Some(1));
        assert_eq!(second.session_id, Some(2));
        assert_eq!(second.status, StreamStatus::Live);

        let mut first_session = Vec::new();
        while let Ok(event) = events.try_recv() {
            if event.session_id == 1 {
                first_session.push(event.status);
            }
        }
        assert_eq!(
            first_session,
            [
                StreamStatus::Starting,
                StreamStatus::Live,
                StreamStatus::Stopping,
                StreamStatus::Stopped,
            ]
        );

        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_while_starting_is_busy() {
        let launcher = ScriptLauncher::new(format!("sleep 0.5; {READY}; exec sleep 30"));
        let launches = launcher.launches.clone();
        let supervisor = Supervisor::new(launcher, config());

        let starter = supervisor.clone();
        let start = tokio::spawn(async move { starter.start(request()).await });
        wait_for_status(&supervisor, StreamStatus::Starting).await;

        let err = supervisor.start(request()).await.unwrap_err();
        assert!(matches!(err, StartError::Busy(StreamStatus::Starting)));

        start.await.unwrap().unwrap();
        assert_eq!(launches.load(Ordering::SeqCst), 1);
        supervisor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_while_stopping_is_busy() {
        let launcher =
            ScriptLauncher::new(format!("trap '' TERM; {READY}; while :; do sleep 0.1; done"));
        let launches = launcher.launches.clone();
        let supervisor = Supervisor::new(
            launcher,
            SupervisorConfig {
                readiness_timeout: Duration::from_secs(5),
                grace_period: Duration::from_secs(1),
            },
        );
        supervisor.start(request()).await.unwrap();

        let stopper = supervisor.clone();
        let stop = tokio::spawn(async move { stopper.stop().await });

        let report = wait_for_status(&supervisor, StreamStatus::Stopping).await;
        assert!(report.has_active_process);
        assert!(supervisor.status().has_active_process);

        let err = supervisor.start(request()).await.unwrap_err();
        assert!(matches!(err, StartError::Busy(StreamStatus::Stopping)));
        assert_eq!(launches.load(Ordering::SeqCst), 1);

        let report = stop.await.unwrap().unwrap();
        assert_eq!(report.status, StreamStatus::Stopped);
        assert_eq!(report.exit, Some(ExitOutcome::Signal(libc::SIGKILL)));
        assert!(!report.has_active_process);
    }

    #[tokio::test]
    async fn test_invalid_request_spawns_nothing() {
        let launcher = ScriptLauncher::new("exit 0");
        let launches = launcher.launches.clone();
        let supervisor = Supervisor::new(launcher, config());

        let mut missing_key = request();
        missing_key.stream_key.clear();
        assert!(matches!(
            supervisor.start(missing_key).await,
            Err(StartError::MissingParameters(_))
        ));

        let mut http = request();
        http.rtmp_url = "http://live.example.com/app".to_string();
        assert!(matches!(supervisor.start(http).await, Err(StartError::InvalidDestination)));

        assert_eq!(launches.load(Ordering::SeqCst), 0);
        assert_eq!(supervisor.status(), StatusReport::default());
    }

    #[tokio::test]
    async fn test_spawn_failure_leaves_no_handle() {
        let supervisor = Supervisor::new(FfmpegLauncher::new("/nonexistent/ffmpeg"), config());

        let err = supervisor.start(request()).await.unwrap_err();
        assert!(matches!(err, StartError::ProcessSpawnFailed(_)));

        let report = supervisor.status();
        assert_eq!(report.status, StreamStatus::Error);
        assert!(!report.has_active_process);
    }

    #[tokio::test]
    async fn test_custom_detector() {
        let supervisor = Supervisor::new(
            ScriptLauncher::new("echo 'publishing' >&2; exec sleep 30"),
            config(),
        )
        .with_detector(|| PatternDetector::new(["publishing"]));

        let report = supervisor.start(request()).await.unwrap();
        assert_eq!(report.status, StreamStatus::Live);
        supervisor.stop().await.unwrap();
    }
}
