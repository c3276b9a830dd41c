//! Interpreter process supervision.
//!
//! A [`ProcessSupervisor`] owns at most one live interpreter child at a
//! time. Each successful [`ProcessSupervisor::start`] returns a [`Run`]
//! whose event receiver is scoped to that child: it yields stdout/stderr
//! chunks, input requests and finally a single [`RunEvent::Exited`], then
//! closes.
//!
//! Per child there are three tasks:
//! - a stdout reader and a stderr reader (see [`reader`]);
//! - a monitor that owns the [`Child`], delivers termination requests,
//!   waits for both readers to reach EOF, then clears the handle and emits
//!   `Exited`, preceded by the stopped banner when `stop` took the handle.
//!
//! There is no execution timeout. A child that never exits runs until
//! [`ProcessSupervisor::stop`] is called.

pub mod codec;
pub mod events;
pub mod reader;

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::GlobalConfig;
use crate::supervisor::events::{RunEvent, STOPPED_BANNER};
use crate::supervisor::reader::{run_reader, StreamKind};
use crate::{AppError, Result};

// ── Configuration ────────────────────────────────────────────────────────────

/// How the interpreter command line is assembled.
///
/// The spawned command is `interpreter [entry_script] <target> [args...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Interpreter binary.
    pub interpreter: String,
    /// Optional front-end script inserted before the target file.
    pub entry_script: Option<PathBuf>,
    /// Overrides layered on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

impl LaunchConfig {
    /// Launch `interpreter <target>` with no front-end script or overrides.
    #[must_use]
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            entry_script: None,
            env: BTreeMap::new(),
        }
    }

    /// Derive the launch settings from the global configuration.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            interpreter: config.runner.interpreter.clone(),
            entry_script: config.entry_script_path(),
            env: config.runner.env.clone(),
        }
    }
}

// ── Run handle ───────────────────────────────────────────────────────────────

/// Subscription to one supervised child, returned by `start`.
#[derive(Debug)]
pub struct Run {
    /// Supervisor-local run identifier.
    pub id: u64,
    /// OS process id of the interpreter.
    pub pid: u32,
    /// Events for this run; closes after [`RunEvent::Exited`].
    pub events: mpsc::UnboundedReceiver<RunEvent>,
}

/// Reply channel the monitor uses to acknowledge a termination request.
type KillRequest = oneshot::Sender<Result<()>>;

/// Supervisor-side state of the live child. Owned exclusively by the
/// supervisor and dropped on stop or exit.
#[derive(Debug)]
struct ActiveRun {
    id: u64,
    pid: u32,
    stdin: Arc<Mutex<ChildStdin>>,
    // Cancelled once the handle is cleared; aborts in-flight input writes.
    cancel: CancellationToken,
    kill_tx: oneshot::Sender<KillRequest>,
}

type SharedState = Arc<Mutex<Option<ActiveRun>>>;

// ── Supervisor ───────────────────────────────────────────────────────────────

/// Owner of the single interpreter process of an editor session.
#[derive(Debug)]
pub struct ProcessSupervisor {
    launch: LaunchConfig,
    state: SharedState,
    next_id: AtomicU64,
}

impl ProcessSupervisor {
    /// Create an idle supervisor.
    #[must_use]
    pub fn new(launch: LaunchConfig) -> Self {
        Self {
            launch,
            state: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// Launch settings in use.
    #[must_use]
    pub fn launch_config(&self) -> &LaunchConfig {
        &self.launch
    }

    /// Whether a child is currently held.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    /// Spawn the interpreter on `target`.
    ///
    /// The child inherits the parent environment, then the configured
    /// overrides, then `env`. Its three standard streams are piped.
    ///
    /// # Errors
    ///
    /// - `AppError::MissingTarget` — `target` is empty.
    /// - `AppError::AlreadyRunning` — a child is already supervised.
    /// - `AppError::Spawn` — the OS refused to start the process.
    pub async fn start(
        &self,
        target: impl AsRef<Path>,
        args: &[String],
        env: &[(String, String)],
    ) -> Result<Run> {
        let target = target.as_ref();
        if target.as_os_str().is_empty() {
            return Err(AppError::MissingTarget);
        }

        // Held across spawn so concurrent starts are rejected, not queued.
        let mut guard = self.state.lock().await;
        if guard.is_some() {
            return Err(AppError::AlreadyRunning);
        }

        let mut cmd = Command::new(&self.launch.interpreter);
        if let Some(script) = &self.launch.entry_script {
            cmd.arg(script);
        }
        cmd.arg(target)
            .args(args)
            .envs(&self.launch.env)
            .envs(env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            warn!(interpreter = %self.launch.interpreter, %err, "failed to spawn interpreter");
            AppError::Spawn(format!(
                "failed to spawn {}: {err}",
                self.launch.interpreter
            ))
        })?;

        // Any early return below drops `child`, which kills it.
        let pid = child
            .id()
            .ok_or_else(|| AppError::Spawn("interpreter exited before it was tracked".into()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture interpreter stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture interpreter stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AppError::Spawn("failed to capture interpreter stderr".into()))?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = oneshot::channel();

        *guard = Some(ActiveRun {
            id,
            pid,
            stdin: Arc::new(Mutex::new(stdin)),
            cancel: CancellationToken::new(),
            kill_tx,
        });
        drop(guard);

        info!(
            run_id = id,
            pid,
            target = %target.display(),
            interpreter = %self.launch.interpreter,
            "interpreter started"
        );

        let span = info_span!("run", run_id = id, pid);
        tokio::spawn(
            monitor(
                Arc::clone(&self.state),
                id,
                child,
                stdout,
                stderr,
                event_tx,
                kill_rx,
            )
            .instrument(span),
        );

        Ok(Run {
            id,
            pid,
            events: event_rx,
        })
    }

    /// Write `text` followed by a newline to the child's stdin.
    ///
    /// # Errors
    ///
    /// - `AppError::NoActiveProcess` — nothing is running, the child has
    ///   exited, or the run was stopped while the write was pending.
    /// - `AppError::IoWrite` — the write itself failed.
    pub async fn send_input(&self, text: &str) -> Result<()> {
        let (run_id, stdin, cancel) = {
            let guard = self.state.lock().await;
            let active = guard.as_ref().ok_or(AppError::NoActiveProcess)?;
            (active.id, Arc::clone(&active.stdin), active.cancel.clone())
        };

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        tokio::select! {
            biased;

            () = cancel.cancelled() => Err(AppError::NoActiveProcess),

            result = write_line(&stdin, line.as_bytes()) => match result {
                Ok(()) => {
                    debug!(run_id, bytes = line.len(), "input forwarded to interpreter");
                    Ok(())
                }
                Err(err) if err.kind() == ErrorKind::BrokenPipe => {
                    debug!(run_id, "interpreter closed stdin before input arrived");
                    Err(AppError::NoActiveProcess)
                }
                Err(err) => {
                    warn!(run_id, %err, "write to interpreter stdin failed");
                    Err(AppError::IoWrite(err.to_string()))
                }
            },
        }
    }

    /// Request termination of the running child.
    ///
    /// The handle is cleared immediately. The run's monitor emits the
    /// stopped banner once, directly before [`RunEvent::Exited`], which
    /// confirms the process is gone. Returning `Ok` means the signal was
    /// sent or the child was already exiting.
    ///
    /// # Errors
    ///
    /// - `AppError::NoActiveProcess` — nothing is running.
    /// - `AppError::Io` — the termination signal could not be delivered.
    pub async fn stop(&self) -> Result<()> {
        let active = self
            .state
            .lock()
            .await
            .take()
            .ok_or(AppError::NoActiveProcess)?;

        active.cancel.cancel();

        let (reply_tx, reply_rx) = oneshot::channel();
        let signalled = match active.kill_tx.send(reply_tx) {
            Ok(()) => reply_rx.await.unwrap_or(Ok(())),
            // Monitor already past its wait; the child is exiting.
            Err(_) => Ok(()),
        };

        info!(run_id = active.id, pid = active.pid, "interpreter stop requested");

        signalled
    }
}

async fn write_line(stdin: &Mutex<ChildStdin>, bytes: &[u8]) -> std::io::Result<()> {
    let mut stdin = stdin.lock().await;
    stdin.write_all(bytes).await?;
    stdin.flush().await
}

// ── Monitor ──────────────────────────────────────────────────────────────────

/// Own the child until it exits, then report `Exited` exactly once.
async fn monitor(
    state: SharedState,
    run_id: u64,
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    events: mpsc::UnboundedSender<RunEvent>,
    mut kill_rx: oneshot::Receiver<KillRequest>,
) {
    let stdout_task = tokio::spawn(run_reader(
        run_id,
        StreamKind::Stdout,
        stdout,
        events.clone(),
    ));
    let stderr_task = tokio::spawn(run_reader(
        run_id,
        StreamKind::Stderr,
        stderr,
        events.clone(),
    ));

    let status = tokio::select! {
        biased;

        request = &mut kill_rx => {
            match request {
                Ok(reply) => {
                    #[cfg(windows)]
                    let result = terminate(&mut child).await;
                    #[cfg(not(windows))]
                    let result = terminate(&mut child);
                    let _ = reply.send(result);
                }
                Err(_) => {
                    // Supervisor dropped without stopping.
                    if let Err(err) = child.start_kill() {
                        warn!(%err, "failed to kill orphaned interpreter");
                    }
                }
            }
            child.wait().await
        }
        status = child.wait() => status,
    };
    // A stop that raced the exit is acknowledged without signalling; later
    // ones fail to send and resolve on their own.
    if let Ok(reply) = kill_rx.try_recv() {
        let _ = reply.send(Ok(()));
    }
    drop(kill_rx);

    let code = match status {
        Ok(status) => status.code(),
        Err(err) => {
            warn!(%err, "error waiting for interpreter process");
            None
        }
    };

    for task in [stdout_task, stderr_task] {
        if let Err(err) = task.await {
            warn!(%err, "interpreter reader task failed");
        }
    }

    // Our handle is gone only if `stop` took it, however late that was.
    let stopped = {
        let mut guard = state.lock().await;
        match guard.take_if(|active| active.id == run_id) {
            Some(active) => {
                active.cancel.cancel();
                false
            }
            None => true,
        }
    };

    if stopped {
        let _ = events.send(RunEvent::Output(STOPPED_BANNER.to_owned()));
    }
    info!(?code, stopped, "interpreter exited");
    let _ = events.send(RunEvent::Exited { code });
}

// ── Termination ──────────────────────────────────────────────────────────────

#[cfg(unix)]
fn terminate(child: &mut Child) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(raw) = child.id() else {
        return Ok(());
    };
    let pid = i32::try_from(raw).map_err(|_| AppError::Io(format!("pid {raw} out of range")))?;

    match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => {
            debug!(pid, "sent SIGTERM to interpreter");
            Ok(())
        }
        Err(err) => Err(AppError::Io(format!(
            "failed to signal interpreter {pid}: {err}"
        ))),
    }
}

#[cfg(windows)]
async fn terminate(child: &mut Child) -> Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };

    // Kill the whole tree: the interpreter may have spawned helpers.
    let status = Command::new("taskkill")
        .args(["/pid", &pid.to_string(), "/f", "/t"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => {
            warn!(pid, ?status, "taskkill failed, killing interpreter directly");
            child
                .start_kill()
                .map_err(|err| AppError::Io(format!("failed to kill interpreter {pid}: {err}")))
        }
        Err(err) => {
            warn!(pid, %err, "taskkill unavailable, killing interpreter directly");
            child
                .start_kill()
                .map_err(|err| AppError::Io(format!("failed to kill interpreter {pid}: {err}")))
        }
    }
}

#[cfg(not(any(unix, windows)))]
fn terminate(child: &mut Child) -> Result<()> {
    child
        .start_kill()
        .map_err(|err| AppError::Io(format!("failed to kill interpreter: {err}")))
}
