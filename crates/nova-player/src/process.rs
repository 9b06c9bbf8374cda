//! One OS-level child process behind a supervision-friendly handle.
//!
//! Every managed process (playback or recording) goes through the same
//! shutdown protocol: graceful terminate, bounded wait, forced kill,
//! shorter bounded wait, then abandon. The wait is never unbounded.

use nova_core::error::PlayerError;
use std::fmt;
use std::process::Stdio;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::invocation::CommandSpec;

/// How long to wait after a graceful terminate before escalating.
pub const TERM_GRACE: Duration = Duration::from_secs(3);
/// How long to wait after a forced kill before abandoning the wait.
pub const KILL_GRACE: Duration = Duration::from_secs(1);

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    Playback,
    Recording,
}

impl fmt::Display for ProcessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessRole::Playback => write!(f, "playback"),
            ProcessRole::Recording => write!(f, "recording"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Exited(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Exited(i32),
    TimedOut,
}

/// Handle to one spawned player process.
///
/// The child sits behind a tokio mutex because the monitor task holds it
/// across `wait()`; every other operation (poll, terminate, kill) works
/// from the pid or from `try_lock` so a blocked monitor never deadlocks a
/// stop request.
pub struct ProcessHandle {
    pub pid: u32,
    pub role: ProcessRole,
    pub argv: Vec<String>,
    child: Mutex<Option<Child>>,
    stderr: Mutex<Option<ChildStderr>>,
    exit_code: StdMutex<Option<i32>>,
}

impl ProcessHandle {
    /// Spawn the process described by `spec` with captured output streams.
    pub fn launch(role: ProcessRole, spec: &CommandSpec) -> Result<Self, PlayerError> {
        let mut child = tokio::process::Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| PlayerError::Launch {
                program: spec.program.clone(),
                source,
            })?;

        let pid = child.id().ok_or_else(|| PlayerError::Launch {
            program: spec.program.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "spawned child has no pid"),
        })?;
        let stderr = child.stderr.take();

        let mut argv = vec![spec.program.display().to_string()];
        argv.extend(spec.args.iter().cloned());
        debug!(%role, pid, cmd = %argv.join(" "), "process launched");

        Ok(Self {
            pid,
            role,
            argv,
            child: Mutex::new(Some(child)),
            stderr: Mutex::new(stderr),
            exit_code: StdMutex::new(None),
        })
    }

    fn recorded_exit(&self) -> Option<i32> {
        *self.exit_code.lock().expect("exit_code lock poisoned")
    }

    fn record_exit(&self, code: i32) {
        *self.exit_code.lock().expect("exit_code lock poisoned") = Some(code);
    }

    /// Non-blocking liveness check.
    ///
    /// When the monitor task currently holds the child (it is inside
    /// `wait_exit`), the process is by definition still running or about
    /// to have its exit recorded, so `Running` is the right answer.
    pub fn poll(&self) -> ProcessStatus {
        if let Some(code) = self.recorded_exit() {
            return ProcessStatus::Exited(code);
        }
        match self.child.try_lock() {
            Ok(mut guard) => match guard.as_mut() {
                Some(child) => match child.try_wait() {
                    Ok(Some(status)) => {
                        let code = exit_code_of(status);
                        self.record_exit(code);
                        *guard = None;
                        ProcessStatus::Exited(code)
                    }
                    Ok(None) => ProcessStatus::Running,
                    Err(e) => {
                        warn!(pid = self.pid, "try_wait failed: {e}");
                        self.record_exit(-1);
                        *guard = None;
                        ProcessStatus::Exited(-1)
                    }
                },
                None => ProcessStatus::Exited(self.recorded_exit().unwrap_or(-1)),
            },
            Err(_) => ProcessStatus::Running,
        }
    }

    /// Block until the process exits and return its exit code.  Intended
    /// for the one monitor task that owns this handle; signal-death maps
    /// to the conventional 128+signal code.
    pub async fn wait_exit(&self) -> i32 {
        let mut guard = self.child.lock().await;
        match guard.take() {
            Some(mut child) => match child.wait().await {
                Ok(status) => {
                    let code = exit_code_of(status);
                    self.record_exit(code);
                    code
                }
                Err(e) => {
                    warn!(pid = self.pid, "wait failed: {e}");
                    self.record_exit(-1);
                    -1
                }
            },
            None => self.recorded_exit().unwrap_or(-1),
        }
    }

    /// Wait up to `timeout` for the process to exit, polling so a blocked
    /// monitor task keeps exclusive ownership of the child.
    pub async fn wait(&self, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            if let ProcessStatus::Exited(code) = self.poll() {
                return WaitOutcome::Exited(code);
            }
            if Instant::now() >= deadline {
                return WaitOutcome::TimedOut;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Send the graceful stop signal.  SIGTERM on unix; windows has no
    /// graceful equivalent for console processes, so it forces there.
    pub async fn terminate(&self) {
        #[cfg(unix)]
        {
            // Signal by pid so this works while the monitor holds the child.
            let result = tokio::process::Command::new("kill")
                .args(["-TERM", &self.pid.to_string()])
                .status()
                .await;
            match result {
                Ok(status) if status.success() => return,
                Ok(_) | Err(_) => self.start_kill_best_effort(),
            }
        }
        #[cfg(not(unix))]
        self.force_kill_by_pid().await;
    }

    /// Send the forced stop signal.
    pub async fn kill(&self) {
        #[cfg(unix)]
        {
            let _ = tokio::process::Command::new("kill")
                .args(["-KILL", &self.pid.to_string()])
                .status()
                .await;
            self.start_kill_best_effort();
        }
        #[cfg(not(unix))]
        self.force_kill_by_pid().await;
    }

    /// Kill by pid so a stop request lands even while the monitor task
    /// owns the child handle in `wait_exit`.
    #[cfg(not(unix))]
    async fn force_kill_by_pid(&self) {
        let _ = tokio::process::Command::new("taskkill")
            .args(["/PID", &self.pid.to_string(), "/T", "/F"])
            .status()
            .await;
        self.start_kill_best_effort();
    }

    fn start_kill_best_effort(&self) {
        if let Ok(mut guard) = self.child.try_lock() {
            if let Some(child) = guard.as_mut() {
                let _ = child.start_kill();
            }
        }
    }

    /// The uniform shutdown protocol: terminate, wait [`TERM_GRACE`],
    /// kill, wait [`KILL_GRACE`], then abandon with a warning.  Never
    /// blocks indefinitely and never surfaces an error to the caller.
    pub async fn shutdown(&self) {
        if let ProcessStatus::Exited(_) = self.poll() {
            return;
        }
        debug!(role = %self.role, pid = self.pid, "terminating process");
        self.terminate().await;
        if let WaitOutcome::Exited(_) = self.wait(TERM_GRACE).await {
            return;
        }

        warn!(role = %self.role, pid = self.pid, "no exit after terminate, killing");
        self.kill().await;
        if let WaitOutcome::TimedOut = self.wait(KILL_GRACE).await {
            warn!(
                role = %self.role,
                pid = self.pid,
                "abandoning wait, leaving reclamation to the OS"
            );
        }
    }

    /// Read whatever the process wrote to stderr.  Only useful once the
    /// process has exited; bounded so a noisy stream cannot stall a
    /// monitor task.
    pub async fn drain_stderr(&self) -> String {
        let mut guard = self.stderr.lock().await;
        let Some(mut stderr) = guard.take() else {
            return String::new();
        };
        let mut buf = String::new();
        let _ = tokio::time::timeout(Duration::from_secs(2), stderr.read_to_string(&mut buf)).await;
        buf
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("role", &self.role)
            .field("argv", &self.argv)
            .finish()
    }
}

fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec {
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), script.to_string()],
        }
    }

    #[tokio::test]
    async fn wait_exit_reports_exit_code() {
        let handle = ProcessHandle::launch(ProcessRole::Playback, &sh("exit 7")).unwrap();
        assert_eq!(handle.wait_exit().await, 7);
        assert_eq!(handle.poll(), ProcessStatus::Exited(7));
    }

    #[tokio::test]
    async fn wait_times_out_on_long_running_process() {
        let handle = ProcessHandle::launch(ProcessRole::Playback, &sh("sleep 10")).unwrap();
        assert_eq!(
            handle.wait(Duration::from_millis(300)).await,
            WaitOutcome::TimedOut
        );
        handle.shutdown().await;
        assert!(matches!(handle.poll(), ProcessStatus::Exited(_)));
    }

    #[tokio::test]
    async fn shutdown_terminates_within_grace_period() {
        let handle = ProcessHandle::launch(ProcessRole::Recording, &sh("sleep 30")).unwrap();
        let started = std::time::Instant::now();
        handle.shutdown().await;
        // sleep dies on SIGTERM, well inside the first grace window
        assert!(started.elapsed() < TERM_GRACE + KILL_GRACE);
        assert!(matches!(handle.poll(), ProcessStatus::Exited(_)));
    }

    #[tokio::test]
    async fn shutdown_is_quiet_when_already_exited() {
        let handle = ProcessHandle::launch(ProcessRole::Playback, &sh("exit 0")).unwrap();
        assert_eq!(handle.wait_exit().await, 0);
        handle.shutdown().await;
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn stderr_is_captured_for_diagnostics() {
        let handle =
            ProcessHandle::launch(ProcessRole::Playback, &sh("echo boom >&2; exit 1")).unwrap();
        assert_eq!(handle.wait_exit().await, 1);
        let output = handle.drain_stderr().await;
        assert!(output.contains("boom"));
    }

    #[tokio::test]
    async fn launch_error_for_missing_binary() {
        let spec = CommandSpec {
            program: PathBuf::from("/definitely/not/a/binary"),
            args: vec![],
        };
        let err = ProcessHandle::launch(ProcessRole::Playback, &spec).unwrap_err();
        assert!(matches!(err, PlayerError::Launch { .. }));
    }
}
