//! Lifecycle of one recording task: start the transcode process, monitor
//! it to completion, report success or failure.  There is no reconnect
//! loop here: a failed recording simply ends with an error status.
//!
//! Recording is fully independent of playback: its own process handle,
//! its own registry entry, its own status field.

use chrono::{DateTime, Local, Timelike};
use nova_core::config::RecordingConfig;
use nova_core::error::PlayerError;
use nova_core::status::{RecordingState, StatusBoard};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::invocation::Invocation;
use crate::process::{ProcessHandle, ProcessRole};
use crate::registry::ProcessRegistry;

/// One running recording and its stop token.  The token belongs to this
/// job alone: a recording started right after a `stop()` gets a fresh
/// one, so the stopped job's monitor can never be confused about which
/// process the flag was raised for.
struct RecordingJob {
    handle: Arc<ProcessHandle>,
    stop_requested: Arc<AtomicBool>,
}

pub struct RecordingSupervisor {
    registry: Arc<ProcessRegistry>,
    status: StatusBoard,
    invocation: Arc<dyn Invocation>,
    config: RecordingConfig,
    current: Arc<Mutex<Option<RecordingJob>>>,
}

impl RecordingSupervisor {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        status: StatusBoard,
        invocation: Arc<dyn Invocation>,
        config: RecordingConfig,
    ) -> Self {
        Self {
            registry,
            status,
            invocation,
            config,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Start recording `url`.  A no-op when a recording is already
    /// running; fails with [`PlayerError::NoUrl`] when `url` is empty.
    pub async fn start(&self, url: &str) -> Result<(), PlayerError> {
        let mut current = self.current.lock().await;
        if current.is_some() {
            return Ok(());
        }
        if url.trim().is_empty() {
            return Err(PlayerError::NoUrl);
        }

        std::fs::create_dir_all(&self.config.directory).map_err(|source| {
            PlayerError::RecordingsDir {
                path: self.config.directory.clone(),
                source,
            }
        })?;
        let dest = recording_file(&self.config, Local::now());

        let spec = self.invocation.recording(url, &dest)?;
        let handle = match ProcessHandle::launch(ProcessRole::Recording, &spec) {
            Ok(handle) => Arc::new(handle),
            Err(e) => {
                self.status
                    .set_recording(RecordingState::Failed, format!("Opnamefout: {e}"));
                return Err(e);
            }
        };

        let stop_requested = Arc::new(AtomicBool::new(false));
        self.registry.register(Arc::clone(&handle));
        *current = Some(RecordingJob {
            handle: Arc::clone(&handle),
            stop_requested: Arc::clone(&stop_requested),
        });
        drop(current);

        let file_name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dest.display().to_string());
        info!(pid = handle.pid, file = %dest.display(), "recording started");
        self.status.set_recording(
            RecordingState::Recording,
            format!("Opname gestart: {file_name}"),
        );

        tokio::spawn(monitor(
            handle,
            Arc::clone(&self.registry),
            self.status.clone(),
            Arc::clone(&self.current),
            stop_requested,
        ));
        Ok(())
    }

    /// Stop the running recording; no-op when nothing is recording.
    pub async fn stop(&self) {
        let job = {
            let mut current = self.current.lock().await;
            let Some(job) = current.take() else {
                return;
            };
            // Mark before terminating so the monitor task stays quiet
            // about the forced exit.
            job.stop_requested.store(true, Ordering::SeqCst);
            job
        };

        job.handle.shutdown().await;
        self.registry.unregister(job.handle.pid);
        self.status
            .set_recording(RecordingState::Stopped, "Opname gestopt");
    }
}

/// Monitor task: blocks until the transcode process exits, then publishes
/// the terminal recording state.  All failures end here as a status
/// update plus a log line, never a crash.
async fn monitor(
    handle: Arc<ProcessHandle>,
    registry: Arc<ProcessRegistry>,
    status: StatusBoard,
    current: Arc<Mutex<Option<RecordingJob>>>,
    stop_requested: Arc<AtomicBool>,
) {
    let code = handle.wait_exit().await;
    registry.unregister(handle.pid);
    {
        let mut current = current.lock().await;
        if current
            .as_ref()
            .is_some_and(|job| Arc::ptr_eq(&job.handle, &handle))
        {
            *current = None;
        }
    }

    if stop_requested.load(Ordering::SeqCst) {
        // stop() owns the terminal status
        return;
    }

    if code == 0 {
        status.set_recording(RecordingState::Completed, "Opname succesvol voltooid.");
    } else {
        let stderr = handle.drain_stderr().await;
        if !stderr.trim().is_empty() {
            warn!(pid = handle.pid, "recorder error output: {}", stderr.trim());
        }
        status.set_recording(RecordingState::Failed, format!("Opnamefout (code {code})"));
    }
}

/// Destination path for a recording started at `now`: fixed label, day,
/// month name, and a coarse morning/evening bucket.  Collisions across
/// runs in the same bucket on the same day are accepted.
pub fn recording_file(config: &RecordingConfig, now: DateTime<Local>) -> PathBuf {
    let bucket = if now.hour() >= 12 { "avond" } else { "ochtend" };
    let filename = format!(
        "{} {} {} {}.mp3",
        config.label,
        now.format("%-d"),
        now.format("%B"),
        bucket
    );
    config.directory.join(filename)
}
