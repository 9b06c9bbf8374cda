//! Composition root: wires the registry, status board, and both
//! supervisors together and funnels every teardown trigger (signal,
//! end-of-run, top-level error) through one idempotent `shutdown()`.

use nova_core::config::Config;
use nova_core::error::PlayerError;
use nova_core::status::{PlaybackState, PlayerStatus, StatusBoard, StatusUpdate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::invocation::{Invocation, VlcInvocation};
use crate::playback::RetrySupervisor;
use crate::recording::RecordingSupervisor;
use crate::registry::ProcessRegistry;

/// One-shot gate around the teardown sequence.  Whichever trigger path
/// fires first wins; all later callers see `enter() == false`.
pub struct TeardownGate {
    done: AtomicBool,
}

impl TeardownGate {
    pub fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
        }
    }

    /// Returns true exactly once, for the caller that gets to run the
    /// teardown sequence.
    pub fn enter(&self) -> bool {
        !self.done.swap(true, Ordering::SeqCst)
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

impl Default for TeardownGate {
    fn default() -> Self {
        Self::new()
    }
}

pub struct PlayerController {
    registry: Arc<ProcessRegistry>,
    status: StatusBoard,
    playback: RetrySupervisor,
    recording: RecordingSupervisor,
    reconnect_enabled: Arc<AtomicBool>,
    gate: TeardownGate,
    current_url: Mutex<Option<String>>,
}

impl PlayerController {
    pub fn new(config: &Config) -> Self {
        let invocation: Arc<dyn Invocation> = Arc::new(VlcInvocation::new(
            config.player.clone(),
            &config.recording,
        ));
        Self::with_invocation(config, invocation)
    }

    /// Wire the controller with a caller-supplied invocation; tests use
    /// this to substitute shell scripts for the player binary.
    pub fn with_invocation(config: &Config, invocation: Arc<dyn Invocation>) -> Self {
        let registry = Arc::new(ProcessRegistry::new());
        let status = StatusBoard::new();
        let reconnect_enabled = Arc::new(AtomicBool::new(true));

        let playback = RetrySupervisor::new(
            Arc::clone(&registry),
            status.clone(),
            Arc::clone(&invocation),
            Arc::clone(&reconnect_enabled),
            config.retry.max_retries,
            config.retry.retry_delay(),
        );
        let recording = RecordingSupervisor::new(
            Arc::clone(&registry),
            status.clone(),
            invocation,
            config.recording.clone(),
        );

        Self {
            registry,
            status,
            playback,
            recording,
            reconnect_enabled,
            gate: TeardownGate::new(),
            current_url: Mutex::new(None),
        }
    }

    pub fn play(&self, url: &str) {
        if self.gate.is_done() {
            return;
        }
        *self
            .current_url
            .lock()
            .expect("url lock poisoned") = Some(url.to_string());
        self.playback.play(url);
    }

    pub async fn stop(&self) {
        self.playback.stop().await;
    }

    /// Keep recording in lockstep with playback: every transition into
    /// Playing starts a recording when none is active, so a recorder
    /// that died is restarted on the next successful (re)connect.
    pub fn enable_auto_record(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        let mut updates = self.subscribe();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(StatusUpdate::Playback {
                        state: PlaybackState::Playing,
                        ..
                    }) => {
                        if controller.gate.is_done() {
                            break;
                        }
                        if controller.status().recording.is_active() {
                            continue;
                        }
                        if let Err(e) = controller.start_recording().await {
                            warn!("auto-record failed: {e}");
                        }
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Start recording the current stream url (the last `play` target).
    pub async fn start_recording(&self) -> Result<(), PlayerError> {
        let url = self
            .current_url
            .lock()
            .expect("url lock poisoned")
            .clone()
            .ok_or(PlayerError::NoUrl)?;
        self.recording.start(&url).await
    }

    /// Start recording an explicit url, independent of playback.
    pub async fn start_recording_url(&self, url: &str) -> Result<(), PlayerError> {
        self.recording.start(url).await
    }

    pub async fn stop_recording(&self) {
        self.recording.stop().await;
    }

    pub fn status(&self) -> PlayerStatus {
        self.status.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.status.subscribe()
    }

    /// Idempotent full teardown: disable reconnection, stop both
    /// supervisors, drain the registry.  Every exit path converges here.
    pub async fn shutdown(&self) {
        if !self.gate.enter() {
            return;
        }
        info!("cleaning up processes");

        self.reconnect_enabled.store(false, Ordering::SeqCst);
        self.playback.stop().await;
        self.recording.stop().await;
        self.registry.terminate_all().await;
        debug_assert!(self.registry.is_empty());
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testutil::{wait_for_playback, wait_for_recording, ScriptInvocation};
    use nova_core::status::{PlaybackState, RecordingState};
    use tempfile::TempDir;

    fn controller_with(dir: &TempDir, invocation: Arc<ScriptInvocation>) -> PlayerController {
        let mut config = Config::default();
        config.retry.max_retries = 3;
        config.retry.retry_delay_secs = 0;
        config.recording.directory = dir.path().to_path_buf();
        PlayerController::with_invocation(&config, invocation)
    }

    #[test]
    fn teardown_gate_admits_exactly_one_caller() {
        let gate = TeardownGate::new();
        assert!(!gate.is_done());
        assert!(gate.enter());
        assert!(!gate.enter());
        assert!(gate.is_done());
    }

    #[tokio::test]
    async fn recording_without_a_known_url_fails() {
        let dir = TempDir::new().unwrap();
        let controller = controller_with(&dir, Arc::new(ScriptInvocation::always("exit 0")));

        let err = controller.start_recording().await.unwrap_err();
        assert!(matches!(err, PlayerError::NoUrl));
        assert_eq!(controller.status().recording, RecordingState::Idle);
    }

    #[tokio::test]
    async fn stopping_recording_leaves_playback_untouched() {
        let dir = TempDir::new().unwrap();
        let invocation = Arc::new(ScriptInvocation::always("sleep 30"));
        let controller = controller_with(&dir, Arc::clone(&invocation));

        controller.play("https://stream.example/radio");
        wait_for_playback(&controller.status, PlaybackState::Playing).await;
        controller.start_recording().await.unwrap();
        wait_for_recording(&controller.status, RecordingState::Recording).await;
        assert_eq!(controller.registry.len(), 2);

        controller.stop_recording().await;

        let status = controller.status();
        assert_eq!(status.recording, RecordingState::Stopped);
        assert_eq!(status.playback, PlaybackState::Playing);
        assert_eq!(controller.registry.len(), 1, "playback handle must survive");

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn auto_record_restarts_on_each_playing_transition() {
        let dir = TempDir::new().unwrap();
        // First playback attempt dies after 200ms, its recording ends on
        // its own right away; the reconnect and its recording then stick.
        let invocation = Arc::new(ScriptInvocation::sequence(
            &["sleep 0.2; exit 1", "exit 0"],
            "sleep 30",
        ));
        let controller = Arc::new(controller_with(&dir, Arc::clone(&invocation)));

        controller.enable_auto_record();
        controller.play("https://stream.example/radio");

        // attempt 1: recording starts without an explicit call and ends
        wait_for_recording(&controller.status, RecordingState::Completed).await;
        // attempt 2: the dead recorder is started again on reconnect
        wait_for_recording(&controller.status, RecordingState::Recording).await;
        wait_for_playback(&controller.status, PlaybackState::Playing).await;

        // two playback launches, one recording launch per Playing
        assert_eq!(invocation.launches(), 4);
        assert_eq!(controller.registry.len(), 2);

        controller.shutdown().await;
        assert!(controller.registry.is_empty());
    }

    #[tokio::test]
    async fn shutdown_runs_once_and_drains_everything() {
        let dir = TempDir::new().unwrap();
        let invocation = Arc::new(ScriptInvocation::always("sleep 30"));
        let controller = controller_with(&dir, Arc::clone(&invocation));

        controller.play("https://stream.example/radio");
        wait_for_playback(&controller.status, PlaybackState::Playing).await;
        controller
            .start_recording_url("https://stream.example/radio")
            .await
            .unwrap();
        wait_for_recording(&controller.status, RecordingState::Recording).await;

        controller.shutdown().await;
        assert!(controller.registry.is_empty());
        assert_eq!(controller.status().playback, PlaybackState::Stopped);
        assert_eq!(controller.status().recording, RecordingState::Stopped);
        let launches = invocation.launches();

        // second shutdown is a gated no-op; play after shutdown is inert
        controller.shutdown().await;
        controller.play("https://stream.example/radio");
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(invocation.launches(), launches);
        assert!(controller.registry.is_empty());
    }
}
