use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Playback lifecycle as driven by the retry supervisor.
///
/// Transitions:
///   Idle -> Connecting -> Playing -> Reconnecting -> Connecting ...
///   any  -> Stopped (explicit stop)
///   Reconnecting -> GaveUp (retry budget exhausted)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Connecting,
    Playing,
    Reconnecting,
    Stopped,
    GaveUp,
}

impl PlaybackState {
    /// True while the supervisor still has work in flight (a live process
    /// or a pending retry).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Connecting | PlaybackState::Playing | PlaybackState::Reconnecting
        )
    }
}

/// Recording lifecycle as driven by the recording supervisor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Stopped,
    Failed,
    Completed,
}

impl RecordingState {
    pub fn is_active(&self) -> bool {
        matches!(self, RecordingState::Recording)
    }
}

/// Snapshot of everything a frontend displays.  `rev` is a monotonically
/// increasing counter so pollers can cheaply detect changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub rev: u64,
    pub playback: PlaybackState,
    pub playback_message: String,
    pub recording: RecordingState,
    pub recording_message: String,
}

impl PlayerStatus {
    pub fn is_active(&self) -> bool {
        self.playback.is_active() || self.recording.is_active()
    }
}

impl Default for PlayerStatus {
    fn default() -> Self {
        Self {
            rev: 1,
            playback: PlaybackState::Idle,
            playback_message: "Ready".to_string(),
            recording: RecordingState::Idle,
            recording_message: "Niet aan het opnemen".to_string(),
        }
    }
}

/// One published status transition, broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    Playback {
        state: PlaybackState,
        message: String,
    },
    Recording {
        state: RecordingState,
        message: String,
    },
}

/// Thread-safe status board shared between the supervisors (writers) and
/// the frontend (reader).
///
/// Each role has exactly one writer (its owning supervisor's monitor or
/// scheduling task); readers take `snapshot()` or subscribe to the update
/// channel.  Writers never hold the lock across an await point.
#[derive(Clone)]
pub struct StatusBoard {
    inner: Arc<RwLock<PlayerStatus>>,
    updates: broadcast::Sender<StatusUpdate>,
}

impl StatusBoard {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(RwLock::new(PlayerStatus::default())),
            updates,
        }
    }

    pub fn snapshot(&self) -> PlayerStatus {
        self.inner.read().expect("status lock poisoned").clone()
    }

    pub fn playback(&self) -> PlaybackState {
        self.inner.read().expect("status lock poisoned").playback
    }

    pub fn recording(&self) -> RecordingState {
        self.inner.read().expect("status lock poisoned").recording
    }

    /// Subscribe to status transitions.  Receivers that lag simply miss
    /// intermediate updates; the snapshot always holds the latest state.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.updates.subscribe()
    }

    pub fn set_playback(&self, state: PlaybackState, message: impl Into<String>) {
        let message = message.into();
        {
            let mut status = self.inner.write().expect("status lock poisoned");
            status.playback = state;
            status.playback_message = message.clone();
            status.rev += 1;
        }
        // No receivers is fine
        let _ = self.updates.send(StatusUpdate::Playback { state, message });
    }

    pub fn set_recording(&self, state: RecordingState, message: impl Into<String>) {
        let message = message.into();
        {
            let mut status = self.inner.write().expect("status lock poisoned");
            status.recording = state;
            status.recording_message = message.clone();
            status.rev += 1;
        }
        let _ = self.updates.send(StatusUpdate::Recording { state, message });
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
