//! Shared helpers for supervisor tests: shell-script invocations standing
//! in for the real player binary, plus state polling with a deadline.

use nova_core::error::PlayerError;
use nova_core::status::{PlaybackState, RecordingState, StatusBoard};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::invocation::{CommandSpec, Invocation};

fn sh(script: &str) -> CommandSpec {
    CommandSpec {
        program: PathBuf::from("/bin/sh"),
        args: vec!["-c".to_string(), script.to_string()],
    }
}

/// Plays scripted shell commands instead of VLC.  The first launches pop
/// from `scripts`; once exhausted every further launch runs `fallback`.
pub struct ScriptInvocation {
    scripts: Mutex<VecDeque<String>>,
    fallback: String,
    launches: AtomicUsize,
}

impl ScriptInvocation {
    pub fn always(script: &str) -> Self {
        Self::sequence(&[], script)
    }

    pub fn sequence(scripts: &[&str], fallback: &str) -> Self {
        Self {
            scripts: Mutex::new(scripts.iter().map(|s| s.to_string()).collect()),
            fallback: fallback.to_string(),
            launches: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    fn next_script(&self) -> String {
        self.launches.fetch_add(1, Ordering::SeqCst);
        self.scripts
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl Invocation for ScriptInvocation {
    fn playback(&self, _url: &str) -> Result<CommandSpec, PlayerError> {
        Ok(sh(&self.next_script()))
    }

    fn recording(&self, _url: &str, _dest: &Path) -> Result<CommandSpec, PlayerError> {
        Ok(sh(&self.next_script()))
    }
}

/// Fails every launch the way a missing binary does.
pub struct NoBinaryInvocation {
    launches: AtomicUsize,
}

impl NoBinaryInvocation {
    pub fn new() -> Self {
        Self {
            launches: AtomicUsize::new(0),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl Invocation for NoBinaryInvocation {
    fn playback(&self, _url: &str) -> Result<CommandSpec, PlayerError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Err(PlayerError::BinaryNotFound)
    }

    fn recording(&self, _url: &str, _dest: &Path) -> Result<CommandSpec, PlayerError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        Err(PlayerError::BinaryNotFound)
    }
}

const POLL_DEADLINE: Duration = Duration::from_secs(10);

pub async fn wait_for_playback(status: &StatusBoard, want: PlaybackState) {
    tokio::time::timeout(POLL_DEADLINE, async {
        loop {
            if status.playback() == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "timed out waiting for playback state {:?}, last: {:?}",
            want,
            status.snapshot()
        )
    });
}

pub async fn wait_for_recording(status: &StatusBoard, want: RecordingState) {
    tokio::time::timeout(POLL_DEADLINE, async {
        loop {
            if status.recording() == want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "timed out waiting for recording state {:?}, last: {:?}",
            want,
            status.snapshot()
        )
    });
}
