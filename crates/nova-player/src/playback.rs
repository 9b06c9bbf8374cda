//! Reconnect state machine for stream playback.
//!
//! One `play()` call spawns one long-lived retry loop task that owns the
//! whole attempt sequence: launch, monitor until exit, classify, sleep,
//! retry.  The loop exits on success-then-stop, on cancellation, or when
//! the retry budget runs out.  The shared `reconnect_enabled` flag is the
//! sole cancellation token; it is checked both before launching and after
//! waking from the retry delay, because a stop can arrive mid-sleep.

use nova_core::error::PlayerError;
use nova_core::status::{PlaybackState, StatusBoard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::invocation::Invocation;
use crate::process::{ProcessHandle, ProcessRole};
use crate::registry::ProcessRegistry;

pub struct RetrySupervisor {
    registry: Arc<ProcessRegistry>,
    status: StatusBoard,
    invocation: Arc<dyn Invocation>,
    reconnect_enabled: Arc<AtomicBool>,
    current: Arc<Mutex<Option<Arc<ProcessHandle>>>>,
    task: StdMutex<Option<JoinHandle<()>>>,
    max_retries: u32,
    retry_delay: Duration,
}

impl RetrySupervisor {
    pub fn new(
        registry: Arc<ProcessRegistry>,
        status: StatusBoard,
        invocation: Arc<dyn Invocation>,
        reconnect_enabled: Arc<AtomicBool>,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Self {
        Self {
            registry,
            status,
            invocation,
            reconnect_enabled,
            current: Arc::new(Mutex::new(None)),
            task: StdMutex::new(None),
            max_retries,
            retry_delay,
        }
    }

    /// Start (or restart) playback of `url`.  Replaces any retry loop
    /// from a previous `play` call; the new loop tears down a leftover
    /// process before its first attempt.
    pub fn play(&self, url: &str) {
        if let Some(old) = self.task.lock().expect("task lock poisoned").take() {
            old.abort();
        }
        self.reconnect_enabled.store(true, Ordering::SeqCst);

        let retry_loop = RetryLoop {
            url: url.to_string(),
            registry: Arc::clone(&self.registry),
            status: self.status.clone(),
            invocation: Arc::clone(&self.invocation),
            reconnect_enabled: Arc::clone(&self.reconnect_enabled),
            current: Arc::clone(&self.current),
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
        };
        let task = tokio::spawn(retry_loop.run());
        *self.task.lock().expect("task lock poisoned") = Some(task);
    }

    /// Disable reconnection and terminate the live process.  Idempotent;
    /// a loop currently sleeping towards its next attempt will notice the
    /// cleared flag when it wakes and exit without launching.
    pub async fn stop(&self) {
        self.reconnect_enabled.store(false, Ordering::SeqCst);
        // The loop task winds itself down at its next flag check.
        drop(self.task.lock().expect("task lock poisoned").take());

        if let Some(handle) = self.current.lock().await.take() {
            handle.shutdown().await;
            self.registry.unregister(handle.pid);
        }
        self.status.set_playback(PlaybackState::Stopped, "Stopped");
    }
}

struct RetryLoop {
    url: String,
    registry: Arc<ProcessRegistry>,
    status: StatusBoard,
    invocation: Arc<dyn Invocation>,
    reconnect_enabled: Arc<AtomicBool>,
    current: Arc<Mutex<Option<Arc<ProcessHandle>>>>,
    max_retries: u32,
    retry_delay: Duration,
}

impl RetryLoop {
    fn cancelled(&self) -> bool {
        !self.reconnect_enabled.load(Ordering::SeqCst)
    }

    async fn run(self) {
        let max = self.max_retries;
        let mut attempt: u32 = 0;

        loop {
            if self.cancelled() {
                return;
            }

            // At most one live handle per role: clear out any leftover
            // before launching the next attempt.
            if let Some(prev) = self.current.lock().await.take() {
                prev.shutdown().await;
                self.registry.unregister(prev.pid);
            }

            let connecting_state = if attempt == 0 {
                PlaybackState::Connecting
            } else {
                PlaybackState::Reconnecting
            };
            let connecting_message = if attempt == 0 {
                "Connecting to stream...".to_string()
            } else {
                format!("Reconnecting... (attempt {}/{})", attempt + 1, max + 1)
            };
            self.status
                .set_playback(connecting_state, connecting_message);
            if self.cancelled() {
                // stop() ran between the loop-head check and the publish
                // above; restore its terminal status.
                self.status.set_playback(PlaybackState::Stopped, "Stopped");
                return;
            }

            let outcome = match self.launch().await {
                Ok(handle) => {
                    *self.current.lock().await = Some(Arc::clone(&handle));
                    self.registry.register(Arc::clone(&handle));
                    if self.cancelled() {
                        // stop() raced the launch; tear down ourselves
                        handle.shutdown().await;
                        self.registry.unregister(handle.pid);
                        self.status.set_playback(PlaybackState::Stopped, "Stopped");
                        return;
                    }
                    self.status.set_playback(PlaybackState::Playing, "Playing");

                    let code = handle.wait_exit().await;
                    self.registry.unregister(handle.pid);
                    {
                        let mut current = self.current.lock().await;
                        if current.as_ref().is_some_and(|h| h.pid == handle.pid) {
                            *current = None;
                        }
                    }

                    if code == 0 {
                        // A clean end on a live stream is usually a
                        // transient server-side disconnect; retried just
                        // like an error exit.
                        Some("Stream ended".to_string())
                    } else {
                        let stderr = handle.drain_stderr().await;
                        if !stderr.trim().is_empty() {
                            warn!(pid = handle.pid, "player error output: {}", stderr.trim());
                        }
                        Some(format!("Connection lost (code {code})"))
                    }
                }
                Err(e) => {
                    warn!(attempt, "failed to launch playback: {e}");
                    self.status
                        .set_playback(connecting_state, format!("Error playing stream: {e}"));
                    None
                }
            };

            if self.cancelled() {
                // A stop was requested while the process ran; stop()
                // publishes the terminal status.
                return;
            }

            let giving_up = attempt >= max;
            if let Some(message) = outcome {
                let state = if giving_up {
                    PlaybackState::GaveUp
                } else {
                    PlaybackState::Reconnecting
                };
                self.status.set_playback(state, message);
            }

            if giving_up {
                self.status.set_playback(
                    PlaybackState::GaveUp,
                    format!("Max retries ({max}) reached. Giving up."),
                );
                return;
            }

            attempt += 1;
            self.status.set_playback(
                PlaybackState::Reconnecting,
                format!(
                    "Retrying in {}s... (attempt {}/{})",
                    self.retry_delay.as_secs(),
                    attempt + 1,
                    max + 1
                ),
            );
            debug!(attempt, "retry scheduled");
            tokio::time::sleep(self.retry_delay).await;
            // the loop head re-checks the flag after waking
        }
    }

    async fn launch(&self) -> Result<Arc<ProcessHandle>, PlayerError> {
        let spec = self.invocation.playback(&self.url)?;
        Ok(Arc::new(ProcessHandle::launch(ProcessRole::Playback, &spec)?))
    }
}
