// ABOUTME: RunHandle - shared lifecycle state of one background subagent.
// ABOUTME: Lock-free status reads, a single terminal transition, and async waiting.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// Lifecycle status of a subagent task.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubagentStatus {
    /// Spawned, not yet started.
    Pending = 0,
    /// Running its control loop.
    Running = 1,
    /// Finished and produced an answer.
    Ok = 2,
    /// Failed, timed out, or panicked.
    Error = 3,
}

impl SubagentStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SubagentStatus::Pending,
            1 => SubagentStatus::Running,
            2 => SubagentStatus::Ok,
            _ => SubagentStatus::Error,
        }
    }

    /// True for `Ok` and `Error`.
    pub fn is_terminal(self) -> bool {
        matches!(self, SubagentStatus::Ok | SubagentStatus::Error)
    }
}

impl std::fmt::Display for SubagentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubagentStatus::Pending => write!(f, "pending"),
            SubagentStatus::Running => write!(f, "running"),
            SubagentStatus::Ok => write!(f, "ok"),
            SubagentStatus::Error => write!(f, "error"),
        }
    }
}

/// Handle for one subagent's execution state.
///
/// Clones share the same state. Only the owning unit moves it to a terminal
/// status; everyone else polls or waits.
#[derive(Clone)]
pub struct RunHandle {
    status: Arc<AtomicU8>,
    done: Arc<Notify>,
    start_time: Instant,
    end_time: Arc<OnceLock<Instant>>,
}

impl RunHandle {
    /// Create a new RunHandle in Pending state.
    pub fn new() -> Self {
        Self {
            status: Arc::new(AtomicU8::new(SubagentStatus::Pending as u8)),
            done: Arc::new(Notify::new()),
            start_time: Instant::now(),
            end_time: Arc::new(OnceLock::new()),
        }
    }

    /// Get the current status.
    pub fn status(&self) -> SubagentStatus {
        SubagentStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Returns true once the unit has reached a terminal status.
    pub fn is_complete(&self) -> bool {
        self.status().is_terminal()
    }

    /// Wait until the unit reaches a terminal status.
    pub async fn wait(&self) {
        let notified = self.done.notified();
        tokio::pin!(notified);
        // Register before checking so a transition in between is not missed.
        notified.as_mut().enable();
        if self.is_complete() {
            return;
        }
        notified.await;
    }

    /// Wait with a timeout. Returns false if the timeout expired first.
    pub async fn wait_with_timeout(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.wait()).await.is_ok()
    }

    /// How long the unit has been running, or ran for if complete.
    pub fn duration(&self) -> Duration {
        match self.end_time.get() {
            Some(end) => end.duration_since(self.start_time),
            None => self.start_time.elapsed(),
        }
    }

    /// Pending -> Running. No effect in any other state.
    pub(crate) fn set_running(&self) {
        let _ = self.status.compare_exchange(
            SubagentStatus::Pending as u8,
            SubagentStatus::Running as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Move to a terminal status. Returns false if already terminal.
    pub(crate) fn finish(&self, terminal: SubagentStatus) -> bool {
        debug_assert!(terminal.is_terminal());
        let mut current = self.status.load(Ordering::SeqCst);
        loop {
            if SubagentStatus::from_u8(current).is_terminal() {
                return false;
            }
            match self.status.compare_exchange(
                current,
                terminal as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        let _ = self.end_time.set(Instant::now());
        self.done.notify_waiters();
        true
    }
}

impl Default for RunHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(SubagentStatus::Pending.to_string(), "pending");
        assert_eq!(SubagentStatus::Running.to_string(), "running");
        assert_eq!(SubagentStatus::Ok.to_string(), "ok");
        assert_eq!(SubagentStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&SubagentStatus::Ok).unwrap();
        assert_eq!(json, "\"ok\"");
    }

    #[test]
    fn test_new_handle_is_pending() {
        let handle = RunHandle::new();
        assert_eq!(handle.status(), SubagentStatus::Pending);
        assert!(!handle.is_complete());
    }

    #[test]
    fn test_single_terminal_transition() {
        let handle = RunHandle::new();
        handle.set_running();
        assert_eq!(handle.status(), SubagentStatus::Running);

        assert!(handle.finish(SubagentStatus::Ok));
        assert!(!handle.finish(SubagentStatus::Error));
        assert_eq!(handle.status(), SubagentStatus::Ok);

        handle.set_running();
        assert_eq!(handle.status(), SubagentStatus::Ok);
    }

    #[test]
    fn test_duration_freezes_on_complete() {
        let handle = RunHandle::new();
        std::thread::sleep(Duration::from_millis(10));
        handle.finish(SubagentStatus::Ok);
        let d1 = handle.duration();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(d1, handle.duration());
    }

    #[tokio::test]
    async fn test_wait_after_completion_returns_immediately() {
        let handle = RunHandle::new();
        handle.finish(SubagentStatus::Error);
        handle.wait().await;
        assert!(handle.is_complete());
    }

    #[tokio::test]
    async fn test_wait_for_completion() {
        let handle = RunHandle::new();
        let worker = handle.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            worker.finish(SubagentStatus::Ok);
        });

        assert!(handle.wait_with_timeout(Duration::from_secs(5)).await);
        assert_eq!(handle.status(), SubagentStatus::Ok);
    }

    #[tokio::test]
    async fn test_wait_with_timeout_expired() {
        let handle = RunHandle::new();
        assert!(!handle.wait_with_timeout(Duration::from_millis(10)).await);
    }
}
