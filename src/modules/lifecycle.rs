//! Run/pause/resume/stop state machine shared by every command kind
//!
//! State and timers live behind a single mutex per command; the transition
//! methods are the only mutators. The mutex is never held across an await.

use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::modules::error::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Idle,
    Running,
    Paused,
    /// Stop was signalled while running; the body has not returned yet
    Stopped,
    Completed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Running => "running",
            LifecycleState::Paused => "paused",
            LifecycleState::Stopped => "stopped",
            LifecycleState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Outcome of a checkpoint between list invocations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    Continue,
    Cancelled,
}

#[derive(Debug)]
struct LifecycleInner {
    state: LifecycleState,
    started_at: Option<Instant>,
    accumulated: Duration,
    stop_requested: bool,
}

impl LifecycleInner {
    fn bank_elapsed(&mut self) {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += started_at.elapsed();
        }
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    inner: Mutex<LifecycleInner>,
    resumed: Notify,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LifecycleInner {
                state: LifecycleState::Idle,
                started_at: None,
                accumulated: Duration::ZERO,
                stop_requested: false,
            }),
            resumed: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// Enter `Running`; only valid from `Idle`
    pub fn begin(&self) -> Result<(), LifecycleError> {
        let mut inner = self.lock();
        if inner.state != LifecycleState::Idle {
            return Err(LifecycleError::InvalidTransition {
                operation: "run",
                state: inner.state,
            });
        }
        inner.state = LifecycleState::Running;
        inner.started_at = Some(Instant::now());
        Ok(())
    }

    /// Mark the run body as returned, whatever its outcome
    pub fn finish(&self) {
        let mut inner = self.lock();
        inner.bank_elapsed();
        inner.state = LifecycleState::Completed;
        inner.stop_requested = false;
        drop(inner);
        self.resumed.notify_waiters();
    }

    pub fn pause(&self) -> Result<(), LifecycleError> {
        let mut inner = self.lock();
        if inner.state != LifecycleState::Running {
            return Err(LifecycleError::InvalidTransition {
                operation: "pause",
                state: inner.state,
            });
        }
        inner.bank_elapsed();
        inner.state = LifecycleState::Paused;
        Ok(())
    }

    pub fn resume(&self) -> Result<(), LifecycleError> {
        let mut inner = self.lock();
        if inner.state != LifecycleState::Paused {
            return Err(LifecycleError::InvalidTransition {
                operation: "resume",
                state: inner.state,
            });
        }
        inner.state = LifecycleState::Running;
        inner.started_at = Some(Instant::now());
        drop(inner);
        self.resumed.notify_waiters();
        Ok(())
    }

    /// Clear the running flag and ask the body to stop at its next checkpoint.
    /// Paused and completed commands keep their state.
    pub fn stop(&self) {
        let mut inner = self.lock();
        match inner.state {
            LifecycleState::Running => {
                inner.bank_elapsed();
                inner.state = LifecycleState::Stopped;
                inner.stop_requested = true;
            }
            LifecycleState::Paused => inner.stop_requested = true,
            _ => {}
        }
        drop(inner);
        self.resumed.notify_waiters();
    }

    /// Wait while paused; report whether the body should keep going
    pub async fn checkpoint(&self) -> Checkpoint {
        loop {
            let resumed = self.resumed.notified();
            {
                let inner = self.lock();
                if inner.stop_requested {
                    return Checkpoint::Cancelled;
                }
                if inner.state != LifecycleState::Paused {
                    return Checkpoint::Continue;
                }
            }
            resumed.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state() == LifecycleState::Paused
    }

    pub fn is_complete(&self) -> bool {
        self.state() == LifecycleState::Completed
    }

    /// Time spent running so far, excluding paused intervals
    pub fn up_time(&self) -> Duration {
        let inner = self.lock();
        inner.accumulated
            + inner
                .started_at
                .map(|started_at| started_at.elapsed())
                .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), LifecycleState::Idle);
        assert!(!lifecycle.is_complete());
        assert_eq!(lifecycle.up_time(), Duration::ZERO);
    }

    #[test]
    fn test_pause_only_once() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin().unwrap();
        lifecycle.pause().unwrap();
        assert!(lifecycle.is_paused());
        assert!(!lifecycle.is_running());

        let err = lifecycle.pause().unwrap_err();
        assert_eq!(
            err,
            LifecycleError::InvalidTransition {
                operation: "pause",
                state: LifecycleState::Paused
            }
        );
    }

    #[test]
    fn test_pause_requires_running() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.pause().is_err());
    }

    #[test]
    fn test_resume_requires_paused() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin().unwrap();
        assert!(lifecycle.resume().is_err());

        lifecycle.pause().unwrap();
        lifecycle.resume().unwrap();
        assert!(lifecycle.is_running());
    }

    #[test]
    fn test_begin_only_from_idle() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin().unwrap();
        lifecycle.finish();
        assert!(lifecycle.is_complete());
        assert!(matches!(
            lifecycle.begin(),
            Err(LifecycleError::InvalidTransition {
                operation: "run",
                ..
            })
        ));
    }

    #[test]
    fn test_stop_clears_running_only() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin().unwrap();
        lifecycle.stop();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
        assert!(!lifecycle.is_running());
        assert!(!lifecycle.is_complete());

        let paused = Lifecycle::new();
        paused.begin().unwrap();
        paused.pause().unwrap();
        paused.stop();
        assert!(paused.is_paused());
    }

    #[test]
    fn test_finish_clears_pause() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin().unwrap();
        lifecycle.pause().unwrap();
        lifecycle.finish();
        assert!(lifecycle.is_complete());
        assert!(!lifecycle.is_paused());
    }

    #[test]
    fn test_up_time_frozen_while_paused() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin().unwrap();
        std::thread::sleep(Duration::from_millis(10));
        lifecycle.pause().unwrap();

        let at_pause = lifecycle.up_time();
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(lifecycle.up_time(), at_pause);
        assert!(at_pause >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_checkpoint_reports_stop() {
        let lifecycle = Lifecycle::new();
        lifecycle.begin().unwrap();
        assert_eq!(lifecycle.checkpoint().await, Checkpoint::Continue);
        lifecycle.stop();
        assert_eq!(lifecycle.checkpoint().await, Checkpoint::Cancelled);
    }
}
