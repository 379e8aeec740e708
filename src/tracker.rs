//! Polling-based task tracking
//!
//! The tracker owns one [`Task`] from submission until a terminal state. It polls the
//! backend on the backend's cadence, applies each snapshot, and reports every applied
//! snapshot to an observer.
//!
//! # Polling rules
//!
//! - The first query runs immediately, then one per interval tick
//! - Queries never overlap: a tick that fires while a query is outstanding is skipped
//! - A failed query is logged and retried on the next tick; it never fails the task
//! - `completed` and `failed` end polling; the observer sees the final task exactly once
//! - Cancellation stops the timer and discards any in-flight query's result
//!
//! # Example
//!
//! ```no_run
//! use shield_client::backend::SimulatedBackend;
//! use shield_client::config::SimulationConfig;
//! use shield_client::tracker::TaskTracker;
//! use shield_client::types::TaskId;
//! use std::sync::Arc;
//!
//! # async fn example(id: TaskId) -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(SimulatedBackend::new(SimulationConfig::default()));
//! let tracker = TaskTracker::new(backend);
//!
//! let handle = tracker.spawn(id, |task| {
//!     println!("{}% {}", task.progress, task.message);
//! });
//!
//! let task = handle.join().await?;
//! println!("finished: {}", task.status);
//! # Ok(())
//! # }
//! ```

use crate::backend::TaskBackend;
use crate::error::{Error, Result};
use crate::types::{Task, TaskId, TaskStatus};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// First tick on the fixed polling grid strictly after `now`
///
/// Ticks that elapsed while a query was outstanding are skipped, not queued.
pub(crate) fn next_tick_after(started: Instant, period: Duration, now: Instant) -> Instant {
    let period_nanos = period.as_nanos().max(1);
    let elapsed = now.saturating_duration_since(started).as_nanos();
    let ticks = u32::try_from(elapsed / period_nanos + 1).unwrap_or(u32::MAX);
    started + period.saturating_mul(ticks)
}

/// Polls a backend until a task reaches a terminal state
#[derive(Clone)]
pub struct TaskTracker {
    backend: Arc<dyn TaskBackend>,
    max_consecutive_errors: Option<u32>,
}

impl TaskTracker {
    /// Create a tracker that keeps polling through any number of transport errors
    pub fn new(backend: Arc<dyn TaskBackend>) -> Self {
        Self {
            backend,
            max_consecutive_errors: None,
        }
    }

    /// Give up after `limit` consecutive failed queries
    ///
    /// `None` never gives up. `Some(0)` is treated like `None`.
    pub fn with_max_consecutive_errors(mut self, limit: Option<u32>) -> Self {
        self.max_consecutive_errors = limit.filter(|&n| n > 0);
        self
    }

    /// Track a task until it completes or fails
    ///
    /// Returns the completed task, or [`Error::ProcessingFailed`] with the service's message.
    pub async fn track<F>(&self, task_id: TaskId, on_update: F) -> Result<Task>
    where
        F: FnMut(&Task) + Send,
    {
        self.track_until_cancelled(task_id, on_update, CancellationToken::new())
            .await
    }

    /// Track a task until it reaches a terminal state or `cancel` fires
    ///
    /// Returns [`Error::Cancelled`] if cancelled first. After cancellation `on_update` is
    /// never called again, even if a query was in flight.
    ///
    /// The backend is resolved once, so the whole run polls the backend that was selected
    /// when tracking started. It is released when the run ends.
    pub async fn track_until_cancelled<F>(
        &self,
        task_id: TaskId,
        on_update: F,
        cancel: CancellationToken,
    ) -> Result<Task>
    where
        F: FnMut(&Task) + Send,
    {
        let backend = self
            .backend
            .resolve()
            .unwrap_or_else(|| Arc::clone(&self.backend));

        let outcome = self
            .poll_until_terminal(backend.as_ref(), task_id.clone(), on_update, &cancel)
            .await;
        backend.release(&task_id).await;
        outcome
    }

    async fn poll_until_terminal<F>(
        &self,
        backend: &dyn TaskBackend,
        task_id: TaskId,
        mut on_update: F,
        cancel: &CancellationToken,
    ) -> Result<Task>
    where
        F: FnMut(&Task) + Send,
    {
        let mut task = Task::new(task_id);
        let period = backend.poll_interval();
        let started = Instant::now();
        let mut next_tick = started;
        let mut consecutive_errors: u32 = 0;

        debug!(
            task_id = %task.id,
            backend = backend.name(),
            interval_ms = period.as_millis() as u64,
            "Tracking started"
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(task_id = %task.id, "Tracking cancelled");
                    return Err(Error::Cancelled);
                }
                _ = sleep_until(next_tick) => {}
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(task_id = %task.id, "Tracking cancelled, discarding in-flight status query");
                    return Err(Error::Cancelled);
                }
                result = backend.status(&task.id) => result,
            };
            next_tick = next_tick_after(started, period, Instant::now());

            let snapshot = match result {
                Ok(snapshot) if snapshot.id != task.id => {
                    Err(Error::PollTransport(format!(
                        "status response for task {} while tracking {}",
                        snapshot.id, task.id
                    )))
                }
                other => other,
            };

            let snapshot = match snapshot {
                Ok(snapshot) => {
                    consecutive_errors = 0;
                    snapshot
                }
                Err(e) => {
                    consecutive_errors = consecutive_errors.saturating_add(1);
                    if self
                        .max_consecutive_errors
                        .is_some_and(|limit| consecutive_errors >= limit)
                    {
                        error!(
                            task_id = %task.id,
                            error = %e,
                            consecutive_errors,
                            "Status queries keep failing, giving up"
                        );
                        return Err(e);
                    }
                    warn!(
                        task_id = %task.id,
                        error = %e,
                        consecutive_errors,
                        "Status query failed, retrying on next tick"
                    );
                    continue;
                }
            };

            task.apply(snapshot);
            on_update(&task);

            match task.status {
                TaskStatus::Completed => {
                    info!(task_id = %task.id, "Task completed");
                    return Ok(task);
                }
                TaskStatus::Failed => {
                    warn!(task_id = %task.id, error = %task.message, "Task failed");
                    return Err(Error::ProcessingFailed {
                        task_id: task.id.clone(),
                        message: task.message.clone(),
                    });
                }
                TaskStatus::Pending | TaskStatus::Processing => {
                    debug!(
                        task_id = %task.id,
                        status = %task.status,
                        progress = task.progress,
                        "Task in flight"
                    );
                }
            }
        }
    }

    /// Track a task on a background tokio task
    ///
    /// The returned handle owns the polling loop: cancelling or dropping it stops polling.
    pub fn spawn<F>(&self, task_id: TaskId, mut on_update: F) -> TrackingHandle
    where
        F: FnMut(&Task) + Send + 'static,
    {
        let (state_tx, state_rx) = watch::channel(Task::new(task_id.clone()));
        let cancel = CancellationToken::new();

        let tracker = self.clone();
        let token = cancel.clone();
        let id = task_id.clone();
        let join = tokio::spawn(async move {
            tracker
                .track_until_cancelled(
                    id,
                    move |task: &Task| {
                        state_tx.send_replace(task.clone());
                        on_update(task);
                    },
                    token,
                )
                .await
        });

        TrackingHandle {
            task_id,
            cancel,
            join: Some(join),
            state: state_rx,
        }
    }
}

/// Handle to a spawned tracking loop
///
/// Dropping the handle cancels tracking, so the polling timer never outlives its owner.
pub struct TrackingHandle {
    task_id: TaskId,
    cancel: CancellationToken,
    join: Option<JoinHandle<Result<Task>>>,
    state: watch::Receiver<Task>,
}

impl TrackingHandle {
    /// Task being tracked
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Stop tracking; no further updates are delivered
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true once the tracking loop has exited
    pub fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(|join| join.is_finished())
    }

    /// Latest applied task state
    pub fn current(&self) -> Task {
        self.state.borrow().clone()
    }

    /// Receiver that observes every applied task state
    pub fn subscribe(&self) -> watch::Receiver<Task> {
        self.state.clone()
    }

    /// Wait for the tracking loop to finish and return its outcome
    pub async fn join(mut self) -> Result<Task> {
        let Some(join) = self.join.take() else {
            return Err(Error::Cancelled);
        };
        match join.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => Err(Error::Cancelled),
        }
    }
}

impl Drop for TrackingHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
