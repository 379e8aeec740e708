//! Offline simulated task backend

use super::TaskBackend;
use crate::config::SimulationConfig;
use crate::error::{Error, Result};
use crate::types::{
    COMPLETION_MESSAGE, HealthStatus, ProtectionOptions, StatusSnapshot, TaskId, TaskStatus,
    UploadFile,
};
use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Progress and narration after `tick` simulated ticks
///
/// Progress grows by `increment` per tick and saturates at 100. The message narrates the
/// synthetic processing phase for that progress.
pub fn simulated_progress(tick: u32, increment: u8) -> (u8, &'static str) {
    let progress = (u64::from(tick) * u64::from(increment)).min(100) as u8;
    let message = match progress {
        0 => "Queued for protection...",
        1..=29 => "Analyzing image features...",
        30..=59 => "Applying Mist Cloak...",
        60..=89 => "Embedding protection metadata...",
        90..=99 => "Finalizing protected images...",
        _ => COMPLETION_MESSAGE,
    };
    (progress, message)
}

/// Deterministic, network-free stand-in for the processing service
///
/// Each submitted task gets its own tick counter; every status query reports the state
/// for the current tick and then advances it by one. Tick 0 is `pending`, progress then
/// climbs by the configured increment until the task completes (or hits `fail_at`).
/// A task's counter is dropped once it reports a terminal state or is released.
pub struct SimulatedBackend {
    config: SimulationConfig,
    ticks: Mutex<HashMap<TaskId, u32>>,
    next_serial: AtomicU64,
}

impl SimulatedBackend {
    /// Create a simulated backend
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            ticks: Mutex::new(HashMap::new()),
            next_serial: AtomicU64::new(1),
        }
    }

    /// Number of tasks whose counters are still held
    pub async fn active_task_count(&self) -> usize {
        self.ticks.lock().await.len()
    }

    fn generate_id(&self) -> TaskId {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(9)
            .map(char::from)
            .collect::<String>()
            .to_ascii_lowercase();
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        TaskId::new(format!("sim-{suffix}-{serial}"))
    }

    fn snapshot_for(&self, task_id: &TaskId, tick: u32) -> StatusSnapshot {
        let (progress, message) = simulated_progress(tick, self.config.increment);

        let failed = self.config.fail_at.is_some_and(|at| progress >= at);
        let (status, message) = if failed {
            (TaskStatus::Failed, self.config.failure_message.clone())
        } else if progress >= 100 {
            (TaskStatus::Completed, message.to_string())
        } else if tick == 0 {
            (TaskStatus::Pending, message.to_string())
        } else {
            (TaskStatus::Processing, message.to_string())
        };

        StatusSnapshot {
            id: task_id.clone(),
            status,
            progress: i64::from(progress),
            message,
        }
    }
}

#[async_trait]
impl TaskBackend for SimulatedBackend {
    async fn submit(&self, files: &[UploadFile], _options: &ProtectionOptions) -> Result<TaskId> {
        tokio::time::sleep(self.config.submit_delay).await;

        let id = self.generate_id();
        self.ticks.lock().await.insert(id.clone(), 0);
        tracing::debug!(task_id = %id, file_count = files.len(), "simulated submission accepted");
        Ok(id)
    }

    async fn status(&self, task_id: &TaskId) -> Result<StatusSnapshot> {
        let mut ticks = self.ticks.lock().await;
        let counter = ticks
            .get_mut(task_id)
            .ok_or_else(|| Error::PollTransport(format!("unknown task {task_id}")))?;
        let tick = *counter;
        *counter = counter.saturating_add(1);

        let snapshot = self.snapshot_for(task_id, tick);
        if snapshot.status.is_terminal() {
            ticks.remove(task_id);
        }
        Ok(snapshot)
    }

    async fn health(&self) -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "ok".to_string(),
            message: "ArtShield simulation is running".to_string(),
        })
    }

    fn poll_interval(&self) -> Duration {
        self.config.tick
    }

    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn release(&self, task_id: &TaskId) {
        if self.ticks.lock().await.remove(task_id).is_some() {
            tracing::debug!(task_id = %task_id, "simulated task released");
        }
    }
}
