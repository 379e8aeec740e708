//! Task backends
//!
//! Everything that talks to the processing service (or pretends to) sits behind the
//! [`TaskBackend`] trait, so the submitter and tracker never branch on the run mode.
//!
//! ## Implementations
//!
//! - [`HttpBackend`]: multipart submission and JSON status polling over HTTP
//! - [`SimulatedBackend`]: offline, clock-driven progress with no network I/O
//! - [`ModalBackend`]: dispatches every call to one of the above based on a [`ModeSelector`]
//!
//! ## Usage
//!
//! ```no_run
//! use shield_client::backend::{SimulatedBackend, TaskBackend};
//! use shield_client::config::SimulationConfig;
//! use shield_client::types::{ProtectionOptions, UploadFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = SimulatedBackend::new(SimulationConfig::default());
//!     let files = vec![UploadFile::new("art.png", "image/png", vec![0u8; 16])];
//!
//!     let id = backend.submit(&files, &ProtectionOptions::default()).await?;
//!     let snapshot = backend.status(&id).await?;
//!     println!("{} is {} at {}%", id, snapshot.status, snapshot.progress);
//!     Ok(())
//! }
//! ```

mod http;
mod modal;
mod simulated;

pub use http::HttpBackend;
pub use modal::{BackendMode, ModalBackend, ModeSelector};
pub use simulated::{SimulatedBackend, simulated_progress};

use crate::types::{HealthStatus, ProtectionOptions, StatusSnapshot, TaskId, UploadFile};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Capability to submit batches and report task status
///
/// Implementations perform no validation of the batch; that is the submitter's job.
/// They must not retry on their own: a failed submission or query is reported once.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    /// Submit a batch and return the identifier of the task processing it
    ///
    /// # Errors
    ///
    /// Returns [`Error::SubmissionFailed`](crate::Error::SubmissionFailed) when the batch
    /// is rejected or cannot be delivered.
    async fn submit(
        &self,
        files: &[UploadFile],
        options: &ProtectionOptions,
    ) -> crate::Result<TaskId>;

    /// Query the current status of a task
    ///
    /// # Errors
    ///
    /// Returns [`Error::PollTransport`](crate::Error::PollTransport) when the query itself
    /// fails. A task the service reports as failed is an `Ok` snapshot, not an error.
    async fn status(&self, task_id: &TaskId) -> crate::Result<StatusSnapshot>;

    /// Check that the service is reachable and healthy
    async fn health(&self) -> crate::Result<HealthStatus>;

    /// Cadence at which the tracker should poll this backend
    fn poll_interval(&self) -> Duration;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;

    /// Forget any per-task state held for `task_id`
    ///
    /// The tracker calls this once when it stops following a task, whatever the outcome.
    async fn release(&self, _task_id: &TaskId) {}

    /// Concrete backend that should serve a whole operation
    ///
    /// Dispatching backends return the backend selected right now, so a task is polled
    /// by the backend that issued it even if the selection changes mid-operation.
    /// Concrete backends return `None` and serve the operation themselves.
    fn resolve(&self) -> Option<Arc<dyn TaskBackend>> {
        None
    }
}
