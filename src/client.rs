//! Client façade wiring submission and tracking together

use crate::backend::{HttpBackend, ModalBackend, ModeSelector, SimulatedBackend, TaskBackend};
use crate::config::Config;
use crate::error::Result;
use crate::submitter::TaskSubmitter;
use crate::tracker::{TaskTracker, TrackingHandle};
use crate::types::{HealthStatus, ProtectionOptions, Task, TaskId, UploadFile};
use std::sync::Arc;

/// Submits batches to the ArtShield service and tracks them to completion
///
/// Cloneable; clones share the backend and the mode selector.
#[derive(Clone)]
pub struct ShieldClient {
    config: Arc<Config>,
    mode: ModeSelector,
    backend: Arc<dyn TaskBackend>,
    submitter: TaskSubmitter,
    tracker: TaskTracker,
}

impl ShieldClient {
    /// Create a client with a network backend and a simulated backend, switched by
    /// `config.simulate`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let mode = ModeSelector::from_config(&config);
        let network: Arc<dyn TaskBackend> = Arc::new(HttpBackend::new(&config.service)?);
        let simulated: Arc<dyn TaskBackend> =
            Arc::new(SimulatedBackend::new(config.simulation.clone()));
        let backend: Arc<dyn TaskBackend> =
            Arc::new(ModalBackend::new(mode.clone(), network, simulated));

        tracing::info!(
            mode = %mode.mode(),
            origin = %config.service.origin,
            "ArtShield client ready"
        );

        Ok(Self::assemble(config, mode, backend))
    }

    /// Create a client from `SHIELD_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?)
    }

    /// Create a client around a custom backend
    ///
    /// The mode selector is still available but has no effect on a custom backend.
    pub fn with_backend(config: Config, backend: Arc<dyn TaskBackend>) -> Self {
        let mode = ModeSelector::from_config(&config);
        Self::assemble(config, mode, backend)
    }

    fn assemble(config: Config, mode: ModeSelector, backend: Arc<dyn TaskBackend>) -> Self {
        let submitter = TaskSubmitter::new(
            backend.clone(),
            config.upload.clone(),
            config.protection,
        );
        let tracker = TaskTracker::new(backend.clone())
            .with_max_consecutive_errors(config.service.max_consecutive_poll_errors);

        Self {
            config: Arc::new(config),
            mode,
            backend,
            submitter,
            tracker,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Selector deciding between the network service and the simulation
    pub fn mode(&self) -> &ModeSelector {
        &self.mode
    }

    /// Validate and submit a batch
    pub async fn submit(&self, files: &[UploadFile]) -> Result<TaskId> {
        self.submitter.submit(files).await
    }

    /// Validate and submit a batch with explicit protection options
    pub async fn submit_with_options(
        &self,
        files: &[UploadFile],
        options: &ProtectionOptions,
    ) -> Result<TaskId> {
        self.submitter.submit_with_options(files, options).await
    }

    /// Track a submitted task in the current task until it finishes
    pub async fn track<F>(&self, task_id: TaskId, on_update: F) -> Result<Task>
    where
        F: FnMut(&Task) + Send,
    {
        self.tracker.track(task_id, on_update).await
    }

    /// Track a submitted task in the background
    pub fn spawn_tracking<F>(&self, task_id: TaskId, on_update: F) -> TrackingHandle
    where
        F: FnMut(&Task) + Send + 'static,
    {
        self.tracker.spawn(task_id, on_update)
    }

    /// Submit a batch and start tracking it in the background
    ///
    /// Submission errors are returned directly; tracking never starts for a rejected batch.
    pub async fn protect<F>(&self, files: &[UploadFile], on_update: F) -> Result<TrackingHandle>
    where
        F: FnMut(&Task) + Send + 'static,
    {
        let task_id = self.submit(files).await?;
        Ok(self.spawn_tracking(task_id, on_update))
    }

    /// Check that the active backend is healthy
    pub async fn health(&self) -> Result<HealthStatus> {
        self.backend.health().await
    }
}
