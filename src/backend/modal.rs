//! Run-mode selection between the network and simulated backends

use super::TaskBackend;
use crate::config::Config;
use crate::error::Result;
use crate::types::{HealthStatus, ProtectionOptions, StatusSnapshot, TaskId, UploadFile};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Which backend handles I/O
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendMode {
    /// Real processing service over HTTP
    Network,
    /// Offline simulation
    Simulated,
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendMode::Network => f.write_str("network"),
            BackendMode::Simulated => f.write_str("simulated"),
        }
    }
}

/// Shared simulation flag, resolved once from configuration at startup
///
/// Clones share the same flag. It is read at the start of every operation rather than
/// captured, so flipping it with [`set_simulated`](Self::set_simulated) takes effect on
/// the next submission or tracking run. A tracking run already under way keeps polling
/// the backend that issued its task.
#[derive(Clone, Debug)]
pub struct ModeSelector {
    simulated: Arc<AtomicBool>,
}

impl ModeSelector {
    /// Create a selector with an explicit initial mode
    pub fn new(simulated: bool) -> Self {
        Self {
            simulated: Arc::new(AtomicBool::new(simulated)),
        }
    }

    /// Create a selector from the `simulate` configuration flag
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.simulate)
    }

    /// Returns true when the simulated backend is selected
    pub fn is_simulated(&self) -> bool {
        self.simulated.load(Ordering::SeqCst)
    }

    /// Switch between simulation and the network service
    pub fn set_simulated(&self, simulated: bool) {
        let previous = self.simulated.swap(simulated, Ordering::SeqCst);
        if previous != simulated {
            tracing::info!(mode = %self.mode(), "Backend mode changed");
        }
    }

    /// Currently selected mode
    pub fn mode(&self) -> BackendMode {
        if self.is_simulated() {
            BackendMode::Simulated
        } else {
            BackendMode::Network
        }
    }
}

/// Backend that forwards each call to the network or simulated backend
pub struct ModalBackend {
    selector: ModeSelector,
    network: Arc<dyn TaskBackend>,
    simulated: Arc<dyn TaskBackend>,
}

impl ModalBackend {
    /// Create a dispatching backend
    pub fn new(
        selector: ModeSelector,
        network: Arc<dyn TaskBackend>,
        simulated: Arc<dyn TaskBackend>,
    ) -> Self {
        Self {
            selector,
            network,
            simulated,
        }
    }

    /// The selector consulted on every call
    pub fn selector(&self) -> &ModeSelector {
        &self.selector
    }

    fn active(&self) -> &Arc<dyn TaskBackend> {
        match self.selector.mode() {
            BackendMode::Network => &self.network,
            BackendMode::Simulated => &self.simulated,
        }
    }
}

#[async_trait]
impl TaskBackend for ModalBackend {
    async fn submit(&self, files: &[UploadFile], options: &ProtectionOptions) -> Result<TaskId> {
        self.active().submit(files, options).await
    }

    async fn status(&self, task_id: &TaskId) -> Result<StatusSnapshot> {
        self.active().status(task_id).await
    }

    async fn health(&self) -> Result<HealthStatus> {
        self.active().health().await
    }

    fn poll_interval(&self) -> Duration {
        self.active().poll_interval()
    }

    fn name(&self) -> &'static str {
        self.active().name()
    }

    async fn release(&self, task_id: &TaskId) {
        self.active().release(task_id).await
    }

    fn resolve(&self) -> Option<Arc<dyn TaskBackend>> {
        Some(Arc::clone(self.active()))
    }
}
