//! Shared fixtures: image batches, configs and update recorders

use shield_client::{Config, ServiceConfig, Task, UploadFile};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::MockServer;

/// A batch of `count` small PNG files
pub fn png_batch(count: usize) -> Vec<UploadFile> {
    (0..count)
        .map(|i| {
            UploadFile::new(
                format!("artwork-{i}.png"),
                "image/png",
                vec![0x89, b'P', b'N', b'G', i as u8],
            )
        })
        .collect()
}

/// Network-mode config pointing at a mock server, polling fast
pub fn http_config(server: &MockServer) -> Config {
    Config {
        simulate: false,
        service: ServiceConfig {
            origin: server.uri(),
            poll_interval: Duration::from_millis(20),
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Simulation-mode config with default pacing
pub fn simulated_config() -> Config {
    Config {
        simulate: true,
        ..Default::default()
    }
}

/// Records every task state handed to an observer
#[derive(Clone, Default)]
pub struct UpdateLog {
    updates: Arc<Mutex<Vec<Task>>>,
}

impl UpdateLog {
    /// Observer closure that appends to this log
    pub fn recorder(&self) -> impl FnMut(&Task) + Send + 'static {
        let updates = self.updates.clone();
        move |task: &Task| updates.lock().unwrap().push(task.clone())
    }

    /// Snapshot of everything recorded so far
    pub fn all(&self) -> Vec<Task> {
        self.updates.lock().unwrap().clone()
    }

    /// Number of updates recorded so far
    pub fn len(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    /// Assert progress never went down and at most the last update is terminal
    pub fn assert_well_formed(&self) {
        let updates = self.all();
        for pair in updates.windows(2) {
            assert!(
                pair[1].progress >= pair[0].progress,
                "progress went backwards: {} -> {}",
                pair[0].progress,
                pair[1].progress
            );
            assert!(!pair[0].is_terminal(), "update delivered after terminal state");
        }
    }
}

/// Number of status queries the mock server has received
pub async fn status_queries(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == "GET" && r.url.path().starts_with("/api/status/"))
        .count()
}
