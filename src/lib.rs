//! # shield-client
//!
//! Client library for the ArtShield image protection service.
//!
//! A batch of images is submitted once, the service answers with a task identifier,
//! and the client polls that task until it completes or fails, reporting every
//! progress snapshot to an observer.
//!
//! ## Design Philosophy
//!
//! - **One backend seam** - the network service and the offline simulation implement
//!   the same [`TaskBackend`] trait; the tracker never checks which one it talks to
//! - **Transient vs. terminal** - a failed status query is retried on the next tick,
//!   only a failure reported by the service ends tracking with an error
//! - **Owned timers** - every tracking loop lives behind a [`TrackingHandle`] that
//!   cancels it when dropped
//!
//! ## Quick Start
//!
//! ```no_run
//! use shield_client::{Config, ShieldClient, UploadFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ShieldClient::new(Config {
//!         simulate: true,
//!         ..Default::default()
//!     })?;
//!
//!     let files = vec![UploadFile::new("sketch.png", "image/png", std::fs::read("sketch.png")?)];
//!     let handle = client
//!         .protect(&files, |task| println!("{:>3}% {}", task.progress, task.message))
//!         .await?;
//!
//!     let task = handle.join().await?;
//!     println!("{} finished: {}", task.id, task.message);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Task backends (network, simulated, mode-switching)
pub mod backend;
/// Client façade
pub mod client;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Batch validation and submission
pub mod submitter;
/// Polling-based task tracking
pub mod tracker;
/// Core task and wire types
pub mod types;

// Re-export commonly used types
pub use backend::{
    BackendMode, HttpBackend, ModalBackend, ModeSelector, SimulatedBackend, TaskBackend,
};
pub use client::ShieldClient;
pub use config::{Config, ServiceConfig, SimulationConfig, UploadLimits};
pub use error::{Error, Result};
pub use submitter::{BatchSummary, TaskSubmitter, validate_batch};
pub use tracker::{TaskTracker, TrackingHandle};
pub use types::{
    HealthStatus, Intensity, ProtectionOptions, ProtectionType, StatusSnapshot, Task, TaskId,
    TaskStatus, UploadFile,
};
