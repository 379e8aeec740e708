//! Batch validation and submission

use crate::backend::TaskBackend;
use crate::config::UploadLimits;
use crate::error::{Error, Result};
use crate::types::{ProtectionOptions, TaskId, UploadFile};
use std::sync::Arc;
use tracing::{info, warn};

/// Size and shape of a validated batch
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchSummary {
    /// Number of files
    pub file_count: usize,
    /// Sum of all file sizes in bytes
    pub total_bytes: u64,
}

/// Check a batch against the client-side limits without touching the network
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the batch is empty, has too many files, contains
/// a non-image or empty file, or exceeds the per-file or total size ceiling.
pub fn validate_batch(files: &[UploadFile], limits: &UploadLimits) -> Result<BatchSummary> {
    if files.is_empty() {
        return Err(Error::InvalidInput("No files selected".to_string()));
    }
    if files.len() > limits.max_files {
        return Err(Error::InvalidInput(format!(
            "Too many files: {} selected, at most {} allowed",
            files.len(),
            limits.max_files
        )));
    }

    let mut total_bytes = 0u64;
    for file in files {
        if !file.is_image() {
            return Err(Error::InvalidInput(format!(
                "{} is not an image ({})",
                file.name, file.mime_type
            )));
        }
        if file.is_empty() {
            return Err(Error::InvalidInput(format!("{} is empty", file.name)));
        }
        if file.len() > limits.max_file_bytes {
            return Err(Error::InvalidInput(format!(
                "{} is {} bytes, larger than the {} byte limit",
                file.name,
                file.len(),
                limits.max_file_bytes
            )));
        }
        total_bytes = total_bytes.saturating_add(file.len());
    }

    if total_bytes > limits.max_batch_bytes {
        return Err(Error::InvalidInput(format!(
            "Batch is {} bytes, larger than the {} byte limit",
            total_bytes, limits.max_batch_bytes
        )));
    }

    Ok(BatchSummary {
        file_count: files.len(),
        total_bytes,
    })
}

/// Validates batches and hands them to the backend
///
/// Never retries: a failed submission is returned to the caller, who decides what to do.
#[derive(Clone)]
pub struct TaskSubmitter {
    backend: Arc<dyn TaskBackend>,
    limits: UploadLimits,
    options: ProtectionOptions,
}

impl TaskSubmitter {
    /// Create a submitter
    pub fn new(
        backend: Arc<dyn TaskBackend>,
        limits: UploadLimits,
        options: ProtectionOptions,
    ) -> Self {
        Self {
            backend,
            limits,
            options,
        }
    }

    /// Submit a batch and return the task identifier
    pub async fn submit(&self, files: &[UploadFile]) -> Result<TaskId> {
        self.submit_with_options(files, &self.options).await
    }

    /// Submit a batch with protection options other than the configured defaults
    pub async fn submit_with_options(
        &self,
        files: &[UploadFile],
        options: &ProtectionOptions,
    ) -> Result<TaskId> {
        let summary = validate_batch(files, &self.limits)?;

        info!(
            backend = self.backend.name(),
            file_count = summary.file_count,
            total_bytes = summary.total_bytes,
            protection_type = options.protection_type.as_str(),
            intensity = options.intensity.as_str(),
            "Submitting batch"
        );

        match self.backend.submit(files, options).await {
            Ok(task_id) => {
                info!(task_id = %task_id, "Batch accepted");
                Ok(task_id)
            }
            Err(e) => {
                warn!(error = %e, "Batch submission failed");
                Err(e)
            }
        }
    }
}
