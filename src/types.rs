//! Core types for shield-client

use serde::{Deserialize, Serialize};

/// Message attached to every task that reaches [`TaskStatus::Completed`]
pub const COMPLETION_MESSAGE: &str = "Protection complete";

/// Message used when the service reports a failure without saying why
pub const GENERIC_FAILURE_MESSAGE: &str = "Processing failed";

/// Opaque identifier for a submitted task
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Create a new TaskId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task status
///
/// Moves strictly forward: `Pending -> Processing -> Completed | Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted by the service, not started yet
    Pending,
    /// Being processed
    Processing,
    /// Successfully completed
    Completed,
    /// Failed with an error reported by the service
    Failed,
}

impl TaskStatus {
    /// Returns true for `Completed` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Returns true for `Pending` and `Processing`
    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal()
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Completed | TaskStatus::Failed => 2,
        }
    }

    /// Returns true if moving from `self` to `next` does not go backwards
    pub fn can_advance_to(&self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.rank() >= self.rank()
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One status query result, exactly as reported by a backend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Task the snapshot describes
    pub id: TaskId,
    /// Reported status
    pub status: TaskStatus,
    /// Reported progress; clamped to 0..=100 when applied to a [`Task`]
    pub progress: i64,
    /// Reported activity message
    #[serde(default)]
    pub message: String,
}

/// The unit of work tracked for one submitted batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Task identifier (immutable once assigned)
    pub id: TaskId,
    /// Current status
    pub status: TaskStatus,
    /// Progress percentage (0 to 100)
    pub progress: u8,
    /// Advisory description of the current activity
    pub message: String,
}

impl Task {
    /// Create a freshly submitted task (`Pending`, 0%)
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            status: TaskStatus::Pending,
            progress: 0,
            message: String::new(),
        }
    }

    /// Returns true once the task is `Completed` or `Failed`
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a poll snapshot to this task
    ///
    /// Returns false (and leaves the task untouched) if the task is already terminal.
    /// A status that would move backwards is ignored, progress never decreases, and
    /// reaching a terminal status normalizes the progress and message.
    pub fn apply(&mut self, snapshot: StatusSnapshot) -> bool {
        if self.is_terminal() {
            return false;
        }

        if self.status.can_advance_to(snapshot.status) {
            self.status = snapshot.status;
        } else {
            tracing::debug!(
                task_id = %self.id,
                current = %self.status,
                reported = %snapshot.status,
                "Ignoring backwards status transition"
            );
        }

        let reported = snapshot.progress.clamp(0, 100) as u8;
        self.progress = self.progress.max(reported);
        self.message = snapshot.message;

        match self.status {
            TaskStatus::Completed => {
                self.progress = 100;
                self.message = COMPLETION_MESSAGE.to_string();
            }
            TaskStatus::Failed if self.message.trim().is_empty() => {
                self.message = GENERIC_FAILURE_MESSAGE.to_string();
            }
            _ => {}
        }

        true
    }
}

/// One image file to submit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadFile {
    /// File name sent with the multipart part
    pub name: String,
    /// MIME type (must be `image/*`)
    pub mime_type: String,
    /// File contents
    pub data: Vec<u8>,
}

impl UploadFile {
    /// Create a new upload file
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Size in bytes
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    /// Returns true if the file has no contents
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the MIME type is an image type
    pub fn is_image(&self) -> bool {
        match self.mime_type.split_once('/') {
            Some((top, sub)) => top.trim().eq_ignore_ascii_case("image") && !sub.trim().is_empty(),
            None => false,
        }
    }
}

/// Which protections the service applies
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionType {
    /// Adversarial cloak only
    Cloak,
    /// Metadata tagging only
    Tag,
    /// Cloak plus metadata tagging
    #[default]
    CloakAndTag,
}

impl ProtectionType {
    /// Wire value for the `protection_type` form field
    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectionType::Cloak => "cloak",
            ProtectionType::Tag => "tag",
            ProtectionType::CloakAndTag => "cloak_and_tag",
        }
    }
}

/// Cloak strength
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    /// Subtle perturbation
    Low,
    /// Balanced (default)
    #[default]
    Medium,
    /// Strongest perturbation
    High,
}

impl Intensity {
    /// Wire value for the `intensity` form field
    pub fn as_str(&self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Medium => "medium",
            Intensity::High => "high",
        }
    }
}

/// Options sent alongside a batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionOptions {
    /// Which protections to apply
    #[serde(default)]
    pub protection_type: ProtectionType,
    /// Cloak strength
    #[serde(default)]
    pub intensity: Intensity,
}

/// Service health as reported by `GET /api/health`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// `"ok"` when the service is up
    pub status: String,
    /// Human-readable description
    #[serde(default)]
    pub message: String,
}

impl HealthStatus {
    /// Returns true if the service reports itself as healthy
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}
