//! Network-backed task backend

use super::TaskBackend;
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::types::{HealthStatus, ProtectionOptions, StatusSnapshot, TaskId, UploadFile};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Body of a successful `POST /api/process`
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default, alias = "task_id")]
    id: Option<String>,
}

/// Talks to the processing service over HTTP
///
/// - `POST {base}/api/process` with one `files` part per image
/// - `GET {base}/api/status/{id}` for polling
/// - `GET {base}/api/health` for reachability
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
    poll_interval: Duration,
}

impl HttpBackend {
    /// Create a backend for the service described by `config`
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base: config.base_url()?,
            poll_interval: config.poll_interval,
        })
    }

    /// Base URL every endpoint is resolved against
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn status_url(&self, task_id: &TaskId) -> Result<Url> {
        let mut url = self.base.join("api/status/")?;
        url.path_segments_mut()
            .map_err(|_| Error::config("service URL cannot be a base", "service.origin"))?
            .pop_if_empty()
            .push(task_id.as_str());
        Ok(url)
    }

    fn build_form(files: &[UploadFile], options: &ProtectionOptions) -> Result<Form> {
        let mut form = Form::new();
        for file in files {
            let part = Part::bytes(file.data.clone())
                .file_name(file.name.clone())
                .mime_str(&file.mime_type)
                .map_err(|e| {
                    Error::InvalidInput(format!(
                        "{}: invalid MIME type '{}': {e}",
                        file.name, file.mime_type
                    ))
                })?;
            form = form.part("files", part);
        }

        Ok(form
            .text("protection_type", options.protection_type.as_str())
            .text("intensity", options.intensity.as_str()))
    }
}

/// Pull a human-readable message out of a `{"detail": ...}` error body
///
/// String details are used verbatim; structured ones (validation error lists) are
/// rendered as JSON text.
fn extract_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) if s.trim().is_empty() => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl TaskBackend for HttpBackend {
    async fn submit(&self, files: &[UploadFile], options: &ProtectionOptions) -> Result<TaskId> {
        let url = self.base.join("api/process")?;
        let form = Self::build_form(files, options)?;

        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::SubmissionFailed {
                message: format!("Failed to reach processing service: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let message = extract_detail(&body).unwrap_or_else(|| {
                format!("Failed to start processing (HTTP {})", status.as_u16())
            });
            tracing::warn!(url = %url, status = status.as_u16(), error = %message, "submission rejected");
            return Err(Error::SubmissionFailed { message });
        }

        let parsed: SubmitResponse =
            serde_json::from_str(&body).map_err(|e| Error::SubmissionFailed {
                message: format!("Unexpected response from processing service: {e}"),
            })?;

        match parsed.id {
            Some(id) if !id.trim().is_empty() => Ok(TaskId::new(id)),
            _ => Err(Error::SubmissionFailed {
                message: "Processing service returned no task id".to_string(),
            }),
        }
    }

    async fn status(&self, task_id: &TaskId) -> Result<StatusSnapshot> {
        let url = self.status_url(task_id)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::PollTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::PollTransport(format!(
                "Failed to fetch task status (HTTP {})",
                status.as_u16()
            )));
        }

        response
            .json::<StatusSnapshot>()
            .await
            .map_err(|e| Error::PollTransport(format!("malformed status response: {e}")))
    }

    async fn health(&self) -> Result<HealthStatus> {
        let url = self.base.join("api/health")?;
        let health = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<HealthStatus>()
            .await?;
        Ok(health)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
