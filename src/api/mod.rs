//! Backend collaborators.
//!
//! The engine talks to the synthetics backend only through the traits in
//! this module. `HttpApiClient` is the production implementation;
//! `crate::mock::MockBackend` is the in-process one used by tests.

mod http;

pub use http::{get_datadog_host, ApiEndpoints, ApiVersion, HttpApiClient};

use async_trait::async_trait;
use synthetics_protocol::{Batch, Payload, PollResult, SyntheticsOrgSettings, Test, Trigger};

/// Error returned by a backend call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("could not reach the backend: {0}")]
    Transport(String),

    #[error("HTTP {status}: {}", format_errors(.errors))]
    Backend { status: u16, errors: Vec<String> },

    #[error("invalid response: {0}")]
    Decode(String),
}

fn format_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        "no error details".to_string()
    } else {
        errors.join(", ")
    }
}

impl ApiError {
    pub fn backend(status: u16, error: impl Into<String>) -> Self {
        ApiError::Backend {
            status,
            errors: vec![error.into()],
        }
    }

    /// HTTP status of the response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Backend { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(status) if status >= 500)
    }
}

/// A failed backend call, tagged with the operation that made it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EndpointError {
    pub operation: String,
    pub message: String,
    pub status: Option<u16>,
}

impl EndpointError {
    pub fn new(operation: &str, error: &ApiError) -> Self {
        Self {
            operation: operation.to_string(),
            message: format!("Failed to {}: {}", operation, error),
            status: error.status(),
        }
    }

    /// Prefix the message with the ids the call was about
    pub fn with_subject(mut self, subject: &str) -> Self {
        self.message = format!("[{}] {}", subject, self.message);
        self
    }
}

/// Synthetics backend operations used by a CI run
#[async_trait]
pub trait SyntheticsApi: Send + Sync {
    async fn get_test(&self, public_id: &str) -> Result<Test, ApiError>;

    /// Public ids of the tests matching a search query
    async fn search_tests(&self, query: &str) -> Result<Vec<String>, ApiError>;

    async fn trigger_tests(&self, payload: &Payload) -> Result<Trigger, ApiError>;

    /// Current snapshot of a batch. Must be safe to call repeatedly.
    async fn get_batch(&self, batch_id: &str) -> Result<Batch, ApiError>;

    async fn poll_results(&self, result_ids: &[String]) -> Result<Vec<PollResult>, ApiError>;

    async fn get_org_settings(&self) -> Result<SyntheticsOrgSettings, ApiError>;
}

/// Uploads mobile application binaries ahead of a trigger
#[async_trait]
pub trait MobileAppUploader: Send + Sync {
    /// Upload the file and return the name it was stored under
    async fn upload_application(
        &self,
        application_id: &str,
        file_path: &str,
    ) -> Result<String, ApiError>;
}
