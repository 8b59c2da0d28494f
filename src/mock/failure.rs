//! Failure injection for the mock backend

use std::collections::HashMap;
use std::time::Duration;

use crate::api::ApiError;

/// Backend operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetTest,
    SearchTests,
    TriggerTests,
    GetBatch,
    PollResults,
    GetOrgSettings,
    UploadApplication,
}

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// HTTP status to answer with; `None` is a transport failure
    pub status: Option<u16>,
    pub message: Option<String>,
    /// Delay to add before responding
    pub delay: Option<Duration>,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Answer with an HTTP error
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: Some(message.into()),
            delay: None,
            fail_count: None,
        }
    }

    /// Fail without a response
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: Some(message.into()),
            delay: None,
            fail_count: None,
        }
    }

    /// Only add delay
    pub fn delay(duration: Duration) -> Self {
        Self {
            status: None,
            message: None,
            delay: Some(duration),
            fail_count: None,
        }
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }

    /// The error this config answers with, if it is a failure
    pub fn to_error(&self) -> Option<ApiError> {
        let message = self.message.clone()?;
        Some(match self.status {
            Some(status) => ApiError::backend(status, message),
            None => ApiError::Transport(message),
        })
    }
}

/// Per-operation failures of the mock backend
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<Operation, FailureConfig>,
    /// Call counts per operation (for fail_count tracking)
    call_counts: HashMap<Operation, u32>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject(&mut self, op: Operation, config: FailureConfig) {
        self.configs.insert(op, config);
        self.call_counts.insert(op, 0);
    }

    pub fn inject_error(&mut self, op: Operation, status: u16, message: impl Into<String>) {
        self.inject(op, FailureConfig::error(status, message));
    }

    pub fn clear(&mut self) {
        self.configs.clear();
        self.call_counts.clear();
    }

    /// Failure to apply to this call of `op`, if any
    pub fn check(&mut self, op: Operation) -> Option<FailureConfig> {
        let config = self.configs.get(&op)?;
        let count = self.call_counts.entry(op).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None;
            }
        }

        Some(config.clone())
    }
}
