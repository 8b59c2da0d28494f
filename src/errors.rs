//! Run error codes and top-level run errors.
//!
//! A run aborts with one of two kinds of error: a recoverable
//! configuration error raised before anything is triggered, or a critical
//! error raised mid-run. Both carry a stable code from the registry below.

use crate::api::EndpointError;
use crate::config::ConfigError;

/// Stable error codes reported for aborted runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CiErrorCode {
    /// Every requested test was skipped or missing
    NoTestsToRun,
    /// Some requested tests do not exist
    MissingTests,
    /// Credentials were refused by the backend
    AuthorizationError,
    InvalidConfig,
    MissingApiKey,
    MissingAppKey,
    /// Batch or result polling failed
    PollResultsFailed,
    TunnelStartFailed,
    TooManyTestsToTrigger,
    TriggerTestsFailed,
    /// Fetching a test definition (or a search) failed
    UnavailableTestConfig,
    UnavailableTunnelConfig,
    /// A test cannot run through the tunnel
    TunnelNotSupported,
    UploadMobileApplicationTestsFailed,
}

impl CiErrorCode {
    /// Returns the string representation of the error code
    pub fn as_str(&self) -> &'static str {
        match self {
            CiErrorCode::NoTestsToRun => "NO_TESTS_TO_RUN",
            CiErrorCode::MissingTests => "MISSING_TESTS",
            CiErrorCode::AuthorizationError => "AUTHORIZATION_ERROR",
            CiErrorCode::InvalidConfig => "INVALID_CONFIG",
            CiErrorCode::MissingApiKey => "MISSING_API_KEY",
            CiErrorCode::MissingAppKey => "MISSING_APP_KEY",
            CiErrorCode::PollResultsFailed => "POLL_RESULTS_FAILED",
            CiErrorCode::TunnelStartFailed => "TUNNEL_START_FAILED",
            CiErrorCode::TooManyTestsToTrigger => "TOO_MANY_TESTS_TO_TRIGGER",
            CiErrorCode::TriggerTestsFailed => "TRIGGER_TESTS_FAILED",
            CiErrorCode::UnavailableTestConfig => "UNAVAILABLE_TEST_CONFIG",
            CiErrorCode::UnavailableTunnelConfig => "UNAVAILABLE_TUNNEL_CONFIG",
            CiErrorCode::TunnelNotSupported => "TUNNEL_NOT_SUPPORTED",
            CiErrorCode::UploadMobileApplicationTestsFailed => {
                "UPLOAD_MOBILE_APPLICATION_TESTS_FAILED"
            }
        }
    }

    /// Codes that mean "nothing (or not everything) to run"
    pub fn is_missing_tests(&self) -> bool {
        matches!(self, CiErrorCode::NoTestsToRun | CiErrorCode::MissingTests)
    }
}

impl std::fmt::Display for CiErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error that aborts a run
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("{code}: {message}")]
    Recoverable { code: CiErrorCode, message: String },

    #[error("{code}: {message}")]
    Critical {
        code: CiErrorCode,
        message: String,
        status: Option<u16>,
    },
}

impl RunError {
    pub fn recoverable(code: CiErrorCode, message: impl Into<String>) -> Self {
        RunError::Recoverable {
            code,
            message: message.into(),
        }
    }

    pub fn critical(code: CiErrorCode, message: impl Into<String>) -> Self {
        RunError::Critical {
            code,
            message: message.into(),
            status: None,
        }
    }

    /// Convert an endpoint failure at a stage boundary.
    ///
    /// A 403 always becomes `AUTHORIZATION_ERROR`, whatever the stage.
    pub fn from_endpoint(code: CiErrorCode, error: EndpointError) -> Self {
        let code = if error.status == Some(403) {
            CiErrorCode::AuthorizationError
        } else {
            code
        };

        RunError::Critical {
            code,
            message: error.message,
            status: error.status,
        }
    }

    pub fn code(&self) -> CiErrorCode {
        match self {
            RunError::Recoverable { code, .. } | RunError::Critical { code, .. } => *code,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            RunError::Recoverable { message, .. } | RunError::Critical { message, .. } => message,
        }
    }

    /// HTTP status of the failed call, if the error came from one
    pub fn status(&self) -> Option<u16> {
        match self {
            RunError::Recoverable { .. } => None,
            RunError::Critical { status, .. } => *status,
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, RunError::Critical { .. })
    }
}

impl From<ConfigError> for RunError {
    fn from(error: ConfigError) -> Self {
        let code = match error {
            ConfigError::MissingApiKey => CiErrorCode::MissingApiKey,
            ConfigError::MissingAppKey => CiErrorCode::MissingAppKey,
            _ => CiErrorCode::InvalidConfig,
        };
        RunError::critical(code, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_strings() {
        assert_eq!(CiErrorCode::NoTestsToRun.as_str(), "NO_TESTS_TO_RUN");
        assert_eq!(
            CiErrorCode::UploadMobileApplicationTestsFailed.to_string(),
            "UPLOAD_MOBILE_APPLICATION_TESTS_FAILED"
        );
        assert!(CiErrorCode::MissingTests.is_missing_tests());
        assert!(!CiErrorCode::TooManyTestsToTrigger.is_missing_tests());
    }

    #[test]
    fn test_from_endpoint_keeps_stage_code() {
        let endpoint = EndpointError {
            operation: "poll results".to_string(),
            message: "Failed to poll results: HTTP 502".to_string(),
            status: Some(502),
        };

        let error = RunError::from_endpoint(CiErrorCode::PollResultsFailed, endpoint);
        assert_eq!(error.code(), CiErrorCode::PollResultsFailed);
        assert_eq!(error.status(), Some(502));
        assert!(error.is_critical());
    }

    #[test]
    fn test_from_endpoint_forbidden_is_authorization_error() {
        let endpoint = EndpointError {
            operation: "trigger tests".to_string(),
            message: "Failed to trigger tests: HTTP 403".to_string(),
            status: Some(403),
        };

        let error = RunError::from_endpoint(CiErrorCode::TriggerTestsFailed, endpoint);
        assert_eq!(error.code(), CiErrorCode::AuthorizationError);
    }

    #[test]
    fn test_config_errors_map_to_codes() {
        assert_eq!(
            RunError::from(ConfigError::MissingApiKey).code(),
            CiErrorCode::MissingApiKey
        );
        assert_eq!(
            RunError::from(ConfigError::MissingAppKey).code(),
            CiErrorCode::MissingAppKey
        );
        let invalid = ConfigError::ValidationError("pollingTimeout must be positive".to_string());
        assert_eq!(RunError::from(invalid).code(), CiErrorCode::InvalidConfig);
    }
}
