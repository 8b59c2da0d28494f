//! Exit reason selection and exit logs

use serde::{Deserialize, Serialize};

use super::outcome::ResultOutcome;
use crate::config::RunConfig;
use crate::errors::{CiErrorCode, RunError};
use crate::poll::TestResult;
use crate::reporter::Reporter;

/// Which failures fail the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    pub fail_on_critical_errors: bool,
    pub fail_on_missing_tests: bool,
    pub fail_on_timeout: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            fail_on_critical_errors: false,
            fail_on_missing_tests: false,
            fail_on_timeout: true,
        }
    }
}

impl From<&RunConfig> for FailurePolicy {
    fn from(config: &RunConfig) -> Self {
        Self {
            fail_on_critical_errors: config.fail_on_critical_errors,
            fail_on_missing_tests: config.fail_on_missing_tests,
            fail_on_timeout: config.fail_on_timeout,
        }
    }
}

/// Why the command exits the way it does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitReason {
    FailingTests,
    MissingTests,
    CriticalError,
    Passed,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::FailingTests => "failing-tests",
            ExitReason::MissingTests => "missing-tests",
            ExitReason::CriticalError => "critical-error",
            ExitReason::Passed => "passed",
        }
    }

    pub fn exit_code(&self) -> i32 {
        to_exit_code(*self)
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pick the exit reason of a run, first match wins:
/// a blocking failure, then missing tests, then a critical error.
pub fn get_exit_reason(
    policy: &FailurePolicy,
    results: &[TestResult],
    error: Option<&RunError>,
) -> ExitReason {
    if results.iter().any(|r| ResultOutcome::of(r) == ResultOutcome::Failed) {
        return ExitReason::FailingTests;
    }

    if let Some(error) = error {
        if policy.fail_on_missing_tests && error.code().is_missing_tests() {
            return ExitReason::MissingTests;
        }

        if error.is_critical() && policy.fail_on_critical_errors {
            return ExitReason::CriticalError;
        }
    }

    ExitReason::Passed
}

pub fn to_exit_code(reason: ExitReason) -> i32 {
    match reason {
        ExitReason::Passed => 0,
        _ => 1,
    }
}

/// Explain a lenient exit, then report the error that ended the run
pub fn report_exit_logs(
    reporter: &dyn Reporter,
    policy: &FailurePolicy,
    results: &[TestResult],
    error: Option<&RunError>,
) {
    if !policy.fail_on_timeout && results.iter().any(|r| r.timed_out) {
        reporter.error(
            "Because `failOnTimeout` is disabled, the command will succeed. Use `failOnTimeout: true` to make it fail instead.",
        );
    }

    if let Some(error) = error {
        if !policy.fail_on_critical_errors && error.is_critical() {
            reporter.error(
                "Because `failOnCriticalErrors` is not set or disabled, the command will succeed. Use `failOnCriticalErrors: true` to make it fail instead.",
            );
        }

        report_ci_error(error, reporter);
    }
}

/// Render a run error by code
pub fn report_ci_error(error: &RunError, reporter: &dyn Reporter) {
    let title = match error.code() {
        CiErrorCode::NoTestsToRun => "No tests to run",
        CiErrorCode::MissingTests => "some tests are missing",
        CiErrorCode::AuthorizationError => "authorization error",
        CiErrorCode::InvalidConfig => "invalid config",
        CiErrorCode::MissingAppKey => {
            reporter.error("Missing DATADOG_APP_KEY in your environment.");
            return;
        }
        CiErrorCode::MissingApiKey => {
            reporter.error("Missing DATADOG_API_KEY in your environment.");
            return;
        }
        CiErrorCode::PollResultsFailed => "unable to poll test results",
        CiErrorCode::TunnelStartFailed => "unable to start tunnel",
        CiErrorCode::TooManyTestsToTrigger => "too many tests to trigger",
        CiErrorCode::TriggerTestsFailed => "unable to trigger tests",
        CiErrorCode::UnavailableTestConfig => {
            "unable to obtain test configurations with search query"
        }
        CiErrorCode::UnavailableTunnelConfig => "unable to get tunnel configuration",
        CiErrorCode::TunnelNotSupported | CiErrorCode::UploadMobileApplicationTestsFailed => {
            reporter.error(&format!("ERROR\n{}", error.message()));
            return;
        }
    };

    reporter.error(&format!("ERROR: {}\n{}", title, error.message()));

    if error.code() == CiErrorCode::AuthorizationError {
        reporter.log(
            "Credentials refused, make sure `apiKey`, `appKey` and `datadogSite` are correct.",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingReporter;
    use crate::poll::ResultKind;
    use synthetics_protocol::{ExecutionRule, ServerResult, Test, TestType};

    fn result(passed: bool, execution_rule: ExecutionRule, timed_out: bool) -> TestResult {
        TestResult {
            test: Test::new("abc-def-ghi", TestType::Api),
            execution_rule,
            passed,
            result_id: Some("1".to_string()),
            timed_out,
            selective_rerun: None,
            kind: ResultKind::Executed {
                location: "Frankfurt (AWS)".to_string(),
                result: ServerResult::default(),
                timestamp: 0,
            },
        }
    }

    fn strict() -> FailurePolicy {
        FailurePolicy {
            fail_on_critical_errors: true,
            fail_on_missing_tests: true,
            fail_on_timeout: true,
        }
    }

    #[test]
    fn test_failing_tests_first() {
        let results = vec![result(false, ExecutionRule::Blocking, false)];
        let error = RunError::critical(CiErrorCode::PollResultsFailed, "boom");

        assert_eq!(get_exit_reason(&strict(), &results, Some(&error)), ExitReason::FailingTests);
        assert_eq!(to_exit_code(ExitReason::FailingTests), 1);
    }

    #[test]
    fn test_non_blocking_failure_passes() {
        let results = vec![result(false, ExecutionRule::NonBlocking, false)];
        let reason = get_exit_reason(&strict(), &results, None);

        assert_eq!(reason, ExitReason::Passed);
        assert_eq!(reason.exit_code(), 0);
    }

    #[test]
    fn test_missing_tests() {
        let error = RunError::recoverable(CiErrorCode::NoTestsToRun, "No tests to run");

        assert_eq!(get_exit_reason(&strict(), &[], Some(&error)), ExitReason::MissingTests);
        assert_eq!(
            get_exit_reason(&FailurePolicy::default(), &[], Some(&error)),
            ExitReason::Passed
        );
    }

    #[test]
    fn test_critical_error() {
        let error = RunError::critical(CiErrorCode::TriggerTestsFailed, "boom");

        assert_eq!(get_exit_reason(&strict(), &[], Some(&error)), ExitReason::CriticalError);
        assert_eq!(
            get_exit_reason(&FailurePolicy::default(), &[], Some(&error)),
            ExitReason::Passed
        );
    }

    #[test]
    fn test_exit_logs_lenient_policy() {
        let reporter = RecordingReporter::new();
        let policy = FailurePolicy {
            fail_on_timeout: false,
            ..FailurePolicy::default()
        };
        let results = vec![result(true, ExecutionRule::Blocking, true)];
        let error = RunError::critical(
            CiErrorCode::AuthorizationError,
            "Failed to get test: HTTP 403: Forbidden",
        );

        report_exit_logs(&reporter, &policy, &results, Some(&error));

        let errors = reporter.errors();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("`failOnTimeout` is disabled"));
        assert!(errors[1].contains("`failOnCriticalErrors` is not set"));
        assert!(errors[2].starts_with("ERROR: authorization error"));
        assert_eq!(
            reporter.logs(),
            vec!["Credentials refused, make sure `apiKey`, `appKey` and `datadogSite` are correct.".to_string()]
        );
    }

    #[test]
    fn test_missing_key_message() {
        let reporter = RecordingReporter::new();
        report_ci_error(&RunError::critical(CiErrorCode::MissingApiKey, "missing"), &reporter);

        assert_eq!(
            reporter.errors(),
            vec!["Missing DATADOG_API_KEY in your environment.".to_string()]
        );
    }
}
