//! End-to-end runs against the in-process backend
//!
//! Each test drives `Pipeline::run` from requested ids to exit code:
//! - a passing test
//! - a test still running at the polling deadline
//! - a test skipped by selective rerun
//! - a non-blocking failure
//! - aborted runs and the exit reasons they produce

use std::time::Duration;

use synthetics_ci::config::RunConfig;
use synthetics_ci::errors::CiErrorCode;
use synthetics_ci::mock::{MockBackend, Operation, RecordingReporter};
use synthetics_ci::pipeline::Pipeline;
use synthetics_ci::summary::{ExitReason, ResultOutcome, RunSummary};
use synthetics_protocol::{
    Batch, BatchStatus, ExecutionRule, PollResult, ResultFailure, ResultInBatch,
    SelectiveRerunDecision, Test, TestType,
};
use tempfile::TempDir;

const PUBLIC_ID: &str = "abc-def-ghi";

fn config() -> RunConfig {
    RunConfig {
        api_key: "api".to_string(),
        app_key: "app".to_string(),
        public_ids: vec![PUBLIC_ID.to_string()],
        ..RunConfig::default()
    }
}

fn entry(status: BatchStatus, execution_rule: ExecutionRule) -> ResultInBatch {
    ResultInBatch {
        test_public_id: PUBLIC_ID.to_string(),
        execution_rule,
        status,
        result_id: Some("r-1".to_string()),
        timed_out: (!status.is_in_progress()).then_some(false),
        location: Some("aws:eu-central-1".to_string()),
        selective_rerun: None,
    }
}

fn backend(test: Test, batches: Vec<Batch>) -> MockBackend {
    let backend = MockBackend::new().with_test(test);
    backend.set_batches(batches);
    backend
}

fn http_test() -> Test {
    Test::new(PUBLIC_ID, TestType::Api).with_subtype("http")
}

#[tokio::test(start_paused = true)]
async fn test_passing_run() {
    let backend = backend(
        http_test(),
        vec![Batch {
            status: BatchStatus::Passed,
            results: vec![entry(BatchStatus::Passed, ExecutionRule::Blocking)],
        }],
    );
    let mut poll = PollResult::empty("r-1");
    poll.result.passed = Some(true);
    poll.result.duration = Some(1234.4);
    backend.add_poll_result(poll);

    let reporter = RecordingReporter::new();
    let config = config();
    let outcome = Pipeline::new(&config, &backend, &reporter).run().await;

    assert!(outcome.error.is_none());
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].passed);
    assert_eq!(ResultOutcome::of(&outcome.results[0]), ResultOutcome::Passed);
    assert_eq!(outcome.summary.passed, 1);
    assert_eq!(outcome.summary.expected, 1);
    assert_eq!(outcome.exit_reason, ExitReason::Passed);
    assert_eq!(outcome.exit_code, 0);

    assert_eq!(reporter.report_starts(), 1);
    assert_eq!(reporter.run_ends(), vec![outcome.summary.clone()]);
    assert!(reporter.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_with_lenient_timeout() {
    let backend = backend(
        http_test(),
        vec![Batch {
            status: BatchStatus::InProgress,
            results: vec![entry(BatchStatus::InProgress, ExecutionRule::Blocking)],
        }],
    );
    let reporter = RecordingReporter::new();
    let config = RunConfig {
        polling_timeout: 1000,
        fail_on_timeout: false,
        ..config()
    };

    let outcome = Pipeline::new(&config, &backend, &reporter).run().await;

    assert!(outcome.results[0].timed_out);
    assert_eq!(outcome.summary.timed_out, 1);
    assert_eq!(outcome.summary.passed, 1);
    assert_eq!(outcome.exit_code, 0);
    assert!(reporter
        .errors()
        .iter()
        .any(|e| e.contains("Because `failOnTimeout` is disabled")));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_with_strict_timeout() {
    let backend = backend(
        http_test(),
        vec![Batch {
            status: BatchStatus::InProgress,
            results: vec![entry(BatchStatus::InProgress, ExecutionRule::Blocking)],
        }],
    );
    let reporter = RecordingReporter::new();
    let config = RunConfig {
        polling_timeout: 1000,
        ..config()
    };

    let start = tokio::time::Instant::now();
    let outcome = Pipeline::new(&config, &backend, &reporter).run().await;

    // one tick before the deadline, one after it
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(start.elapsed() < Duration::from_secs(10));
    assert_eq!(backend.get_batch_calls(), 2);
    assert_eq!(outcome.summary.timed_out, 0);
    assert_eq!(outcome.summary.failed, 1);
    assert_eq!(outcome.exit_reason, ExitReason::FailingTests);
    assert_eq!(outcome.exit_code, 1);
}

#[tokio::test(start_paused = true)]
async fn test_selective_rerun_skip() {
    let mut skipped = entry(BatchStatus::Skipped, ExecutionRule::Blocking);
    skipped.result_id = None;
    skipped.timed_out = None;
    skipped.selective_rerun = Some(SelectiveRerunDecision::skipped("abc"));

    let backend = backend(
        http_test(),
        vec![Batch {
            status: BatchStatus::Passed,
            results: vec![skipped],
        }],
    );
    let reporter = RecordingReporter::new();
    let config = RunConfig {
        selective_rerun: true,
        ..config()
    };

    let outcome = Pipeline::new(&config, &backend, &reporter).run().await;

    let result = &outcome.results[0];
    assert_eq!(result.execution_rule, ExecutionRule::Skipped);
    assert!(result.passed);
    assert_eq!(result.result_id.as_deref(), Some("abc"));
    assert!(result.is_skipped_by_selective_rerun());
    assert_eq!(ResultOutcome::of(result), ResultOutcome::PreviouslyPassed);

    assert_eq!(outcome.summary.previously_passed, 1);
    assert_eq!(outcome.summary.passed, 1);
    assert_eq!(outcome.summary.expected, 1);
    assert_eq!(outcome.summary.skipped, 0);
    assert_eq!(outcome.exit_code, 0);

    // nothing ran, so no detailed result was fetched
    assert!(backend.poll_calls().is_empty());
    assert_eq!(reporter.received().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_blocking_failure() {
    let backend = backend(
        http_test().with_ci_execution_rule(ExecutionRule::NonBlocking),
        vec![Batch {
            status: BatchStatus::Failed,
            results: vec![entry(BatchStatus::Failed, ExecutionRule::NonBlocking)],
        }],
    );
    let mut poll = PollResult::empty("r-1");
    poll.result.passed = Some(false);
    poll.result.failure = Some(ResultFailure {
        code: "INCORRECT_ASSERTION".to_string(),
        message: "status is 500".to_string(),
    });
    backend.add_poll_result(poll);

    let reporter = RecordingReporter::new();
    let config = RunConfig {
        fail_on_critical_errors: true,
        fail_on_missing_tests: true,
        ..config()
    };

    let outcome = Pipeline::new(&config, &backend, &reporter).run().await;

    assert_eq!(ResultOutcome::of(&outcome.results[0]), ResultOutcome::FailedNonBlocking);
    assert_eq!(outcome.summary.failed_non_blocking, 1);
    assert_eq!(outcome.summary.failed, 0);
    assert_ne!(outcome.exit_reason, ExitReason::FailingTests);
    assert_eq!(outcome.exit_code, 0);
}

#[tokio::test]
async fn test_trigger_failure_exit_depends_on_policy() {
    let backend = MockBackend::new().with_test(http_test());
    backend.fail(Operation::TriggerTests, 500, "Internal error");

    let lenient = config();
    let reporter = RecordingReporter::new();
    let outcome = Pipeline::new(&lenient, &backend, &reporter).run().await;

    assert_eq!(outcome.error.as_ref().map(|e| e.code()), Some(CiErrorCode::TriggerTestsFailed));
    assert_eq!(outcome.exit_reason, ExitReason::Passed);
    assert!(reporter
        .errors()
        .iter()
        .any(|e| e.starts_with("ERROR: unable to trigger tests")));

    let strict = RunConfig {
        fail_on_critical_errors: true,
        ..config()
    };
    let outcome = Pipeline::new(&strict, &backend, &RecordingReporter::new()).run().await;

    assert_eq!(outcome.exit_reason, ExitReason::CriticalError);
    assert_eq!(outcome.exit_code, 1);
}

#[tokio::test]
async fn test_missing_tests_exit_reason() {
    let backend = MockBackend::new();
    let config = RunConfig {
        fail_on_missing_tests: true,
        ..config()
    };

    let outcome = Pipeline::new(&config, &backend, &RecordingReporter::new()).run().await;

    assert_eq!(outcome.error.as_ref().map(|e| e.code()), Some(CiErrorCode::MissingTests));
    assert_eq!(outcome.exit_reason, ExitReason::MissingTests);
    assert!(backend.triggered_payloads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_summary_file() {
    let backend = backend(
        http_test(),
        vec![Batch {
            status: BatchStatus::Passed,
            results: vec![entry(BatchStatus::Passed, ExecutionRule::Blocking)],
        }],
    );
    let mut poll = PollResult::empty("r-1");
    poll.result.passed = Some(true);
    poll.result.duration = Some(1234.4);
    backend.add_poll_result(poll);

    let config = config();
    let outcome = Pipeline::new(&config, &backend, &RecordingReporter::new()).run().await;

    let temp = TempDir::new().unwrap();
    let path = temp.path().join("run_summary.json");
    RunSummary::new(&outcome.summary, &outcome.results, outcome.exit_reason, None)
        .write_to_file(&path)
        .unwrap();

    let loaded = RunSummary::from_file(&path).unwrap();
    assert_eq!(loaded.exit_code, 0);
    assert_eq!(loaded.summary, outcome.summary);
    assert_eq!(loaded.results[0].public_id, PUBLIC_ID);
    assert_eq!(loaded.results[0].duration_ms, 1234);
    assert_eq!(loaded.human_summary, "passed: 1 passed, 0 failed");
}
