//! Reporter that writes every notification as a tracing event

use chrono::{DateTime, Utc};
use synthetics_protocol::{
    ExecutionRule, ResultInBatch, SyntheticsOrgSettings, Test, UserConfigOverride,
};
use tracing::{debug, error, info, warn};

use super::links::{get_batch_url, get_result_duration, get_result_url};
use super::Reporter;
use crate::poll::TestResult;
use crate::summary::{ResultOutcome, Summary};

/// Human-facing output of the binary
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl TracingReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Reporter for TracingReporter {
    fn test_trigger(
        &self,
        test: &Test,
        test_id: &str,
        execution_rule: ExecutionRule,
        config: &UserConfigOverride,
    ) {
        if execution_rule == ExecutionRule::Skipped {
            info!(test_id, name = %test.name, "skipping test");
            return;
        }

        info!(
            test_id,
            name = %test.name,
            execution_rule = %execution_rule,
            overridden = !config.is_empty(),
            "found test"
        );
    }

    fn test_wait(&self, test: &Test) {
        debug!(test_id = %test.public_id, test_type = test.test_type.as_str(), "waiting for test");
    }

    fn tests_wait(&self, tests: &[Test], base_url: &str, batch_id: &str, skipped_count: usize) {
        info!(
            remaining = tests.len(),
            skipped_count,
            batch_url = %get_batch_url(base_url, batch_id),
            "waiting for results"
        );
    }

    fn result_received(&self, result: &ResultInBatch) {
        debug!(
            test_id = %result.test_public_id,
            status = result.status.as_str(),
            result_id = result.result_id_or_linked().unwrap_or("-"),
            "result received"
        );
    }

    fn result_end(&self, result: &TestResult, base_url: &str) {
        let outcome = ResultOutcome::of(result);
        let url = result
            .result_id
            .as_deref()
            .map(|id| get_result_url(base_url, &result.test, id))
            .unwrap_or_default();
        let duration_ms = result.server_result().map(get_result_duration).unwrap_or(0);

        match outcome {
            ResultOutcome::Failed => error!(
                test_id = %result.test.public_id,
                name = %result.test.name,
                location = result.location().unwrap_or("-"),
                timed_out = result.timed_out,
                duration_ms,
                %url,
                "test failed"
            ),
            ResultOutcome::FailedNonBlocking => warn!(
                test_id = %result.test.public_id,
                name = %result.test.name,
                location = result.location().unwrap_or("-"),
                timed_out = result.timed_out,
                duration_ms,
                %url,
                "test failed (non-blocking)"
            ),
            _ => info!(
                test_id = %result.test.public_id,
                name = %result.test.name,
                outcome = outcome.as_str(),
                location = result.location().unwrap_or("-"),
                duration_ms,
                %url,
                "test passed"
            ),
        }
    }

    fn run_end(
        &self,
        summary: &Summary,
        base_url: &str,
        org_settings: Option<&SyntheticsOrgSettings>,
    ) {
        info!(
            expected = summary.expected,
            passed = summary.passed,
            previously_passed = summary.previously_passed,
            failed = summary.failed,
            failed_non_blocking = summary.failed_non_blocking,
            skipped = summary.skipped,
            timed_out = summary.timed_out,
            critical_errors = summary.critical_errors,
            tests_not_found = summary.tests_not_found.len(),
            "run finished"
        );

        if let Some(batch_id) = &summary.batch_id {
            info!(batch_url = %get_batch_url(base_url, batch_id), "results in the app");
        }

        if let Some(settings) = org_settings {
            debug!(concurrency_cap = settings.on_demand_concurrency_cap, "org settings");
        }
    }

    fn error(&self, message: &str) {
        error!("{}", message);
    }

    fn init_errors(&self, errors: &[String]) {
        for message in errors {
            warn!("{}", message);
        }
    }

    fn report_start(&self, start_time: DateTime<Utc>) {
        info!(started_at = %start_time.to_rfc3339(), "reporting results");
    }

    fn log(&self, message: &str) {
        info!("{}", message);
    }
}
