//! Run counters and the run summary file

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use synthetics_protocol::{ExecutionRule, SyntheticsOrgSettings};

use super::exit::{ExitReason, FailurePolicy};
use super::outcome::ResultOutcome;
use crate::poll::TestResult;
use crate::reporter::{get_result_duration, Reporter};

/// Schema version for the run summary file
pub const RUN_SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Schema identifier for the run summary file
pub const RUN_SUMMARY_SCHEMA_ID: &str = "synthetics-ci/run_summary@1";

/// Counters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    pub critical_errors: usize,
    pub expected: usize,
    pub failed: usize,
    pub failed_non_blocking: usize,
    pub passed: usize,
    pub previously_passed: usize,
    pub skipped: usize,
    pub tests_not_found: BTreeSet<String>,
    pub timed_out: usize,
}

impl Summary {
    /// Fold one finalized result into the counters
    pub fn record(&mut self, result: &TestResult, policy: &FailurePolicy) -> ResultOutcome {
        if result.timed_out && !policy.fail_on_timeout {
            self.timed_out += 1;
        }

        if result.is_unhealthy() && !policy.fail_on_critical_errors {
            self.critical_errors += 1;
        }

        let outcome = ResultOutcome::of(result);

        if result.execution_rule != ExecutionRule::Skipped
            || outcome == ResultOutcome::PreviouslyPassed
        {
            self.expected += 1;
        }

        match outcome {
            ResultOutcome::Passed | ResultOutcome::PassedNonBlocking => self.passed += 1,
            ResultOutcome::PreviouslyPassed => {
                self.passed += 1;
                self.previously_passed += 1;
            }
            ResultOutcome::FailedNonBlocking => self.failed_non_blocking += 1,
            ResultOutcome::Failed => self.failed += 1,
        }

        outcome
    }
}

/// Fold `results` into `summary` and hand it to the reporter
pub fn render_results(
    results: &[TestResult],
    summary: &mut Summary,
    policy: &FailurePolicy,
    reporter: &dyn Reporter,
    base_url: &str,
    org_settings: Option<&SyntheticsOrgSettings>,
    start_time: DateTime<Utc>,
) {
    reporter.report_start(start_time);

    for result in results {
        summary.record(result, policy);
    }

    reporter.run_end(summary, base_url, org_settings);
}

/// One result as written to the run summary file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub public_id: String,
    pub name: String,
    pub outcome: ResultOutcome,
    pub execution_rule: ExecutionRule,
    pub passed: bool,
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub duration_ms: u64,
}

impl From<&TestResult> for ResultSummary {
    fn from(result: &TestResult) -> Self {
        Self {
            public_id: result.test.public_id.clone(),
            name: result.test.name.clone(),
            outcome: ResultOutcome::of(result),
            execution_rule: result.execution_rule,
            passed: result.passed,
            timed_out: result.timed_out,
            result_id: result.result_id.clone(),
            location: result.location().map(str::to_string),
            duration_ms: result.server_result().map(get_result_duration).unwrap_or(0),
        }
    }
}

/// Run summary (run_summary.json)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,
    pub exit_reason: ExitReason,
    pub exit_code: i32,
    pub summary: Summary,
    pub results: Vec<ResultSummary>,

    /// Code of the error that aborted the run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    pub human_summary: String,
}

impl RunSummary {
    pub fn new(
        summary: &Summary,
        results: &[TestResult],
        exit_reason: ExitReason,
        error_code: Option<&str>,
    ) -> Self {
        let human_summary = Self::generate_human_summary(summary, exit_reason);

        Self {
            schema_version: RUN_SUMMARY_SCHEMA_VERSION,
            schema_id: RUN_SUMMARY_SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            exit_reason,
            exit_code: exit_reason.exit_code(),
            summary: summary.clone(),
            results: results.iter().map(ResultSummary::from).collect(),
            error_code: error_code.map(str::to_string),
            human_summary,
        }
    }

    fn generate_human_summary(summary: &Summary, exit_reason: ExitReason) -> String {
        let mut parts = vec![format!("{} passed", summary.passed)];
        if summary.previously_passed > 0 {
            parts.push(format!("{} previously passed", summary.previously_passed));
        }
        parts.push(format!("{} failed", summary.failed));
        if summary.failed_non_blocking > 0 {
            parts.push(format!("{} failed (non-blocking)", summary.failed_non_blocking));
        }
        if summary.skipped > 0 {
            parts.push(format!("{} skipped", summary.skipped));
        }
        if summary.timed_out > 0 {
            parts.push(format!("{} timed out", summary.timed_out));
        }
        if !summary.tests_not_found.is_empty() {
            parts.push(format!("{} not found", summary.tests_not_found.len()));
        }

        format!("{}: {}", exit_reason.as_str(), parts.join(", "))
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write to file
    pub fn write_to_file(&self, path: &Path) -> io::Result<()> {
        let json = self
            .to_json()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)
    }

    /// Load from file
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
