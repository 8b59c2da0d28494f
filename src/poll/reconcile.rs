//! Result reconciliation
//!
//! Turns one batch entry, its detailed poll result and the test it belongs
//! to into a final `TestResult`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::Serialize;
use synthetics_protocol::{
    ExecutionRule, PollResult, ResultFailure, ResultInBatch, SelectiveRerunDecision, ServerResult,
    Test, TIMEOUT_FAILURE_CODE,
};
use tracing::debug;

use super::PollError;
use crate::config::deep_merge;
use crate::summary::FailurePolicy;

/// What a result carries beyond the shared fields
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultKind {
    /// The test ran in this batch
    Executed {
        location: String,
        result: ServerResult,
        timestamp: i64,
    },
    /// Selective rerun linked a previous passing result instead of running
    SkippedBySelectiveRerun,
}

/// Final verdict for one batch entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub test: Test,
    pub execution_rule: ExecutionRule,
    pub passed: bool,
    /// Own result id, or the linked one for selective-rerun skips
    pub result_id: Option<String>,
    pub timed_out: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selective_rerun: Option<SelectiveRerunDecision>,
    #[serde(flatten)]
    pub kind: ResultKind,
}

impl TestResult {
    pub fn is_skipped_by_selective_rerun(&self) -> bool {
        matches!(self.kind, ResultKind::SkippedBySelectiveRerun)
    }

    pub fn server_result(&self) -> Option<&ServerResult> {
        match &self.kind {
            ResultKind::Executed { result, .. } => Some(result),
            ResultKind::SkippedBySelectiveRerun => None,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match &self.kind {
            ResultKind::Executed { location, .. } => Some(location),
            ResultKind::SkippedBySelectiveRerun => None,
        }
    }

    pub fn timestamp(&self) -> Option<i64> {
        match &self.kind {
            ResultKind::Executed { timestamp, .. } => Some(*timestamp),
            ResultKind::SkippedBySelectiveRerun => None,
        }
    }

    /// The run infrastructure failed, not the test
    pub fn is_unhealthy(&self) -> bool {
        self.server_result().map(ServerResult::is_unhealthy).unwrap_or(false)
    }
}

/// Whether a result counts as passed under `policy`.
///
/// Unhealthy and timed-out results pass unless the run fails on them.
/// Otherwise the explicit `passed` flag wins, then the presence of a
/// failure.
pub fn has_result_passed(result: &ServerResult, timed_out: bool, policy: &FailurePolicy) -> bool {
    if result.is_unhealthy() && !policy.fail_on_critical_errors {
        return true;
    }

    if timed_out && !policy.fail_on_timeout {
        return true;
    }

    if let Some(passed) = result.passed {
        return passed;
    }

    result.failure.is_none()
}

/// The fetched test refined with the check fields of its poll result
fn refine_test(test: &Test, check: Option<&serde_json::Value>) -> Test {
    let Some(check) = check else {
        return test.clone();
    };

    let merged = serde_json::to_value(test).map(|value| deep_merge(value, check.clone()));
    match merged.and_then(serde_json::from_value::<Test>) {
        Ok(mut refined) => {
            refined.suite = test.suite.clone();
            refined
        }
        Err(e) => {
            debug!(test_id = %test.public_id, error = %e, "ignoring unusable check");
            test.clone()
        }
    }
}

fn force_timeout(result: &mut ServerResult) {
    result.failure = Some(ResultFailure {
        code: TIMEOUT_FAILURE_CODE.to_string(),
        message: "Result timed out".to_string(),
    });
    result.passed = Some(false);
}

/// Reconcile one batch entry.
///
/// `expired` is the poller's deadline flag for the current tick. A timed
/// out entry without a poll result gets an empty one; any other missing
/// poll result is an error. The poll result of a timed out entry is
/// rewritten in `poll_results` to carry the timeout failure.
pub fn reconcile(
    entry: &ResultInBatch,
    test: &Test,
    poll_results: &mut HashMap<String, PollResult>,
    location: impl FnOnce(&str, &Test) -> String,
    expired: bool,
    policy: &FailurePolicy,
) -> Result<TestResult, PollError> {
    if entry.is_skipped_by_selective_rerun() {
        return Ok(TestResult {
            test: test.clone(),
            execution_rule: ExecutionRule::Skipped,
            passed: true,
            result_id: entry.result_id_or_linked().map(str::to_string),
            timed_out: expired,
            selective_rerun: entry.selective_rerun.clone(),
            kind: ResultKind::SkippedBySelectiveRerun,
        });
    }

    let timed_out = entry.timed_out.unwrap_or(expired);
    let result_id = entry.result_id.clone().unwrap_or_default();

    let poll_result = match poll_results.entry(result_id.clone()) {
        Entry::Occupied(occupied) => occupied.into_mut(),
        Entry::Vacant(vacant) if timed_out => vacant.insert(PollResult::empty(result_id)),
        Entry::Vacant(_) => {
            return Err(PollError::MissingResult {
                test_id: entry.test_public_id.clone(),
                result_id,
            })
        }
    };

    if timed_out {
        force_timeout(&mut poll_result.result);
    }

    let test = refine_test(test, poll_result.check.as_ref());
    let passed = has_result_passed(&poll_result.result, timed_out, policy);
    let location = location(entry.location.as_deref().unwrap_or_default(), &test);

    Ok(TestResult {
        execution_rule: entry.execution_rule,
        passed,
        result_id: entry.result_id.clone(),
        timed_out,
        selective_rerun: entry.selective_rerun.clone(),
        kind: ResultKind::Executed {
            location,
            result: poll_result.result.clone(),
            timestamp: poll_result.timestamp,
        },
        test,
    })
}
