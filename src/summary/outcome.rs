//! Result outcome taxonomy

use serde::{Deserialize, Serialize};
use synthetics_protocol::ExecutionRule;

use crate::poll::TestResult;

/// Five-way classification of a finalized result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultOutcome {
    PreviouslyPassed,
    PassedNonBlocking,
    Passed,
    FailedNonBlocking,
    Failed,
}

impl ResultOutcome {
    /// Classify a result
    pub fn of(result: &TestResult) -> Self {
        if result.is_skipped_by_selective_rerun() {
            return ResultOutcome::PreviouslyPassed;
        }

        let non_blocking = result.execution_rule == ExecutionRule::NonBlocking;
        match (result.passed, non_blocking) {
            (true, true) => ResultOutcome::PassedNonBlocking,
            (true, false) => ResultOutcome::Passed,
            (false, true) => ResultOutcome::FailedNonBlocking,
            (false, false) => ResultOutcome::Failed,
        }
    }

    /// Display order, passed first
    pub fn weight(&self) -> u8 {
        match self {
            ResultOutcome::PreviouslyPassed => 1,
            ResultOutcome::PassedNonBlocking => 2,
            ResultOutcome::Passed => 3,
            ResultOutcome::FailedNonBlocking => 4,
            ResultOutcome::Failed => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultOutcome::PreviouslyPassed => "previously-passed",
            ResultOutcome::PassedNonBlocking => "passed-non-blocking",
            ResultOutcome::Passed => "passed",
            ResultOutcome::FailedNonBlocking => "failed-non-blocking",
            ResultOutcome::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ResultOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable sort by outcome weight
pub fn sort_results_by_outcome(results: &mut [TestResult]) {
    results.sort_by_key(|r| ResultOutcome::of(r).weight());
}
