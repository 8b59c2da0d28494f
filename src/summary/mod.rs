//! Outcome aggregation
//!
//! Classifies finalized results, folds them into the run counters and
//! picks the exit code.

mod exit;
mod outcome;
mod run_summary;

pub use exit::{
    get_exit_reason, report_ci_error, report_exit_logs, to_exit_code, ExitReason, FailurePolicy,
};
pub use outcome::{sort_results_by_outcome, ResultOutcome};
pub use run_summary::{
    render_results, ResultSummary, RunSummary, Summary, RUN_SUMMARY_SCHEMA_ID,
    RUN_SUMMARY_SCHEMA_VERSION,
};
