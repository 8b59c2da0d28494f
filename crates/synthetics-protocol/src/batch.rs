//! Trigger acknowledgement and batch snapshots.
//!
//! The backend reports the state of a triggered batch as a point-in-time
//! snapshot. A snapshot is never mutated locally; each poll supersedes
//! the previous one.

use serde::{Deserialize, Serialize};

use crate::rule::ExecutionRule;

/// A resolved execution location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub is_active: bool,
    pub name: String,
    #[serde(default)]
    pub region: String,
}

/// Backend acknowledgement of a trigger submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub batch_id: String,
    #[serde(default)]
    pub locations: Vec<Location>,
}

/// Status of a batch or of one entry in it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Passed,
    Failed,
    Skipped,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Passed => "passed",
            BatchStatus::Failed => "failed",
            BatchStatus::Skipped => "skipped",
        }
    }

    pub fn is_in_progress(&self) -> bool {
        *self == BatchStatus::InProgress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunDecisionKind {
    Run,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunReason {
    New,
    Edited,
    InProgress,
    Failed,
    Passed,
}

/// Server-computed selective rerun decision for one test.
///
/// `linked_result_id` is set for `run:failed` and `skip:passed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectiveRerunDecision {
    pub decision: RerunDecisionKind,
    pub reason: RerunReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_result_id: Option<String>,
}

impl SelectiveRerunDecision {
    /// `skip:passed` decision linking to a previous result
    pub fn skipped(linked_result_id: impl Into<String>) -> Self {
        Self {
            decision: RerunDecisionKind::Skip,
            reason: RerunReason::Passed,
            linked_result_id: Some(linked_result_id.into()),
        }
    }

    pub fn is_skip(&self) -> bool {
        self.decision == RerunDecisionKind::Skip
    }
}

/// One entry of a batch snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultInBatch {
    pub test_public_id: String,

    #[serde(default)]
    pub execution_rule: ExecutionRule,

    pub status: BatchStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timed_out: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selective_rerun: Option<SelectiveRerunDecision>,
}

impl ResultInBatch {
    /// Entry that the backend did not execute because a previous result
    /// is still valid.
    pub fn is_skipped_by_selective_rerun(&self) -> bool {
        self.status == BatchStatus::Skipped
            && self
                .selective_rerun
                .as_ref()
                .map(SelectiveRerunDecision::is_skip)
                .unwrap_or(false)
    }

    /// Whether this entry can be reported (no longer running)
    pub fn is_settled(&self) -> bool {
        self.is_skipped_by_selective_rerun() || !self.status.is_in_progress()
    }

    /// Own result id, or the linked one for selective rerun skips
    pub fn result_id_or_linked(&self) -> Option<&str> {
        if self.is_skipped_by_selective_rerun() {
            return self
                .selective_rerun
                .as_ref()
                .and_then(|rerun| rerun.linked_result_id.as_deref());
        }
        self.result_id.as_deref()
    }
}

/// Batch snapshot as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerBatch {
    pub status: BatchStatus,
    #[serde(default)]
    pub results: Vec<ResultInBatch>,
}

/// Batch snapshot as seen by the poller.
///
/// Entries of tests that were skipped through their execution rule are
/// dropped; entries skipped by selective rerun are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub status: BatchStatus,
    pub results: Vec<ResultInBatch>,
}

impl From<ServerBatch> for Batch {
    fn from(batch: ServerBatch) -> Self {
        let results = batch
            .results
            .into_iter()
            .filter(|r| r.status != BatchStatus::Skipped || r.is_skipped_by_selective_rerun())
            .collect();

        Batch {
            status: batch.status,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_batch_filters_plain_skips() {
        let server: ServerBatch = serde_json::from_value(json!({
            "status": "in_progress",
            "results": [
                {"test_public_id": "aaa-aaa-aaa", "execution_rule": "blocking", "status": "in_progress", "result_id": "1", "location": "aws:eu-central-1"},
                {"test_public_id": "bbb-bbb-bbb", "execution_rule": "skipped", "status": "skipped"},
                {"test_public_id": "ccc-ccc-ccc", "execution_rule": "blocking", "status": "skipped",
                 "selective_rerun": {"decision": "skip", "reason": "passed", "linked_result_id": "abc"}}
            ]
        }))
        .unwrap();

        let batch = Batch::from(server);
        let ids: Vec<_> = batch.results.iter().map(|r| r.test_public_id.as_str()).collect();
        assert_eq!(ids, vec!["aaa-aaa-aaa", "ccc-ccc-ccc"]);
        assert!(batch.results[1].is_skipped_by_selective_rerun());
        assert_eq!(batch.results[1].result_id_or_linked(), Some("abc"));
    }

    #[test]
    fn test_settled_entries() {
        let mut entry: ResultInBatch = serde_json::from_value(json!({
            "test_public_id": "aaa-aaa-aaa",
            "execution_rule": "non_blocking",
            "status": "in_progress",
            "result_id": "1"
        }))
        .unwrap();
        assert!(!entry.is_settled());

        entry.status = BatchStatus::Failed;
        assert!(entry.is_settled());
        assert_eq!(entry.result_id_or_linked(), Some("1"));
    }

    #[test]
    fn test_run_decision_is_not_a_skip() {
        let decision: SelectiveRerunDecision = serde_json::from_value(json!({
            "decision": "run",
            "reason": "failed",
            "linked_result_id": "old"
        }))
        .unwrap();
        assert!(!decision.is_skip());
        assert_eq!(decision.reason, RerunReason::Failed);
    }
}
