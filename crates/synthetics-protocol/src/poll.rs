//! Detailed poll results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Failure reported for a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFailure {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Timings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// Execution payload of one result.
///
/// Fields the engine does not interpret (assertions, steps, step details)
/// are kept in `details`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ResultFailure>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,

    /// Infrastructure-level failure, not caused by the test itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unhealthy: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timings: Option<Timings>,

    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl ServerResult {
    pub fn is_unhealthy(&self) -> bool {
        self.unhealthy.unwrap_or(false)
    }
}

/// Detailed payload for one result id, as returned by the poll endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollResult {
    /// Test fields refined for this execution (type, subtype, config).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<Value>,

    #[serde(default)]
    pub result: ServerResult,

    #[serde(rename = "resultID")]
    pub result_id: String,

    #[serde(default)]
    pub timestamp: i64,
}

impl PollResult {
    /// Empty payload used when the backend has nothing for a result
    pub fn empty(result_id: impl Into<String>) -> Self {
        Self {
            check: None,
            result: ServerResult::default(),
            result_id: result_id.into(),
            timestamp: 0,
        }
    }
}
