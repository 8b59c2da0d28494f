//! Execution rule type.
//!
//! The blocking policy of a test. Variants are declared in increasing
//! strictness order, so the derived `Ord` ranks
//! `Skipped > NonBlocking > Blocking` and the strictest of two rules is
//! their `max`.

use serde::{Deserialize, Serialize};

/// Per-test blocking policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionRule {
    /// A failure fails the run.
    Blocking,
    /// A failure is reported but does not fail the run.
    NonBlocking,
    /// The test is not executed.
    Skipped,
}

impl ExecutionRule {
    /// Returns the wire representation of the rule.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionRule::Blocking => "blocking",
            ExecutionRule::NonBlocking => "non_blocking",
            ExecutionRule::Skipped => "skipped",
        }
    }
}

impl Default for ExecutionRule {
    fn default() -> Self {
        ExecutionRule::Blocking
    }
}

impl std::fmt::Display for ExecutionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strictness_order() {
        assert!(ExecutionRule::Skipped > ExecutionRule::NonBlocking);
        assert!(ExecutionRule::NonBlocking > ExecutionRule::Blocking);
        assert_eq!(
            ExecutionRule::Blocking.max(ExecutionRule::NonBlocking),
            ExecutionRule::NonBlocking
        );
    }

    #[test]
    fn test_serialization() {
        assert_eq!(
            serde_json::to_string(&ExecutionRule::NonBlocking).unwrap(),
            r#""non_blocking""#
        );
        let rule: ExecutionRule = serde_json::from_str(r#""skipped""#).unwrap();
        assert_eq!(rule, ExecutionRule::Skipped);
    }
}
