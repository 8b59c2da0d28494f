//! Mock backend state
//!
//! Scripted responses plus a record of every call received.

use std::collections::HashMap;

use synthetics_protocol::{Batch, Location, Payload, PollResult, SyntheticsOrgSettings, Test};

/// Default batch id returned by the mock trigger
pub const MOCK_BATCH_ID: &str = "mock-batch-1";

/// Calls received by the mock backend
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    pub get_test: Vec<String>,
    pub search_tests: Vec<String>,
    pub trigger_tests: Vec<Payload>,
    pub get_batch: Vec<String>,
    pub poll_results: Vec<Vec<String>>,
    pub get_org_settings: usize,
    /// (application id, file path)
    pub uploads: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct MockState {
    pub tests: HashMap<String, Test>,
    pub search_results: HashMap<String, Vec<String>>,
    pub batch_id: String,
    pub locations: Vec<Location>,
    /// Snapshots served in order; the last one repeats
    pub batches: Vec<Batch>,
    pub batch_cursor: usize,
    pub poll_results: HashMap<String, PollResult>,
    pub org_settings: SyntheticsOrgSettings,
    pub calls: CallLog,
}

impl Default for MockState {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    pub fn new() -> Self {
        Self {
            tests: HashMap::new(),
            search_results: HashMap::new(),
            batch_id: MOCK_BATCH_ID.to_string(),
            locations: vec![Location {
                display_name: "Frankfurt (AWS)".to_string(),
                id: 1,
                is_active: true,
                name: "aws:eu-central-1".to_string(),
                region: "Europe".to_string(),
            }],
            batches: Vec::new(),
            batch_cursor: 0,
            poll_results: HashMap::new(),
            org_settings: SyntheticsOrgSettings {
                on_demand_concurrency_cap: 10,
            },
            calls: CallLog::default(),
        }
    }

    /// Next scripted batch snapshot
    pub fn next_batch(&mut self) -> Option<Batch> {
        if self.batches.is_empty() {
            return None;
        }

        let index = self.batch_cursor.min(self.batches.len() - 1);
        self.batch_cursor += 1;
        Some(self.batches[index].clone())
    }
}
