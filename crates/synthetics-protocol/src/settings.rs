//! Organization-wide synthetics settings.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntheticsOrgSettings {
    /// Maximum number of tests the org may run in parallel on demand
    #[serde(default)]
    pub on_demand_concurrency_cap: u32,
}
