//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use serde::{Deserialize, Serialize};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "synthetics-ci.toml";

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Site the organization lives on (default: "datadoghq.com")
    pub datadog_site: String,

    /// App subdomain used in result links (default: "app")
    pub subdomain: String,

    /// Fail the run on infrastructure-level errors (default: false)
    pub fail_on_critical_errors: bool,

    /// Fail the run when requested tests are missing (default: false)
    pub fail_on_missing_tests: bool,

    /// Fail the run when a result times out (default: true)
    pub fail_on_timeout: bool,

    /// Maximum polling duration in milliseconds (default: 1800000 = 30 minutes)
    pub polling_timeout: u64,

    /// Let the backend skip tests that already passed on this commit (default: false)
    pub selective_rerun: bool,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            datadog_site: "datadoghq.com".to_string(),
            subdomain: "app".to_string(),
            fail_on_critical_errors: false,
            fail_on_missing_tests: false,
            fail_on_timeout: true,
            polling_timeout: 30 * 60 * 1000,
            selective_rerun: false,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "datadogSite": self.datadog_site,
            "subdomain": self.subdomain,
            "failOnCriticalErrors": self.fail_on_critical_errors,
            "failOnMissingTests": self.fail_on_missing_tests,
            "failOnTimeout": self.fail_on_timeout,
            "pollingTimeout": self.polling_timeout,
            "selectiveRerun": self.selective_rerun,
            "publicIds": [],
            "global": {}
        })
    }
}
