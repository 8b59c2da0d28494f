//! CLI layer (layer 4)

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::warn;

/// Settings given on the command line. Unset fields do not override.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    pub datadog_site: Option<String>,
    pub subdomain: Option<String>,
    pub fail_on_critical_errors: Option<bool>,
    pub fail_on_missing_tests: Option<bool>,
    pub fail_on_timeout: Option<bool>,
    pub polling_timeout: Option<u64>,
    pub selective_rerun: Option<bool>,
    pub public_ids: Vec<String>,
    pub test_search_query: Option<String>,
    /// Raw `KEY=VALUE` strings
    pub variables: Vec<String>,
    pub locations: Vec<String>,
}

impl CliOverrides {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> Value {
        let mut layer = Map::new();

        let strings = [
            ("apiKey", &self.api_key),
            ("appKey", &self.app_key),
            ("datadogSite", &self.datadog_site),
            ("subdomain", &self.subdomain),
            ("testSearchQuery", &self.test_search_query),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                layer.insert(key.to_string(), json!(value));
            }
        }

        let flags = [
            ("failOnCriticalErrors", self.fail_on_critical_errors),
            ("failOnMissingTests", self.fail_on_missing_tests),
            ("failOnTimeout", self.fail_on_timeout),
            ("selectiveRerun", self.selective_rerun),
        ];
        for (key, value) in flags {
            if let Some(value) = value {
                layer.insert(key.to_string(), json!(value));
            }
        }

        if let Some(timeout) = self.polling_timeout {
            layer.insert("pollingTimeout".to_string(), json!(timeout));
        }

        if !self.public_ids.is_empty() {
            layer.insert("publicIds".to_string(), json!(self.public_ids));
        }

        let mut global = Map::new();
        if let Some(variables) = parse_variables_from_cli(&self.variables) {
            global.insert("variables".to_string(), json!(variables));
        }
        if !self.locations.is_empty() {
            global.insert("locations".to_string(), json!(self.locations));
        }
        if !global.is_empty() {
            layer.insert("global".to_string(), Value::Object(global));
        }

        Value::Object(layer)
    }
}

/// Parse `KEY=VALUE` arguments.
///
/// Only the first `=` separates key and value. Arguments without a
/// separator or with an empty name are ignored. Returns `None` when no
/// variable remains.
pub fn parse_variables_from_cli(arguments: &[String]) -> Option<BTreeMap<String, String>> {
    let mut variables = BTreeMap::new();

    for argument in arguments {
        match argument.split_once('=') {
            None => {
                warn!(variable = %argument, "ignoring variable as separator \"=\" was not found")
            }
            Some(("", _)) => {
                warn!(variable = %argument, "ignoring variable as variable name is empty")
            }
            Some((key, value)) => {
                variables.insert(key.to_string(), value.to_string());
            }
        }
    }

    (!variables.is_empty()).then_some(variables)
}
