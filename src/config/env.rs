//! Environment layer (layer 3)

use serde_json::{Map, Value};
use tracing::warn;

/// String settings read from the environment
const STRING_VARS: &[(&str, &str)] = &[
    ("DATADOG_API_KEY", "apiKey"),
    ("DATADOG_APP_KEY", "appKey"),
    ("DATADOG_SITE", "datadogSite"),
    ("DATADOG_SUBDOMAIN", "subdomain"),
];

/// Boolean settings read from the environment
const BOOL_VARS: &[(&str, &str)] = &[
    ("DATADOG_SYNTHETICS_FAIL_ON_CRITICAL_ERRORS", "failOnCriticalErrors"),
    ("DATADOG_SYNTHETICS_FAIL_ON_MISSING_TESTS", "failOnMissingTests"),
    ("DATADOG_SYNTHETICS_FAIL_ON_TIMEOUT", "failOnTimeout"),
];

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Build the environment layer from a variable lookup.
///
/// Returns `None` when no relevant variable is set. Empty values are
/// ignored; unparsable booleans are ignored with a warning.
pub fn env_layer<F>(lookup: F) -> Option<Value>
where
    F: Fn(&str) -> Option<String>,
{
    let mut layer = Map::new();

    for (var, key) in STRING_VARS {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            layer.insert(key.to_string(), Value::String(value));
        }
    }

    for (var, key) in BOOL_VARS {
        let Some(raw) = lookup(var).filter(|v| !v.is_empty()) else {
            continue;
        };
        match parse_bool(&raw) {
            Some(value) => {
                layer.insert(key.to_string(), Value::Bool(value));
            }
            None => warn!(variable = var, value = %raw, "ignoring invalid boolean"),
        }
    }

    (!layer.is_empty()).then_some(Value::Object(layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_empty_environment() {
        assert!(env_layer(lookup(&[])).is_none());
    }

    #[test]
    fn test_reads_keys_and_flags() {
        let layer = env_layer(lookup(&[
            ("DATADOG_API_KEY", "api"),
            ("DATADOG_SITE", "datadoghq.eu"),
            ("DATADOG_SYNTHETICS_FAIL_ON_TIMEOUT", "false"),
            ("DATADOG_SYNTHETICS_FAIL_ON_CRITICAL_ERRORS", "1"),
        ]))
        .unwrap();

        assert_eq!(layer["apiKey"], "api");
        assert_eq!(layer["datadogSite"], "datadoghq.eu");
        assert_eq!(layer["failOnTimeout"], false);
        assert_eq!(layer["failOnCriticalErrors"], true);
    }

    #[test]
    fn test_invalid_bool_ignored() {
        let layer = env_layer(lookup(&[
            ("DATADOG_APP_KEY", "app"),
            ("DATADOG_SYNTHETICS_FAIL_ON_MISSING_TESTS", "sometimes"),
        ]))
        .unwrap();

        assert_eq!(layer["appKey"], "app");
        assert!(layer.get("failOnMissingTests").is_none());
    }
}
