//! Resolved run configuration
//!
//! [`EffectiveConfig`] keeps the typed [`RunConfig`] a run is started with,
//! together with a record of which layers contributed and a copy of the
//! merged settings safe to print (keys and passwords masked).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use synthetics_protocol::UserConfigOverride;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;

pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_ID: &str = "synthetics-ci/effective_config@1";

const MASK: &str = "[REDACTED]";

/// Setting names (lowercased) whose values never leave the process
const MASKED_NAMES: &[&str] = &["apikey", "appkey", "password", "privatekey", "accesskey", "token"];

/// Layer a setting came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Env,
    Cli,
}

/// One contributing layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of the file as read from disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl From<ConfigOrigin> for ConfigSource {
    fn from(origin: ConfigOrigin) -> Self {
        Self {
            origin,
            path: None,
            sha256: None,
        }
    }
}

/// Typed settings of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunConfig {
    pub api_key: String,
    pub app_key: String,
    pub datadog_site: String,
    pub subdomain: String,
    pub fail_on_critical_errors: bool,
    pub fail_on_missing_tests: bool,
    pub fail_on_timeout: bool,
    /// Maximum polling duration in milliseconds
    pub polling_timeout: u64,
    pub selective_rerun: bool,
    pub public_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_search_query: Option<String>,
    /// Override applied to every triggered test
    pub global: UserConfigOverride,
}

impl Default for RunConfig {
    fn default() -> Self {
        let defaults = BuiltinDefaults::default();
        Self {
            api_key: String::new(),
            app_key: String::new(),
            datadog_site: defaults.datadog_site,
            subdomain: defaults.subdomain,
            fail_on_critical_errors: defaults.fail_on_critical_errors,
            fail_on_missing_tests: defaults.fail_on_missing_tests,
            fail_on_timeout: defaults.fail_on_timeout,
            polling_timeout: defaults.polling_timeout,
            selective_rerun: defaults.selective_rerun,
            public_ids: Vec::new(),
            test_search_query: None,
            global: UserConfigOverride::default(),
        }
    }
}

impl RunConfig {
    /// Check the settings a run cannot start without
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.app_key.is_empty() {
            return Err(ConfigError::MissingAppKey);
        }
        if self.polling_timeout == 0 {
            return Err(ConfigError::ValidationError(
                "pollingTimeout must be greater than 0".to_string(),
            ));
        }
        if self.datadog_site.is_empty() {
            return Err(ConfigError::ValidationError("datadogSite must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectiveConfig {
    pub schema_version: u32,
    pub schema_id: String,
    pub created_at: DateTime<Utc>,

    /// Merged settings with secrets masked
    pub settings: Value,

    /// Contributing layers, lowest precedence first
    pub sources: Vec<ConfigSource>,

    /// Dotted paths of the masked settings
    pub masked: Vec<String>,

    #[serde(skip)]
    run: RunConfig,
}

impl EffectiveConfig {
    /// Merge the layers and validate the result.
    ///
    /// A `config_path` that does not exist is skipped; callers decide
    /// whether a missing explicit file is an error.
    pub fn build(
        config_path: Option<&Path>,
        env_layer: Option<Value>,
        cli_layer: Option<Value>,
    ) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];
        let mut sources = vec![ConfigSource::from(ConfigOrigin::Builtin)];

        if let Some(path) = config_path.filter(|p| p.exists()) {
            let (value, sha256) = read_config_file(path)?;
            layers.push(value);
            sources.push(ConfigSource {
                origin: ConfigOrigin::File,
                path: Some(path.display().to_string()),
                sha256: Some(sha256),
            });
        }

        for (layer, origin) in [(env_layer, ConfigOrigin::Env), (cli_layer, ConfigOrigin::Cli)] {
            if let Some(layer) = layer {
                layers.push(layer);
                sources.push(origin.into());
            }
        }

        let mut settings = merge_layers(layers);
        let run: RunConfig = serde_json::from_value(settings.clone())
            .map_err(|e| ConfigError::ParseError(format!("invalid configuration: {}", e)))?;
        run.validate()?;

        let mut masked = Vec::new();
        mask_secrets(&mut settings, &mut Vec::new(), &mut masked);

        Ok(Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            created_at: Utc::now(),
            settings,
            sources,
            masked,
            run,
        })
    }

    /// Typed settings, secrets included
    pub fn run_config(&self) -> &RunConfig {
        &self.run
    }

    /// Printable record of the resolved settings
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Read a `.json` or TOML settings file and hash its bytes
fn read_config_file(path: &Path) -> Result<(Value, String), ConfigError> {
    let bytes = fs::read(path)
        .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
    let sha256 = hex::encode(Sha256::digest(&bytes));

    let text = std::str::from_utf8(&bytes)
        .map_err(|e| ConfigError::ParseError(format!("{} is not UTF-8: {}", path.display(), e)))?;

    let value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(text)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?,
        _ => toml::from_str::<Value>(text)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?,
    };

    Ok((value, sha256))
}

/// Replace secret scalars with [`MASK`], recording their dotted paths
fn mask_secrets(value: &mut Value, path: &mut Vec<String>, masked: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                path.push(key.clone());
                let secret = MASKED_NAMES.contains(&key.to_ascii_lowercase().as_str());
                if secret && !(child.is_object() || child.is_array() || child.is_null()) {
                    *child = Value::String(MASK.to_string());
                    masked.push(path.join("."));
                } else {
                    mask_secrets(child, path, masked);
                }
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter_mut().enumerate() {
                path.push(i.to_string());
                mask_secrets(item, path, masked);
                path.pop();
            }
        }
        _ => {}
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Missing DATADOG_API_KEY")]
    MissingApiKey,

    #[error("Missing DATADOG_APP_KEY")]
    MissingAppKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use synthetics_protocol::ExecutionRule;
    use tempfile::{Builder, NamedTempFile};

    fn keys() -> Value {
        json!({"apiKey": "api-123", "appKey": "app-456"})
    }

    #[test]
    fn test_build_with_defaults_and_keys() {
        let config = EffectiveConfig::build(None, None, Some(keys())).unwrap();
        let run = config.run_config();

        assert_eq!(config.schema_version, SCHEMA_VERSION);
        assert_eq!(run.datadog_site, "datadoghq.com");
        assert_eq!(run.polling_timeout, 1_800_000);
        assert!(run.fail_on_timeout);
        assert!(run.global.is_empty());
    }

    #[test]
    fn test_missing_keys() {
        let result = EffectiveConfig::build(None, None, None);
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));

        let result = EffectiveConfig::build(None, None, Some(json!({"apiKey": "api"})));
        assert!(matches!(result, Err(ConfigError::MissingAppKey)));
    }

    #[test]
    fn test_validation_polling_timeout() {
        let mut cli = keys();
        cli["pollingTimeout"] = json!(0);

        let result = EffectiveConfig::build(None, None, Some(cli));
        assert!(result.unwrap_err().to_string().contains("pollingTimeout"));
    }

    #[test]
    fn test_secrets_are_masked() {
        let mut cli = keys();
        cli["global"] = json!({"basicAuth": {"username": "user", "password": "hunter2"}});

        let config = EffectiveConfig::build(None, None, Some(cli)).unwrap();

        assert_eq!(config.settings["apiKey"], MASK);
        assert_eq!(config.settings["appKey"], MASK);
        assert_eq!(config.settings["global"]["basicAuth"]["password"], MASK);
        assert_eq!(config.settings["global"]["basicAuth"]["username"], "user");
        assert_eq!(config.masked, vec!["apiKey", "appKey", "global.basicAuth.password"]);

        // the typed config keeps the real values
        assert_eq!(config.run_config().api_key, "api-123");
        assert!(!config.to_json().unwrap().contains("api-123"));
        assert!(!config.to_json().unwrap().contains("hunter2"));
    }

    #[test]
    fn test_layer_precedence() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "datadogSite = \"datadoghq.eu\"").unwrap();
        writeln!(temp, "failOnTimeout = false").unwrap();
        writeln!(temp, "[global]").unwrap();
        writeln!(temp, "executionRule = \"non_blocking\"").unwrap();

        let env = json!({
            "datadogSite": "us3.datadoghq.com",
            "apiKey": "env-api",
            "appKey": "env-app"
        });
        let cli = json!({"apiKey": "cli-api"});

        let config = EffectiveConfig::build(Some(temp.path()), Some(env), Some(cli)).unwrap();
        let run = config.run_config();

        assert_eq!(run.datadog_site, "us3.datadoghq.com");
        assert!(!run.fail_on_timeout);
        assert_eq!(run.api_key, "cli-api");
        assert_eq!(run.app_key, "env-app");
        assert_eq!(run.global.execution_rule, Some(ExecutionRule::NonBlocking));
    }

    #[test]
    fn test_json_config_file() {
        let mut temp = Builder::new().suffix(".json").tempfile().unwrap();
        write!(temp, r#"{{"publicIds": ["abc-def-ghi"], "selectiveRerun": true}}"#).unwrap();

        let config = EffectiveConfig::build(Some(temp.path()), None, Some(keys())).unwrap();

        assert_eq!(config.run_config().public_ids, vec!["abc-def-ghi"]);
        assert!(config.run_config().selective_rerun);
    }

    #[test]
    fn test_sources_tracked() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "subdomain = \"myorg\"").unwrap();

        let config =
            EffectiveConfig::build(Some(temp.path()), Some(keys()), Some(json!({}))).unwrap();

        let origins: Vec<_> = config.sources.iter().map(|s| s.origin).collect();
        assert_eq!(
            origins,
            vec![ConfigOrigin::Builtin, ConfigOrigin::File, ConfigOrigin::Env, ConfigOrigin::Cli]
        );
        assert_eq!(config.sources[1].sha256.as_ref().map(|d| d.len()), Some(64));
        assert_eq!(config.run_config().subdomain, "myorg");
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let config = EffectiveConfig::build(
            Some(Path::new("/nonexistent/synthetics-ci.toml")),
            None,
            Some(keys()),
        )
        .unwrap();

        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_invalid_toml() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "datadogSite = ").unwrap();

        let result = EffectiveConfig::build(Some(temp.path()), None, Some(keys()));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
