//! Trigger payload types.
//!
//! `UserConfigOverride` is what a user writes locally for one test;
//! `TestPayload` is what gets submitted for that test once the override
//! has been resolved against the server definition.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rule::ExecutionRule;

/// HTTP basic auth credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Cookie override, either a raw cookie string or a value to append/replace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cookies {
    Raw(String),
    Value {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        append: Option<bool>,
        value: String,
    },
}

/// Retry policy applied by the backend to a failing test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub count: u32,
    pub interval: u64,
}

/// Connection details of an active tunnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TunnelInfo {
    pub host: String,
    pub id: String,
    pub private_key: String,
}

/// How a mobile application version is referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobileReferenceType {
    Latest,
    Version,
    Temporary,
}

/// Mobile application a mobile test runs against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MobileApplication {
    pub application_id: String,
    pub reference_id: String,
    pub reference_type: MobileReferenceType,
}

/// Override fields shared by the local override and the submitted payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseConfigOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_insecure_certificates: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Cookies>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_step_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_redirects: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_url_substitution_regexes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url_substitution_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel: Option<TunnelInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, String>>,
}

/// Local override for one test, as written in a suite file or config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfigOverride {
    #[serde(flatten)]
    pub base: BaseConfigOverride,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_rule: Option<ExecutionRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_application_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_application_version_file_path: Option<String>,
}

impl UserConfigOverride {
    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Server-shaped representation of one test to trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestPayload {
    #[serde(rename = "public_id")]
    pub public_id: String,

    #[serde(flatten)]
    pub base: BaseConfigOverride,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_rule: Option<ExecutionRule>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_application: Option<MobileApplication>,
}

impl TestPayload {
    /// Payload that triggers the test with its server configuration
    pub fn new(public_id: impl Into<String>) -> Self {
        Self {
            public_id: public_id.into(),
            base: BaseConfigOverride::default(),
            execution_rule: None,
            mobile_application: None,
        }
    }
}

/// Batch-wide trigger options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOptions {
    #[serde(default)]
    pub selective_rerun: bool,
}

/// CI pipeline the run originates from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiPipeline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// CI provider name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiProvider {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiMetadata {
    pub pipeline: CiPipeline,
    pub provider: CiProvider,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitCommit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub commit: GitCommit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
}

/// CI and git context attached to a trigger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub ci: CiMetadata,
    pub git: GitMetadata,
}

/// Body of the trigger call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub tests: Vec<TestPayload>,

    #[serde(default)]
    pub options: BatchOptions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_wire_keys() {
        let mut payload = TestPayload::new("abc-def-ghi");
        payload.execution_rule = Some(ExecutionRule::NonBlocking);
        payload.base.start_url = Some("https://example.org".to_string());
        payload.base.allow_insecure_certificates = Some(true);

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "public_id": "abc-def-ghi",
                "startUrl": "https://example.org",
                "allowInsecureCertificates": true,
                "executionRule": "non_blocking"
            })
        );
    }

    #[test]
    fn test_user_override_from_suite_json() {
        let config: UserConfigOverride = serde_json::from_value(json!({
            "executionRule": "skipped",
            "startUrl": "{{ URL }}/login",
            "cookies": {"value": "a=b", "append": true},
            "mobileApplicationVersionFilePath": "app.apk"
        }))
        .unwrap();

        assert_eq!(config.execution_rule, Some(ExecutionRule::Skipped));
        assert_eq!(config.base.start_url.as_deref(), Some("{{ URL }}/login"));
        assert_eq!(
            config.base.cookies,
            Some(Cookies::Value {
                append: Some(true),
                value: "a=b".to_string()
            })
        );
        assert!(!config.is_empty());
        assert!(UserConfigOverride::default().is_empty());
    }
}
