//! Trigger-set builder
//!
//! Resolves every requested test against the backend, applies local
//! overrides and the execution-rule policy, and produces the payloads to
//! submit plus the tests to wait for.

mod mobile;
mod overrides;
mod rules;

pub use mobile::{override_mobile_applications, MobileTarget, UploadKey, UploadedApplications};
pub use overrides::{get_overridden_config, render_template};
pub use rules::{get_execution_rule, get_strictest_execution_rule, resolve_execution_rule};

use std::collections::HashMap;

use futures::future::join_all;
use synthetics_protocol::{
    normalize_public_id, BatchOptions, ExecutionRule, Metadata, Payload, Test, TestPayload,
    Trigger, TunnelInfo, UserConfigOverride, MAX_TESTS_TO_TRIGGER,
};
use tracing::{debug, warn};

use crate::api::{ApiError, EndpointError, MobileAppUploader, SyntheticsApi};
use crate::errors::{CiErrorCode, RunError};
use crate::reporter::Reporter;
use crate::summary::Summary;

/// One test the user asked to run
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerConfig {
    /// Public id, or a URL ending with one
    pub id: String,
    pub config: UserConfigOverride,
    pub suite: Option<String>,
}

impl TriggerConfig {
    pub fn new(id: impl Into<String>, config: UserConfigOverride) -> Self {
        Self {
            id: id.into(),
            config,
            suite: None,
        }
    }

    pub fn with_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }
}

/// How the trigger set is built
#[derive(Debug, Clone, Default)]
pub struct TriggerOptions {
    /// Ids came from a search query
    pub from_search: bool,
    pub fail_on_missing_tests: bool,
    /// Attached to every payload when set
    pub tunnel: Option<TunnelInfo>,
    /// Values for `{{ NAME }}` tokens in `startUrl`
    pub variables: HashMap<String, String>,
}

/// Output of the builder
#[derive(Debug, Clone)]
pub struct TestsToTrigger {
    /// Tests to wait for, in request order
    pub tests: Vec<Test>,
    /// Payloads to submit, skipped tests included
    pub payloads: Vec<TestPayload>,
    pub initial_summary: Summary,
}

/// A resolved test, in request order
enum Planned<'a> {
    /// Submitted but not waited for
    Skipped(TestPayload),
    Waited {
        test: Test,
        config: &'a UserConfigOverride,
        payload: TestPayload,
    },
}

/// Result of fetching one requested test
enum Fetched {
    Found(Test),
    NotFound { public_id: String, message: String },
}

async fn fetch_test(
    api: &dyn SyntheticsApi,
    trigger_config: &TriggerConfig,
) -> Result<Fetched, RunError> {
    let public_id = normalize_public_id(&trigger_config.id);

    match api.get_test(&public_id).await {
        Ok(mut test) => {
            test.suite = trigger_config.suite.clone();
            Ok(Fetched::Found(test))
        }
        Err(e) if e.is_not_found() => Ok(Fetched::NotFound {
            message: format!("[{}] Test not found: {}", public_id, not_found_detail(&e)),
            public_id,
        }),
        Err(e) => Err(RunError::from_endpoint(
            CiErrorCode::UnavailableTestConfig,
            EndpointError::new("get test", &e).with_subject(&public_id),
        )),
    }
}

fn not_found_detail(error: &ApiError) -> String {
    match error {
        ApiError::Backend { errors, .. } if !errors.is_empty() => errors.join(", "),
        other => other.to_string(),
    }
}

fn tunnel_not_supported(test: &Test) -> RunError {
    RunError::critical(
        CiErrorCode::TunnelNotSupported,
        format!(
            "The tunnel is only supported with HTTP API tests and Browser tests (public ID: {}, type: {}, sub-type: {}, step sub-types: [{}]).",
            test.public_id,
            test.test_type.as_str(),
            test.subtype.as_deref().unwrap_or("-"),
            test.unsupported_step_subtypes().join(", ")
        ),
    )
}

/// Resolve the requested tests and build the trigger set.
///
/// Test fetches run concurrently; a failed fetch does not stop the others.
/// Results are then reviewed in request order: a missing test is a soft
/// error, any other fetch failure aborts.
pub async fn get_tests_to_trigger(
    api: &dyn SyntheticsApi,
    uploader: Option<&dyn MobileAppUploader>,
    mut trigger_configs: Vec<TriggerConfig>,
    options: &TriggerOptions,
    reporter: &dyn Reporter,
) -> Result<TestsToTrigger, RunError> {
    let mut error_messages = Vec::new();
    let requested = trigger_configs.len();

    if options.from_search && requested > MAX_TESTS_TO_TRIGGER {
        warn!(requested, max = MAX_TESTS_TO_TRIGGER, "truncating search results");
        trigger_configs.truncate(MAX_TESTS_TO_TRIGGER);
        error_messages.push(format!(
            "More than {max} tests returned by search query, only the first {max} were fetched.",
            max = MAX_TESTS_TO_TRIGGER
        ));
    }

    let fetched = join_all(trigger_configs.iter().map(|c| fetch_test(api, c))).await;

    let mut summary = Summary::default();
    let mut planned: Vec<Planned<'_>> = Vec::new();

    for (trigger_config, fetched) in trigger_configs.iter().zip(fetched) {
        let test = match fetched? {
            Fetched::Found(test) => test,
            Fetched::NotFound { public_id, message } => {
                debug!(%public_id, "test not found");
                summary.tests_not_found.insert(public_id);
                error_messages.push(message);
                continue;
            }
        };

        let mut payload = get_overridden_config(
            &test,
            &test.public_id,
            &trigger_config.config,
            &options.variables,
        );
        let execution_rule = get_execution_rule(Some(&test), Some(&trigger_config.config));

        reporter.test_trigger(&test, &test.public_id, execution_rule, &trigger_config.config);

        if execution_rule == ExecutionRule::Skipped {
            summary.skipped += 1;
            if let Some(tunnel) = &options.tunnel {
                payload.base.tunnel = Some(tunnel.clone());
            }
            planned.push(Planned::Skipped(payload));
            continue;
        }

        reporter.test_wait(&test);

        if let Some(tunnel) = &options.tunnel {
            if !test.is_supported_by_tunnel() {
                return Err(tunnel_not_supported(&test));
            }
            payload.base.tunnel = Some(tunnel.clone());
        }

        planned.push(Planned::Waited {
            test,
            config: &trigger_config.config,
            payload,
        });
    }

    {
        let mut targets: Vec<MobileTarget<'_>> = planned
            .iter_mut()
            .filter_map(|entry| match entry {
                Planned::Waited { test, config, payload } => Some(MobileTarget {
                    test: &*test,
                    config: *config,
                    payload,
                }),
                Planned::Skipped(_) => None,
            })
            .collect();
        override_mobile_applications(uploader, &mut targets).await?;
    }

    reporter.init_errors(&error_messages);

    if options.fail_on_missing_tests && !summary.tests_not_found.is_empty() {
        let missing: Vec<&str> = summary.tests_not_found.iter().map(String::as_str).collect();
        return Err(RunError::recoverable(CiErrorCode::MissingTests, missing.join(", ")));
    }

    let waited_count = planned.iter().filter(|p| matches!(p, Planned::Waited { .. })).count();
    if waited_count == 0 {
        return Err(RunError::recoverable(CiErrorCode::NoTestsToRun, "No tests to run"));
    }
    if waited_count > MAX_TESTS_TO_TRIGGER {
        return Err(RunError::critical(
            CiErrorCode::TooManyTestsToTrigger,
            format!(
                "Cannot trigger more than {} tests (received {})",
                MAX_TESTS_TO_TRIGGER,
                trigger_configs.len()
            ),
        ));
    }

    let mut tests = Vec::with_capacity(waited_count);
    let mut payloads = Vec::with_capacity(planned.len());
    for entry in planned {
        match entry {
            Planned::Skipped(payload) => payloads.push(payload),
            Planned::Waited { test, payload, .. } => {
                tests.push(test);
                payloads.push(payload);
            }
        }
    }

    Ok(TestsToTrigger {
        tests,
        payloads,
        initial_summary: summary,
    })
}

/// Submit the trigger set as one batch
pub async fn run_tests(
    api: &dyn SyntheticsApi,
    tests: Vec<TestPayload>,
    selective_rerun: bool,
    metadata: Option<Metadata>,
) -> Result<Trigger, RunError> {
    let ids: Vec<String> = tests.iter().map(|t| t.public_id.clone()).collect();
    let payload = Payload {
        tests,
        options: BatchOptions { selective_rerun },
        metadata,
    };

    api.trigger_tests(&payload).await.map_err(|e| {
        RunError::from_endpoint(
            CiErrorCode::TriggerTestsFailed,
            EndpointError::new("trigger tests", &e).with_subject(&ids.join(",")),
        )
    })
}
