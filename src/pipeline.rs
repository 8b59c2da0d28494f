//! Run orchestration
//!
//! Wires the stages of a CI run together:
//! - Resolve the requested test ids (explicit list or search query)
//! - Build the trigger set
//! - Trigger the batch
//! - Poll until every result is final
//! - Aggregate outcomes and pick the exit code
//!
//! Every failure is converted into a `RunError` at the stage that hit it.
//! `Pipeline::run` never fails: errors end up in the returned outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use synthetics_protocol::{Metadata, SyntheticsOrgSettings};
use tracing::{debug, info, warn};

use crate::api::{EndpointError, MobileAppUploader, SyntheticsApi};
use crate::config::RunConfig;
use crate::errors::{CiErrorCode, RunError};
use crate::poll::{wait_for_results, PollOptions, TestResult};
use crate::reporter::{get_app_base_url, Reporter};
use crate::summary::{
    get_exit_reason, render_results, report_exit_logs, sort_results_by_outcome, ExitReason,
    FailurePolicy, Summary,
};
use crate::trigger::{get_tests_to_trigger, run_tests, TriggerConfig, TriggerOptions};
use crate::tunnel::{Tunnel, TunnelMonitor};

/// Results of an executed batch, before rendering
#[derive(Debug, Clone)]
pub struct ExecutedTests {
    pub results: Vec<TestResult>,
    /// Counters known before polling (skipped, not found) and the batch id
    pub summary: Summary,
}

/// Everything a finished run produced
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Results sorted by outcome
    pub results: Vec<TestResult>,
    pub summary: Summary,
    pub error: Option<RunError>,
    pub exit_reason: ExitReason,
    pub exit_code: i32,
}

/// One CI run against a backend
pub struct Pipeline<'a> {
    config: &'a RunConfig,
    api: &'a dyn SyntheticsApi,
    uploader: Option<&'a dyn MobileAppUploader>,
    reporter: &'a dyn Reporter,
    tunnel: Option<Arc<dyn Tunnel>>,
    variables: HashMap<String, String>,
    metadata: Option<Metadata>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a RunConfig,
        api: &'a dyn SyntheticsApi,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            config,
            api,
            uploader: None,
            reporter,
            tunnel: None,
            variables: HashMap::new(),
            metadata: None,
        }
    }

    /// Uploader for mobile application overrides
    pub fn with_uploader(mut self, uploader: &'a dyn MobileAppUploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Route every test through an established tunnel
    pub fn with_tunnel(mut self, tunnel: Arc<dyn Tunnel>) -> Self {
        self.tunnel = Some(tunnel);
        self
    }

    /// Values for `{{ NAME }}` tokens in start URLs
    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// CI metadata attached to the trigger payload
    pub fn with_metadata(mut self, metadata: Option<Metadata>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        FailurePolicy::from(self.config)
    }

    pub fn base_url(&self) -> String {
        get_app_base_url(&self.config.datadog_site, &self.config.subdomain)
    }

    /// Test ids to request, and whether they came from a search query
    async fn trigger_configs(&self) -> Result<(Vec<TriggerConfig>, bool), RunError> {
        let global = &self.config.global;

        let Some(query) = self.config.test_search_query.as_deref().filter(|q| !q.is_empty()) else {
            let configs = self
                .config
                .public_ids
                .iter()
                .map(|id| TriggerConfig::new(id.clone(), global.clone()))
                .collect();
            return Ok((configs, false));
        };

        let ids = self.api.search_tests(query).await.map_err(|e| {
            RunError::from_endpoint(
                CiErrorCode::UnavailableTestConfig,
                EndpointError::new("search tests", &e).with_subject(query),
            )
        })?;
        debug!(query, found = ids.len(), "searched tests");

        let suite = format!("Query: {}", query);
        let configs = ids
            .into_iter()
            .map(|id| TriggerConfig::new(id, global.clone()).with_suite(suite.clone()))
            .collect();
        Ok((configs, true))
    }

    /// Trigger the requested tests and wait for their results
    pub async fn execute_tests(&self) -> Result<ExecutedTests, RunError> {
        let (trigger_configs, from_search) = self.trigger_configs().await?;
        if trigger_configs.is_empty() {
            return Err(RunError::recoverable(CiErrorCode::NoTestsToRun, "No tests to run"));
        }

        let monitor = self.tunnel.clone().map(TunnelMonitor::spawn);
        let options = TriggerOptions {
            from_search,
            fail_on_missing_tests: self.config.fail_on_missing_tests,
            tunnel: monitor.as_ref().map(|m| m.info().clone()),
            variables: self.variables.clone(),
        };

        let to_trigger = get_tests_to_trigger(
            self.api,
            self.uploader,
            trigger_configs,
            &options,
            self.reporter,
        )
        .await?;

        let trigger = run_tests(
            self.api,
            to_trigger.payloads,
            self.config.selective_rerun,
            self.metadata.clone(),
        )
        .await?;
        info!(batch_id = %trigger.batch_id, tests = to_trigger.tests.len(), "triggered batch");

        let mut summary = to_trigger.initial_summary;
        summary.batch_id = Some(trigger.batch_id.clone());

        let poll_options = PollOptions {
            max_polling_timeout: Duration::from_millis(self.config.polling_timeout),
            policy: self.policy(),
            base_url: self.base_url(),
        };
        let results = wait_for_results(
            self.api,
            &trigger,
            &to_trigger.tests,
            &poll_options,
            self.reporter,
            monitor.as_ref(),
        )
        .await?;

        Ok(ExecutedTests { results, summary })
    }

    /// Org settings, or `None` after reporting why they are unavailable
    async fn org_settings(&self) -> Option<SyntheticsOrgSettings> {
        match self.api.get_org_settings().await {
            Ok(settings) => Some(settings),
            Err(e) => {
                let error = EndpointError::new("get org settings", &e);
                warn!(error = %error, "org settings unavailable");
                self.reporter.error(&format!("Failed to get settings: {}", error.message));
                None
            }
        }
    }

    /// Run the whole command and compute its exit code
    pub async fn run(&self) -> RunOutcome {
        let start_time = Utc::now();
        let policy = self.policy();
        let org_settings = self.org_settings().await;

        let (results, summary, error) = match self.execute_tests().await {
            Ok(ExecutedTests { mut results, mut summary }) => {
                sort_results_by_outcome(&mut results);
                render_results(
                    &results,
                    &mut summary,
                    &policy,
                    self.reporter,
                    &self.base_url(),
                    org_settings.as_ref(),
                    start_time,
                );
                (results, summary, None)
            }
            Err(error) => {
                warn!(code = %error.code(), "run aborted");
                (Vec::new(), Summary::default(), Some(error))
            }
        };

        report_exit_logs(self.reporter, &policy, &results, error.as_ref());
        let exit_reason = get_exit_reason(&policy, &results, error.as_ref());
        info!(exit_reason = %exit_reason, "run finished");

        RunOutcome {
            results,
            summary,
            error,
            exit_code: exit_reason.exit_code(),
            exit_reason,
        }
    }
}

impl std::fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("public_ids", &self.config.public_ids)
            .field("test_search_query", &self.config.test_search_query)
            .field("has_uploader", &self.uploader.is_some())
            .field("has_tunnel", &self.tunnel.is_some())
            .finish()
    }
}
