//! Batch poller
//!
//! Polls a triggered batch until it leaves `in_progress` or the polling
//! deadline passes. Every batch entry is reported once as received and
//! once as finalized, in batch order.

mod reconcile;

pub use reconcile::{has_result_passed, reconcile, ResultKind, TestResult};

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use synthetics_protocol::{Batch, PollResult, ResultInBatch, Test, Trigger};
use tracing::{debug, info};

use crate::api::{EndpointError, SyntheticsApi};
use crate::errors::{CiErrorCode, RunError};
use crate::reporter::Reporter;
use crate::retry::wait;
use crate::summary::FailurePolicy;
use crate::timeout::PollingDeadline;
use crate::tunnel::TunnelMonitor;

/// Delay between two batch fetches
pub const POLLING_INTERVAL: Duration = Duration::from_millis(5000);

/// Location shown for tests that ran through the tunnel
pub const TUNNELED_LOCATION: &str = "Tunneled";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("[{test_id}] No poll result received for result {result_id}")]
    MissingResult { test_id: String, result_id: String },

    #[error("[{0}] Batch references a test that was not triggered")]
    UnknownTest(String),
}

impl From<PollError> for RunError {
    fn from(error: PollError) -> Self {
        match error {
            PollError::Endpoint(e) => RunError::from_endpoint(CiErrorCode::PollResultsFailed, e),
            other => RunError::critical(CiErrorCode::PollResultsFailed, other.to_string()),
        }
    }
}

/// Settings of one polling run
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub max_polling_timeout: Duration,
    pub policy: FailurePolicy,
    /// App base URL passed to the reporter
    pub base_url: String,
}

/// Maps a datacenter id to what is displayed as the result location
#[derive(Debug, Clone)]
pub struct LocationResolver {
    display_names: HashMap<String, String>,
    tunnel_active: bool,
}

impl LocationResolver {
    pub fn new(trigger: &Trigger, tunnel_active: bool) -> Self {
        let display_names = trigger
            .locations
            .iter()
            .map(|l| (l.name.clone(), l.display_name.clone()))
            .collect();

        Self {
            display_names,
            tunnel_active,
        }
    }

    pub fn resolve(&self, dc_id: &str, test: &Test) -> String {
        if self.tunnel_active && test.is_supported_by_tunnel() {
            return TUNNELED_LOCATION.to_string();
        }

        self.display_names
            .get(dc_id)
            .cloned()
            .unwrap_or_else(|| dc_id.to_string())
    }
}

struct BatchPoller<'a> {
    api: &'a dyn SyntheticsApi,
    batch_id: &'a str,
    /// Waited tests, in trigger order
    tests: &'a [Test],
    tests_by_id: HashMap<&'a str, &'a Test>,
    options: &'a PollOptions,
    reporter: &'a dyn Reporter,
    locations: LocationResolver,
    /// Indices of entries already reported as received
    emitted: HashSet<usize>,
}

impl<'a> BatchPoller<'a> {
    async fn fetch_batch(&self) -> Result<Batch, PollError> {
        self.api
            .get_batch(self.batch_id)
            .await
            .map_err(|e| PollError::from(EndpointError::new("get batch", &e)))
    }

    async fn fetch_poll_results<'b>(
        &self,
        entries: impl Iterator<Item = &'b ResultInBatch>,
    ) -> Result<HashMap<String, PollResult>, PollError> {
        let result_ids: Vec<String> = entries
            .filter(|entry| !entry.is_skipped_by_selective_rerun())
            .filter_map(|entry| entry.result_id.clone())
            .collect();

        if result_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let results = self
            .api
            .poll_results(&result_ids)
            .await
            .map_err(|e| {
                EndpointError::new("poll results", &e).with_subject(&result_ids.join(","))
            })?;

        Ok(results.into_iter().map(|r| (r.result_id.clone(), r)).collect())
    }

    fn test_of(&self, entry: &ResultInBatch) -> Result<&'a Test, PollError> {
        self.tests_by_id
            .get(entry.test_public_id.as_str())
            .copied()
            .ok_or_else(|| PollError::UnknownTest(entry.test_public_id.clone()))
    }

    fn reconcile(
        &self,
        entry: &ResultInBatch,
        poll_results: &mut HashMap<String, PollResult>,
        expired: bool,
    ) -> Result<TestResult, PollError> {
        let test = self.test_of(entry)?;
        reconcile(
            entry,
            test,
            poll_results,
            |dc_id, test| self.locations.resolve(dc_id, test),
            expired,
            &self.options.policy,
        )
    }

    /// Newly settled entries, marked as emitted and reported as received
    fn receive(&mut self, batch: &Batch) -> Vec<usize> {
        let mut received = Vec::new();

        for (index, entry) in batch.results.iter().enumerate() {
            if self.emitted.contains(&index) || !entry.is_settled() {
                continue;
            }
            self.emitted.insert(index);
            self.reporter.result_received(entry);
            received.push(index);
        }

        received
    }

    fn report_waiting_tests(&self, batch: &Batch) {
        let pending: HashSet<&str> = batch
            .results
            .iter()
            .filter(|r| r.status.is_in_progress())
            .map(|r| r.test_public_id.as_str())
            .collect();
        let skipped: HashSet<&str> = batch
            .results
            .iter()
            .filter(|r| r.is_skipped_by_selective_rerun())
            .map(|r| r.test_public_id.as_str())
            .collect();
        let skipped_count = self
            .tests
            .iter()
            .filter(|t| skipped.contains(t.public_id.as_str()))
            .count();

        let waiting: Vec<Test> = self
            .tests
            .iter()
            .filter(|t| pending.contains(t.public_id.as_str()))
            .cloned()
            .collect();

        self.reporter.tests_wait(&waiting, &self.options.base_url, self.batch_id, skipped_count);
    }

    async fn run(mut self) -> Result<Vec<TestResult>, PollError> {
        let deadline = PollingDeadline::new(self.options.max_polling_timeout);

        loop {
            let batch = self.fetch_batch().await?;
            let expired = deadline.is_expired();
            let continue_polling = batch.status.is_in_progress() && !expired;

            let mut to_report = self.receive(&batch);
            let received = to_report.len();
            if !continue_polling {
                to_report.extend((0..batch.results.len()).filter(|i| !self.emitted.contains(i)));
            }
            debug!(
                batch_status = batch.status.as_str(),
                received,
                finalized = to_report.len(),
                expired,
                "polled batch"
            );

            let mut poll_results = if continue_polling {
                self.fetch_poll_results(to_report.iter().map(|&i| &batch.results[i])).await?
            } else {
                self.fetch_poll_results(batch.results.iter()).await?
            };

            for &index in &to_report {
                let result = self.reconcile(&batch.results[index], &mut poll_results, expired)?;
                self.reporter.result_end(&result, &self.options.base_url);
            }

            if !continue_polling {
                if expired {
                    info!(batch_id = self.batch_id, "polling deadline reached");
                }
                return batch
                    .results
                    .iter()
                    .map(|entry| self.reconcile(entry, &mut poll_results, expired))
                    .collect();
            }

            self.report_waiting_tests(&batch);
            wait(POLLING_INTERVAL).await;
        }
    }
}

/// Wait for every result of a triggered batch.
///
/// Returns one reconciled result per entry of the final batch snapshot,
/// in batch order. Transport failures are not retried.
pub async fn wait_for_results(
    api: &dyn SyntheticsApi,
    trigger: &Trigger,
    tests: &[Test],
    options: &PollOptions,
    reporter: &dyn Reporter,
    tunnel: Option<&TunnelMonitor>,
) -> Result<Vec<TestResult>, PollError> {
    reporter.tests_wait(tests, &options.base_url, &trigger.batch_id, 0);

    let poller = BatchPoller {
        api,
        batch_id: &trigger.batch_id,
        tests,
        tests_by_id: tests.iter().map(|t| (t.public_id.as_str(), t)).collect(),
        options,
        reporter,
        locations: LocationResolver::new(trigger, tunnel.is_some()),
        emitted: HashSet::new(),
    };
    let results = poller.run().await?;

    if let Some(tunnel) = tunnel {
        if !tunnel.is_connected() {
            reporter.error("The tunnel has stopped working, this may have affected the results.");
        }
    }

    Ok(results)
}
