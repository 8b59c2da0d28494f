//! Reporter sink
//!
//! The engine pushes notifications to a `Reporter` and never reads
//! anything back. Every notification has a no-op default so a listener
//! only implements what it renders. `MainReporter` broadcasts to any
//! number of listeners.

mod links;
mod logging;

pub use links::{
    get_app_base_url, get_batch_url, get_result_duration, get_result_url, DEFAULT_SUBDOMAIN,
};
pub use logging::TracingReporter;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use synthetics_protocol::{
    ExecutionRule, ResultInBatch, SyntheticsOrgSettings, Test, UserConfigOverride,
};

use crate::poll::TestResult;
use crate::summary::Summary;

/// Notifications emitted during a run
pub trait Reporter: Send + Sync {
    /// A test was resolved and will be part of the trigger
    fn test_trigger(
        &self,
        _test: &Test,
        _test_id: &str,
        _execution_rule: ExecutionRule,
        _config: &UserConfigOverride,
    ) {}

    /// A triggered test will be waited for
    fn test_wait(&self, _test: &Test) {}

    /// Polling is still waiting on `tests`
    fn tests_wait(
        &self,
        _tests: &[Test],
        _base_url: &str,
        _batch_id: &str,
        _skipped_count: usize,
    ) {}

    /// A batch entry left `in_progress` (or was skipped by selective rerun)
    fn result_received(&self, _result: &ResultInBatch) {}

    /// A result was fully reconciled
    fn result_end(&self, _result: &TestResult, _base_url: &str) {}

    fn run_end(
        &self,
        _summary: &Summary,
        _base_url: &str,
        _org_settings: Option<&SyntheticsOrgSettings>,
    ) {}

    fn error(&self, _message: &str) {}

    /// Soft errors gathered while building the trigger set
    fn init_errors(&self, _errors: &[String]) {}

    fn report_start(&self, _start_time: DateTime<Utc>) {}

    fn log(&self, _message: &str) {}
}

/// Broadcasts every notification to the registered listeners, in
/// registration order.
#[derive(Clone, Default)]
pub struct MainReporter {
    reporters: Vec<Arc<dyn Reporter>>,
}

impl MainReporter {
    pub fn new(reporters: Vec<Arc<dyn Reporter>>) -> Self {
        Self { reporters }
    }

    pub fn register(&mut self, reporter: Arc<dyn Reporter>) {
        self.reporters.push(reporter);
    }

    pub fn len(&self) -> usize {
        self.reporters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl std::fmt::Debug for MainReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainReporter")
            .field("reporters", &self.reporters.len())
            .finish()
    }
}

impl Reporter for MainReporter {
    fn test_trigger(
        &self,
        test: &Test,
        test_id: &str,
        execution_rule: ExecutionRule,
        config: &UserConfigOverride,
    ) {
        for reporter in &self.reporters {
            reporter.test_trigger(test, test_id, execution_rule, config);
        }
    }

    fn test_wait(&self, test: &Test) {
        for reporter in &self.reporters {
            reporter.test_wait(test);
        }
    }

    fn tests_wait(&self, tests: &[Test], base_url: &str, batch_id: &str, skipped_count: usize) {
        for reporter in &self.reporters {
            reporter.tests_wait(tests, base_url, batch_id, skipped_count);
        }
    }

    fn result_received(&self, result: &ResultInBatch) {
        for reporter in &self.reporters {
            reporter.result_received(result);
        }
    }

    fn result_end(&self, result: &TestResult, base_url: &str) {
        for reporter in &self.reporters {
            reporter.result_end(result, base_url);
        }
    }

    fn run_end(
        &self,
        summary: &Summary,
        base_url: &str,
        org_settings: Option<&SyntheticsOrgSettings>,
    ) {
        for reporter in &self.reporters {
            reporter.run_end(summary, base_url, org_settings);
        }
    }

    fn error(&self, message: &str) {
        for reporter in &self.reporters {
            reporter.error(message);
        }
    }

    fn init_errors(&self, errors: &[String]) {
        for reporter in &self.reporters {
            reporter.init_errors(errors);
        }
    }

    fn report_start(&self, start_time: DateTime<Utc>) {
        for reporter in &self.reporters {
            reporter.report_start(start_time);
        }
    }

    fn log(&self, message: &str) {
        for reporter in &self.reporters {
            reporter.log(message);
        }
    }
}
