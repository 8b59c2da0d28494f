//! Reporter that records every notification

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use synthetics_protocol::{
    ExecutionRule, ResultInBatch, SyntheticsOrgSettings, Test, UserConfigOverride,
};

use crate::poll::TestResult;
use crate::reporter::Reporter;
use crate::summary::Summary;

/// One recorded notification
#[derive(Debug, Clone, PartialEq)]
pub enum ReporterEvent {
    TestTrigger { test_id: String, execution_rule: ExecutionRule },
    TestWait { public_id: String },
    TestsWait { public_ids: Vec<String>, batch_id: String, skipped_count: usize },
    ResultReceived(ResultInBatch),
    ResultEnd(Box<TestResult>),
    RunEnd { summary: Summary, has_org_settings: bool },
    Error(String),
    InitErrors(Vec<String>),
    ReportStart(DateTime<Utc>),
    Log(String),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<ReporterEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ReporterEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, event: ReporterEvent) {
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<ReporterEvent> {
        self.lock().clone()
    }

    fn collect<T>(&self, pick: impl Fn(&ReporterEvent) -> Option<T>) -> Vec<T> {
        self.lock().iter().filter_map(pick).collect()
    }

    /// (test id, rule) of every triggered test
    pub fn triggered(&self) -> Vec<(String, ExecutionRule)> {
        self.collect(|e| match e {
            ReporterEvent::TestTrigger {
                test_id,
                execution_rule,
            } => Some((test_id.clone(), *execution_rule)),
            _ => None,
        })
    }

    pub fn waited(&self) -> Vec<String> {
        self.collect(|e| match e {
            ReporterEvent::TestWait { public_id } => Some(public_id.clone()),
            _ => None,
        })
    }

    /// (waited public ids, selective-rerun skips) of every waiting notice
    pub fn tests_waits(&self) -> Vec<(Vec<String>, usize)> {
        self.collect(|e| match e {
            ReporterEvent::TestsWait {
                public_ids, skipped_count, ..
            } => Some((public_ids.clone(), *skipped_count)),
            _ => None,
        })
    }

    pub fn received(&self) -> Vec<ResultInBatch> {
        self.collect(|e| match e {
            ReporterEvent::ResultReceived(entry) => Some(entry.clone()),
            _ => None,
        })
    }

    pub fn result_ends(&self) -> Vec<TestResult> {
        self.collect(|e| match e {
            ReporterEvent::ResultEnd(result) => Some((**result).clone()),
            _ => None,
        })
    }

    pub fn run_ends(&self) -> Vec<Summary> {
        self.collect(|e| match e {
            ReporterEvent::RunEnd { summary, .. } => Some(summary.clone()),
            _ => None,
        })
    }

    pub fn errors(&self) -> Vec<String> {
        self.collect(|e| match e {
            ReporterEvent::Error(message) => Some(message.clone()),
            _ => None,
        })
    }

    /// Soft errors reported while building the trigger set
    pub fn init_error_messages(&self) -> Vec<String> {
        self.collect(|e| match e {
            ReporterEvent::InitErrors(errors) => Some(errors.clone()),
            _ => None,
        })
        .concat()
    }

    pub fn report_starts(&self) -> usize {
        self.collect(|e| matches!(e, ReporterEvent::ReportStart(_)).then_some(())).len()
    }

    pub fn logs(&self) -> Vec<String> {
        self.collect(|e| match e {
            ReporterEvent::Log(message) => Some(message.clone()),
            _ => None,
        })
    }
}

impl Reporter for RecordingReporter {
    fn test_trigger(
        &self,
        _test: &Test,
        test_id: &str,
        execution_rule: ExecutionRule,
        _config: &UserConfigOverride,
    ) {
        self.record(ReporterEvent::TestTrigger {
            test_id: test_id.to_string(),
            execution_rule,
        });
    }

    fn test_wait(&self, test: &Test) {
        self.record(ReporterEvent::TestWait {
            public_id: test.public_id.clone(),
        });
    }

    fn tests_wait(&self, tests: &[Test], _base_url: &str, batch_id: &str, skipped_count: usize) {
        self.record(ReporterEvent::TestsWait {
            public_ids: tests.iter().map(|t| t.public_id.clone()).collect(),
            batch_id: batch_id.to_string(),
            skipped_count,
        });
    }

    fn result_received(&self, result: &ResultInBatch) {
        self.record(ReporterEvent::ResultReceived(result.clone()));
    }

    fn result_end(&self, result: &TestResult, _base_url: &str) {
        self.record(ReporterEvent::ResultEnd(Box::new(result.clone())));
    }

    fn run_end(
        &self,
        summary: &Summary,
        _base_url: &str,
        org_settings: Option<&SyntheticsOrgSettings>,
    ) {
        self.record(ReporterEvent::RunEnd {
            summary: summary.clone(),
            has_org_settings: org_settings.is_some(),
        });
    }

    fn error(&self, message: &str) {
        self.record(ReporterEvent::Error(message.to_string()));
    }

    fn init_errors(&self, errors: &[String]) {
        self.record(ReporterEvent::InitErrors(errors.to_vec()));
    }

    fn report_start(&self, start_time: DateTime<Utc>) {
        self.record(ReporterEvent::ReportStart(start_time));
    }

    fn log(&self, message: &str) {
        self.record(ReporterEvent::Log(message.to_string()));
    }
}
