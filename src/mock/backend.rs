//! In-process synthetics backend

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use synthetics_protocol::{Batch, Payload, PollResult, SyntheticsOrgSettings, Test, Trigger};

use super::failure::{FailureConfig, FailureInjector, Operation};
use super::state::MockState;
use crate::api::{ApiError, MobileAppUploader, SyntheticsApi};

/// Scripted backend shared between a test and the code under test
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a test served by `get_test`
    pub fn with_test(self, test: Test) -> Self {
        self.add_test(test);
        self
    }

    pub fn add_test(&self, test: Test) {
        self.state().tests.insert(test.public_id.clone(), test);
    }

    pub fn set_search_results(&self, query: &str, public_ids: Vec<String>) {
        self.state().search_results.insert(query.to_string(), public_ids);
    }

    pub fn set_batch_id(&self, batch_id: &str) {
        self.state().batch_id = batch_id.to_string();
    }

    /// Snapshots served by successive `get_batch` calls; the last repeats
    pub fn set_batches(&self, batches: Vec<Batch>) {
        let mut state = self.state();
        state.batches = batches;
        state.batch_cursor = 0;
    }

    pub fn add_poll_result(&self, poll_result: PollResult) {
        self.state()
            .poll_results
            .insert(poll_result.result_id.clone(), poll_result);
    }

    pub fn set_org_settings(&self, settings: SyntheticsOrgSettings) {
        self.state().org_settings = settings;
    }

    pub fn inject_failure(&self, op: Operation, config: FailureConfig) {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .inject(op, config);
    }

    /// Make every call to `op` answer with an HTTP error
    pub fn fail(&self, op: Operation, status: u16, message: &str) {
        self.inject_failure(op, FailureConfig::error(status, message));
    }

    pub fn clear_failures(&self) {
        self.failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn triggered_payloads(&self) -> Vec<Payload> {
        self.state().calls.trigger_tests.clone()
    }

    pub fn get_test_calls(&self) -> Vec<String> {
        self.state().calls.get_test.clone()
    }

    pub fn get_batch_calls(&self) -> usize {
        self.state().calls.get_batch.len()
    }

    pub fn poll_calls(&self) -> Vec<Vec<String>> {
        self.state().calls.poll_results.clone()
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.state().calls.uploads.clone()
    }

    /// Apply the injected failure of `op`, if any.
    ///
    /// No lock is held while delaying.
    async fn check_failure(&self, op: Operation) -> Result<(), ApiError> {
        let failure = self
            .failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .check(op);

        let Some(failure) = failure else {
            return Ok(());
        };
        if let Some(delay) = failure.delay {
            tokio::time::sleep(delay).await;
        }

        match failure.to_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SyntheticsApi for MockBackend {
    async fn get_test(&self, public_id: &str) -> Result<Test, ApiError> {
        self.state().calls.get_test.push(public_id.to_string());
        self.check_failure(Operation::GetTest).await?;

        self.state()
            .tests
            .get(public_id)
            .cloned()
            .ok_or_else(|| ApiError::backend(404, "Synthetics test not found"))
    }

    async fn search_tests(&self, query: &str) -> Result<Vec<String>, ApiError> {
        self.state().calls.search_tests.push(query.to_string());
        self.check_failure(Operation::SearchTests).await?;

        Ok(self
            .state()
            .search_results
            .get(query)
            .cloned()
            .unwrap_or_default())
    }

    async fn trigger_tests(&self, payload: &Payload) -> Result<Trigger, ApiError> {
        self.state().calls.trigger_tests.push(payload.clone());
        self.check_failure(Operation::TriggerTests).await?;

        let state = self.state();
        Ok(Trigger {
            batch_id: state.batch_id.clone(),
            locations: state.locations.clone(),
        })
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Batch, ApiError> {
        self.state().calls.get_batch.push(batch_id.to_string());
        self.check_failure(Operation::GetBatch).await?;

        let mut state = self.state();
        if batch_id != state.batch_id {
            return Err(ApiError::backend(404, "Batch not found"));
        }
        state
            .next_batch()
            .ok_or_else(|| ApiError::backend(404, "Batch not found"))
    }

    async fn poll_results(&self, result_ids: &[String]) -> Result<Vec<PollResult>, ApiError> {
        self.state().calls.poll_results.push(result_ids.to_vec());
        self.check_failure(Operation::PollResults).await?;

        let state = self.state();
        Ok(result_ids
            .iter()
            .filter_map(|id| state.poll_results.get(id).cloned())
            .collect())
    }

    async fn get_org_settings(&self) -> Result<SyntheticsOrgSettings, ApiError> {
        self.state().calls.get_org_settings += 1;
        self.check_failure(Operation::GetOrgSettings).await?;

        Ok(self.state().org_settings.clone())
    }
}

#[async_trait]
impl MobileAppUploader for MockBackend {
    async fn upload_application(
        &self,
        application_id: &str,
        file_path: &str,
    ) -> Result<String, ApiError> {
        let upload_count = {
            let mut state = self.state();
            state
                .calls
                .uploads
                .push((application_id.to_string(), file_path.to_string()));
            state.calls.uploads.len()
        };
        self.check_failure(Operation::UploadApplication).await?;

        let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
        Ok(format!("{}-{}", upload_count, file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use synthetics_protocol::{BatchStatus, TestType};

    #[tokio::test]
    async fn test_get_test_not_found() {
        let backend = MockBackend::new().with_test(Test::new("abc-def-ghi", TestType::Api));

        assert!(backend.get_test("abc-def-ghi").await.is_ok());
        assert!(backend.get_test("zzz-zzz-zzz").await.unwrap_err().is_not_found());
        assert_eq!(backend.get_test_calls(), vec!["abc-def-ghi", "zzz-zzz-zzz"]);
    }

    #[tokio::test]
    async fn test_trigger_then_batches() {
        let backend = MockBackend::new();
        backend.set_batches(vec![Batch {
            status: BatchStatus::Passed,
            results: Vec::new(),
        }]);

        let payload = Payload {
            tests: Vec::new(),
            options: Default::default(),
            metadata: None,
        };
        let trigger = backend.trigger_tests(&payload).await.unwrap();

        assert_eq!(backend.get_batch(&trigger.batch_id).await.unwrap().status, BatchStatus::Passed);
        assert!(backend.get_batch("other").await.unwrap_err().is_not_found());
        assert_eq!(backend.triggered_payloads().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_with_delay() {
        let backend = MockBackend::new();
        backend.inject_failure(
            Operation::GetOrgSettings,
            FailureConfig {
                delay: Some(Duration::from_secs(2)),
                ..FailureConfig::error(500, "Internal error")
            }
            .with_fail_count(1),
        );

        let start = tokio::time::Instant::now();
        assert!(backend.get_org_settings().await.unwrap_err().is_server_error());
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(backend.get_org_settings().await.unwrap().on_demand_concurrency_cap, 10);
    }
}
