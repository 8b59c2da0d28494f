//! Synthetics CI engine
//!
//! Triggers a batch of synthetic tests from a CI job, polls the batch
//! until every result is final, and turns the results into an exit code.
//!
//! The backend is reached through the [`api::SyntheticsApi`] trait;
//! [`api::HttpApiClient`] talks to the real service and [`mock::MockBackend`]
//! serves scripted responses in-process.

pub mod api;
pub mod config;
pub mod errors;
pub mod metadata;
pub mod mock;
pub mod pipeline;
pub mod poll;
pub mod reporter;
pub mod retry;
pub mod summary;
pub mod timeout;
pub mod trigger;
pub mod tunnel;

pub use api::{ApiError, HttpApiClient, SyntheticsApi};
pub use config::{ConfigError, EffectiveConfig, RunConfig};
pub use errors::{CiErrorCode, RunError};
pub use pipeline::{Pipeline, RunOutcome};
pub use poll::TestResult;
pub use reporter::{MainReporter, Reporter};
pub use summary::{ExitReason, FailurePolicy, Summary};
