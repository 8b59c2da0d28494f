//! Synthetics CI Protocol Types
//!
//! Defines the JSON shapes exchanged with the synthetics test-execution
//! backend: test definitions, trigger payloads, batch snapshots and
//! detailed poll results.

pub mod batch;
pub mod payload;
pub mod poll;
pub mod public_id;
pub mod rule;
pub mod settings;

pub use batch::{
    Batch, BatchStatus, Location, ResultInBatch, SelectiveRerunDecision, ServerBatch, Trigger,
};
pub use batch::{RerunDecisionKind, RerunReason};
pub use payload::{
    BaseConfigOverride, BasicAuth, BatchOptions, CiMetadata, CiPipeline, CiProvider, Cookies,
    GitCommit, GitMetadata, Metadata, MobileApplication, MobileReferenceType, Payload,
    RetryConfig, TestPayload, TunnelInfo, UserConfigOverride,
};
pub use poll::{PollResult, ResultFailure, ServerResult, Timings};
pub use public_id::{is_public_id, normalize_public_id};
pub use rule::ExecutionRule;
pub use settings::SyntheticsOrgSettings;
pub use test::{CiOptions, Test, TestConfig, TestOptions, TestStep, TestType};

/// Maximum number of tests a single batch may trigger.
pub const MAX_TESTS_TO_TRIGGER: usize = 100;

/// Failure code the backend (and the poller) uses for timed-out results.
pub const TIMEOUT_FAILURE_CODE: &str = "TIMEOUT";
