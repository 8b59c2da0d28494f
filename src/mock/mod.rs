//! Mock backend
//!
//! An in-process implementation of the backend collaborators with
//! scripted responses, failure injection and call recording, plus a
//! reporter that records every notification.
//!
//! # Scripting
//!
//! - tests served by `get_test` (unknown ids answer 404)
//! - search results per query
//! - a sequence of batch snapshots, the last one repeating
//! - poll results by result id
//! - per-operation failures with optional delay and fail count

mod backend;
mod failure;
mod reporter;
mod state;

pub use backend::MockBackend;
pub use failure::{FailureConfig, FailureInjector, Operation};
pub use reporter::{RecordingReporter, ReporterEvent};
pub use state::{CallLog, MockState, MOCK_BATCH_ID};
