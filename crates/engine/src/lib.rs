//! The execution-engine controller.
//!
//! Wraps the engine API behind a capability trait and serializes all engine
//! mutations through task structs that operate atomically on the local
//! forkchoice state.

#![doc(issue_tracker_base_url = "https://github.com/kanvas-network/kanvas-node/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

#[macro_use]
extern crate tracing;

mod client;
pub use client::{EngineApi, EngineApiError};

mod state;
pub use state::{
    EngineState, EngineSyncState, EngineSyncStateUpdate, InvalidEngineSyncStateError,
};

mod errors;
pub use errors::{EngineTaskError, EngineTaskErrorSeverity};

mod task;
pub use task::EngineTaskExt;

mod tasks;
pub use tasks::{
    attributes_match, AttributesMatch, BuildTask, ConsolidateTask, FinalizeTask, InsertTask,
    SynchronizeTask,
};

mod engine;
pub use engine::Engine;

mod metrics;
pub use metrics::Metrics;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
