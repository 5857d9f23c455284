//! The engine task abstraction.

use crate::{EngineState, EngineTaskError};
use async_trait::async_trait;

/// An atomic operation over the [`EngineState`].
///
/// Tasks are executed one at a time by the driver and hold exclusive access to
/// the state for their duration. A task that fails leaves the state exactly as
/// its last successful sub-step left it, and is retried or escalated based on
/// the error's severity.
#[async_trait]
pub trait EngineTaskExt {
    /// The task's success output.
    type Output;

    /// Executes the task against the engine state.
    async fn execute(&self, state: &mut EngineState) -> Result<Self::Output, EngineTaskError>;
}
