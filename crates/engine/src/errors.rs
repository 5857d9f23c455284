//! Engine task errors.

use crate::{EngineApiError, InvalidEngineSyncStateError};
use alloy_primitives::B256;
use kanvas_protocol::FromPayloadError;
use thiserror::Error;

/// How the driver reacts to a failed engine task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineTaskErrorSeverity {
    /// Retry the task on the next tick.
    Temporary,
    /// Reset the pipeline and engine to the safe head.
    Reset,
    /// Stop the driver.
    Critical,
}

/// An error from an engine task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineTaskError {
    /// The engine API failed transiently.
    #[error(transparent)]
    Api(#[from] EngineApiError),
    /// The engine reported an `INVALID` payload status.
    #[error("engine rejected payload: {0}")]
    InvalidPayload(String),
    /// The engine returned a payload status the call never produces.
    #[error("unexpected payload status: {0}")]
    UnexpectedPayloadStatus(String),
    /// A forkchoice update with attributes returned no payload id.
    #[error("forkchoice response is missing the payload id")]
    MissingPayloadId,
    /// An unsafe payload does not extend the current unsafe head.
    #[error("unsafe payload parent {got} does not match unsafe head {expected}")]
    ParentMismatch {
        /// The current unsafe head hash.
        expected: B256,
        /// The payload's parent hash.
        got: B256,
    },
    /// A block could not be reinterpreted as an L2 block ref.
    #[error(transparent)]
    FromPayload(#[from] FromPayloadError),
    /// A block was asked to finalize before it was safe.
    #[error("cannot finalize block {0}: it is ahead of the safe head")]
    BlockNotSafe(u64),
    /// A sync state update violated the head ordering.
    #[error(transparent)]
    InvalidSyncState(#[from] Box<InvalidEngineSyncStateError>),
}

impl EngineTaskError {
    /// Returns the severity of the error.
    pub const fn severity(&self) -> EngineTaskErrorSeverity {
        match self {
            Self::Api(EngineApiError::Unavailable(_)) => EngineTaskErrorSeverity::Critical,
            Self::Api(_) => EngineTaskErrorSeverity::Temporary,
            Self::InvalidPayload(_) => EngineTaskErrorSeverity::Reset,
            Self::UnexpectedPayloadStatus(_) => EngineTaskErrorSeverity::Reset,
            Self::MissingPayloadId => EngineTaskErrorSeverity::Temporary,
            Self::ParentMismatch { .. } => EngineTaskErrorSeverity::Temporary,
            Self::FromPayload(_) => EngineTaskErrorSeverity::Critical,
            Self::BlockNotSafe(_) => EngineTaskErrorSeverity::Temporary,
            Self::InvalidSyncState(_) => EngineTaskErrorSeverity::Critical,
        }
    }
}
