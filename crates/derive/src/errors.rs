//! The pipeline error taxonomy.
//!
//! Leaf errors are tagged with one of three kinds, which drive how the caller
//! reacts: temporary errors are retried on the next tick, reset errors restart
//! the pipeline from the safe head, and critical errors stop the driver.

use alloy_primitives::B256;
use kanvas_protocol::{BatchDecodingError, DepositError};
use thiserror::Error;

/// A result whose error is a kind-tagged [`PipelineErrorKind`].
pub type PipelineResult<T> = Result<T, PipelineErrorKind>;

/// A kind-tagged pipeline error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineErrorKind {
    /// Retried silently on the next tick.
    #[error("temporary: {0}")]
    Temporary(#[source] PipelineError),
    /// The pipeline must re-open from a known-good L2 ref.
    #[error("reset required: {0}")]
    Reset(#[from] ResetError),
    /// Propagated out of the driver; the process exits non-zero.
    #[error("critical: {0}")]
    Critical(#[source] PipelineError),
}

/// A pipeline stage error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The current data source is exhausted; the origin must advance before
    /// more data appears.
    #[error("data source exhausted")]
    Eof,
    /// A stage has buffered data but cannot emit yet; step again.
    #[error("not enough data")]
    NotEnoughData,
    /// A stage was used before its origin was set.
    #[error("missing L1 origin")]
    MissingOrigin,
    /// A provider failed to answer.
    #[error("provider error: {0}")]
    Provider(String),
    /// Deposit derivation from L1 receipts failed.
    #[error("failed to derive deposits: {0}")]
    BadDeposits(#[from] DepositError),
    /// The attributes queue produced attributes that disagree with the batch.
    #[error("attributes timestamp {0} does not match batch timestamp {1}")]
    AttributesTimestampMismatch(u64, u64),
}

impl PipelineError {
    /// Wraps the error as [`PipelineErrorKind::Temporary`].
    pub const fn temp(self) -> PipelineErrorKind {
        PipelineErrorKind::Temporary(self)
    }

    /// Wraps the error as [`PipelineErrorKind::Critical`].
    pub const fn crit(self) -> PipelineErrorKind {
        PipelineErrorKind::Critical(self)
    }
}

/// An error requiring the pipeline to reset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResetError {
    /// The L1 chain reorganized under the pipeline.
    #[error("L1 reorg detected: expected parent {0}, got {1}")]
    ReorgDetected(B256, B256),
    /// The next block timestamp precedes its L1 origin timestamp.
    #[error("block timestamp {0} precedes L1 origin timestamp {1}")]
    TimestampUnderflow(u64, u64),
    /// The next block timestamp exceeds the sequencer drift window.
    #[error("block timestamp {0} exceeds the drift window ending at {1}")]
    TimestampDrift(u64, u64),
    /// A ready channel failed to decompress or decode.
    #[error("malformed channel: {0}")]
    MalformedChannel(#[from] BatchDecodingError),
    /// Attributes were requested for an epoch that is neither the parent's
    /// origin nor its direct child.
    #[error("epoch {0} is not the parent origin {1} or its child")]
    NonContiguousEpoch(u64, u64),
}

impl ResetError {
    /// Wraps the error as [`PipelineErrorKind::Reset`].
    pub const fn reset(self) -> PipelineErrorKind {
        PipelineErrorKind::Reset(self)
    }
}
