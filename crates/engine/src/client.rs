//! The engine API capability trait.

use alloy_rpc_types_engine::{ExecutionPayloadV1, ForkchoiceState, ForkchoiceUpdated, PayloadId, PayloadStatus};
use async_trait::async_trait;
use kanvas_protocol::KanvasPayloadAttributes;
use std::fmt::Debug;

/// An error returned by an [`EngineApi`] implementation.
///
/// Implementations classify failures: transport hiccups and timeouts are
/// retried by the caller, while an unavailable engine stops the node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineApiError {
    /// A transport-level failure; retried on the next tick.
    #[error("engine transport error: {0}")]
    Transport(String),
    /// The request timed out; retried on the next tick.
    #[error("engine request timed out")]
    Timeout,
    /// The requested block does not exist.
    #[error("block not found: {0}")]
    BlockNotFound(u64),
    /// The engine is gone; the node cannot continue.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

impl EngineApiError {
    /// Returns whether the error is fatal to the node.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// The slice of the engine and eth APIs the node drives the execution layer
/// through.
#[async_trait]
pub trait EngineApi: Debug + Send + Sync {
    /// Calls `engine_forkchoiceUpdated`, optionally starting a build job with
    /// the given attributes.
    async fn forkchoice_updated(
        &self,
        state: ForkchoiceState,
        attributes: Option<KanvasPayloadAttributes>,
    ) -> Result<ForkchoiceUpdated, EngineApiError>;

    /// Calls `engine_getPayload` for a previously started build job.
    async fn get_payload(&self, payload_id: PayloadId)
        -> Result<ExecutionPayloadV1, EngineApiError>;

    /// Calls `engine_newPayload` to execute a payload.
    async fn new_payload(&self, payload: ExecutionPayloadV1)
        -> Result<PayloadStatus, EngineApiError>;

    /// Fetches the canonical payload at the given L2 block number.
    async fn payload_by_number(&self, number: u64)
        -> Result<ExecutionPayloadV1, EngineApiError>;
}
