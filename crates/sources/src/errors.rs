//! Provider errors.

use kanvas_derive::{PipelineError, PipelineErrorKind};
use kanvas_engine::EngineApiError;
use thiserror::Error;

/// An error from an RPC-backed provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceProviderError {
    /// The RPC transport failed.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The requested block does not exist (yet).
    #[error("block not found: {0}")]
    BlockNotFound(u64),
    /// The requested hash does not exist.
    #[error("hash not found: {0}")]
    HashNotFound(alloy_primitives::B256),
    /// A block could not be reinterpreted as an L2 block ref.
    #[error("malformed L2 block: {0}")]
    MalformedBlock(String),
    /// The block is still within the confirmation depth.
    #[error("block {0} is not yet {1} confirmations deep")]
    NotYetConfirmed(u64, u64),
}

impl From<SourceProviderError> for PipelineErrorKind {
    fn from(err: SourceProviderError) -> Self {
        match err {
            // A malformed chain cannot be retried away.
            SourceProviderError::MalformedBlock(e) => PipelineError::Provider(e).crit(),
            err => PipelineError::Provider(err.to_string()).temp(),
        }
    }
}

impl From<SourceProviderError> for EngineApiError {
    fn from(err: SourceProviderError) -> Self {
        match err {
            SourceProviderError::BlockNotFound(n) => Self::BlockNotFound(n),
            err => Self::Transport(err.to_string()),
        }
    }
}
