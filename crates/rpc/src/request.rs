//! Requests forwarded from RPC handlers into the driver loop.

use alloy_primitives::B256;
use kanvas_protocol::{L2BlockInfo, SyncStatus};
use tokio::sync::oneshot;

/// A user-facing error from a driver control request.
///
/// These reject the RPC with a structured message and never change internal
/// state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverAdminError {
    /// The proposer is already running.
    #[error("proposer already running")]
    ProposerAlreadyRunning,
    /// The proposer is not running.
    #[error("proposer not running")]
    ProposerNotRunning,
    /// The provided hash does not match the current unsafe head.
    #[error("block hash {got} does not match the current unsafe head {expected}")]
    HeadMismatch {
        /// The current unsafe head hash.
        expected: B256,
        /// The hash supplied by the caller.
        got: B256,
    },
    /// This node is not configured to propose.
    #[error("proposer is not enabled on this node")]
    ProposerNotEnabled,
}

/// A request from an RPC handler to the driver loop.
///
/// Replies travel back over the embedded oneshot sender; a caller that went
/// away simply drops the receiver and the driver's reply is discarded.
#[derive(Debug)]
pub enum DriverRpcRequest {
    /// Requests a copy of the sync status.
    SyncStatus(oneshot::Sender<SyncStatus>),
    /// Requests the canonical L2 block ref at a height, with the sync status
    /// observed atomically alongside it.
    BlockRefWithStatus {
        /// The L2 block number.
        number: u64,
        /// The reply channel; `None` when the block is beyond the unsafe head.
        tx: oneshot::Sender<Option<(L2BlockInfo, SyncStatus)>>,
    },
    /// Forces a derivation pipeline and engine reset.
    ResetPipeline(oneshot::Sender<()>),
    /// Starts the proposer on top of the given unsafe head.
    StartProposer {
        /// The expected unsafe head.
        block_hash: B256,
        /// The reply channel.
        tx: oneshot::Sender<Result<(), DriverAdminError>>,
    },
    /// Stops the proposer.
    StopProposer(oneshot::Sender<Result<B256, DriverAdminError>>),
}
