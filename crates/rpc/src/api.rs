//! RPC API trait definitions.

use crate::OutputResponse;
use alloy_primitives::B256;
use jsonrpsee::{core::RpcResult, proc_macros::rpc};
use kanvas_genesis::RollupConfig;
use kanvas_protocol::SyncStatus;

/// The `kanvas` namespace: read-only views of the rollup state.
#[rpc(server, namespace = "kanvas")]
pub trait RollupNodeApi {
    /// Returns the L2 output root and its proof material at the given block.
    #[method(name = "outputAtBlock")]
    async fn output_at_block(&self, block_number: u64) -> RpcResult<OutputResponse>;

    /// Returns the node's view of both chains.
    #[method(name = "syncStatus")]
    async fn sync_status(&self) -> RpcResult<SyncStatus>;

    /// Returns the immutable rollup configuration.
    #[method(name = "rollupConfig")]
    async fn rollup_config(&self) -> RpcResult<RollupConfig>;

    /// Returns the node version as `<semver>-<meta>`.
    #[method(name = "version")]
    async fn version(&self) -> RpcResult<String>;
}

/// The `admin` namespace: control over derivation and the proposer. Only
/// served when explicitly enabled.
#[rpc(server, namespace = "admin")]
pub trait AdminApi {
    /// Resets the derivation pipeline and engine forkchoice to the safe head.
    #[method(name = "resetDerivationPipeline")]
    async fn reset_derivation_pipeline(&self) -> RpcResult<()>;

    /// Starts the proposer on top of the given unsafe head.
    #[method(name = "startProposer")]
    async fn start_proposer(&self, block_hash: B256) -> RpcResult<()>;

    /// Stops the proposer, returning the last proposed unsafe head.
    #[method(name = "stopProposer")]
    async fn stop_proposer(&self) -> RpcResult<B256>;
}
