//! The L2 eth-namespace reads backing `kanvas_outputAtBlock`.

use alloy_primitives::{Address, B256};
use alloy_rpc_types_eth::EIP1186AccountProofResponse;
use async_trait::async_trait;
use std::fmt::Debug;

/// An error from the L2 eth client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum L2EthClientError {
    /// The RPC transport failed.
    #[error("rpc error: {0}")]
    Rpc(String),
    /// The block does not exist.
    #[error("block not found: {0}")]
    BlockNotFound(B256),
}

/// The slice of the L2 eth namespace used by the node RPC handlers.
#[async_trait]
pub trait L2EthClient: Debug + Send + Sync {
    /// Returns the state root of the block with the given hash.
    async fn state_root_by_hash(&self, hash: B256) -> Result<B256, L2EthClientError>;

    /// Returns the account proof of `address` at the given block hash.
    async fn get_proof(
        &self,
        address: Address,
        block_hash: B256,
    ) -> Result<EIP1186AccountProofResponse, L2EthClientError>;
}
