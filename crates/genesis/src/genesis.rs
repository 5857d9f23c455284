//! Genesis types.

use alloy_eips::eip1898::BlockNumHash;
use alloy_primitives::{Address, U256};

/// The genesis anchor points of the rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainGenesis {
    /// The L1 block the rollup starts from.
    pub l1: BlockNumHash,
    /// The L2 genesis block.
    pub l2: BlockNumHash,
    /// The timestamp of the L2 genesis block.
    #[serde(with = "alloy_serde::quantity")]
    pub l2_time: u64,
    /// The initial system configuration.
    pub system_config: SystemConfig,
}

/// The system configuration active at genesis.
///
/// Kanvas does not derive system-config updates from L1 logs; these values are
/// fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfig {
    /// The authorized batcher address. Batch-inbox transactions from any other
    /// sender are ignored by derivation.
    pub batcher_addr: Address,
    /// The L1 fee overhead, embedded into the L1-info deposit.
    pub overhead: U256,
    /// The L1 fee scalar, embedded into the L1-info deposit.
    pub scalar: U256,
    /// The gas limit for L2 blocks.
    #[serde(with = "alloy_serde::quantity")]
    pub gas_limit: u64,
}
