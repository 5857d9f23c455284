//! The rollup configuration.

use crate::ChainGenesis;
use alloy_primitives::Address;
use thiserror::Error;

/// The immutable, process-lifetime configuration of a Kanvas rollup.
///
/// Loaded once at startup from a JSON file and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupConfig {
    /// The genesis anchor points.
    pub genesis: ChainGenesis,
    /// The L2 block time, in seconds.
    #[serde(with = "alloy_serde::quantity")]
    pub block_time: u64,
    /// The maximum number of seconds an L2 block timestamp may trail behind its
    /// L1 origin before the proposer is forced to advance the origin.
    #[serde(with = "alloy_serde::quantity")]
    pub max_sequencer_drift: u64,
    /// The number of L1 blocks a batch may be included after its epoch before it
    /// is dropped.
    #[serde(with = "alloy_serde::quantity")]
    pub seq_window_size: u64,
    /// The number of L1 blocks a channel may span before it is pruned.
    #[serde(with = "alloy_serde::quantity")]
    pub channel_timeout: u64,
    /// The L1 chain id.
    #[serde(with = "alloy_serde::quantity")]
    pub l1_chain_id: u64,
    /// The L2 chain id.
    #[serde(with = "alloy_serde::quantity")]
    pub l2_chain_id: u64,
    /// The address batcher transactions are sent to on L1.
    pub batch_inbox_address: Address,
    /// The L1 deposit contract. Deposit events emitted by this address are
    /// derived into L2 deposit transactions.
    pub deposit_contract_address: Address,
    /// The address authorized to sign gossiped unsafe payloads. `None` disables
    /// gossip validation (payloads are ignored rather than rejected).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p2p_proposer_address: Option<Address>,
}

/// An error encountered while validating a [`RollupConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RollupConfigError {
    /// The block time is zero.
    #[error("block time must be non-zero")]
    ZeroBlockTime,
    /// The channel timeout is zero.
    #[error("channel timeout must be non-zero")]
    ZeroChannelTimeout,
    /// The sequencing window is smaller than the channel timeout.
    #[error("sequencing window ({0}) must not be smaller than the channel timeout ({1})")]
    SequencingWindowTooSmall(u64, u64),
    /// A genesis block hash is unset.
    #[error("genesis block hashes must be set")]
    MissingGenesisHash,
    /// The L1 and L2 chain ids are equal.
    #[error("L1 and L2 chain ids must differ")]
    DuplicateChainIds,
}

impl RollupConfig {
    /// Validates the configuration, returning the first violated invariant.
    ///
    /// Confirmation depths are not part of this struct; they are `u64` flags and
    /// cannot be negative by construction. A depth of `0` reads at the L1 head.
    pub fn validate(&self) -> Result<(), RollupConfigError> {
        if self.block_time == 0 {
            return Err(RollupConfigError::ZeroBlockTime);
        }
        if self.channel_timeout == 0 {
            return Err(RollupConfigError::ZeroChannelTimeout);
        }
        if self.seq_window_size < self.channel_timeout {
            return Err(RollupConfigError::SequencingWindowTooSmall(
                self.seq_window_size,
                self.channel_timeout,
            ));
        }
        if self.genesis.l1.hash.is_zero() || self.genesis.l2.hash.is_zero() {
            return Err(RollupConfigError::MissingGenesisHash);
        }
        if self.l1_chain_id == self.l2_chain_id {
            return Err(RollupConfigError::DuplicateChainIds);
        }
        Ok(())
    }

    /// Returns the authorized batcher address.
    pub const fn batcher_address(&self) -> Address {
        self.genesis.system_config.batcher_addr
    }

    /// Returns the L2 gas limit.
    pub const fn gas_limit(&self) -> u64 {
        self.genesis.system_config.gas_limit
    }

    /// Returns the timestamp of the L2 block at `number`, assuming a canonical
    /// chain extending from genesis.
    pub const fn timestamp_at(&self, number: u64) -> u64 {
        self.genesis.l2_time + (number - self.genesis.l2.number) * self.block_time
    }

    /// Returns whether the given L2 block number is the genesis block.
    pub const fn is_genesis(&self, number: u64) -> bool {
        number == self.genesis.l2.number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SystemConfig;
    use alloy_eips::eip1898::BlockNumHash;
    use alloy_primitives::{b256, U256};

    fn test_config() -> RollupConfig {
        RollupConfig {
            genesis: ChainGenesis {
                l1: BlockNumHash {
                    number: 100,
                    hash: b256!("a15ab87a844b1d72112312c6bf0a1a16916a26bf7adbd883553d06fa7ef61b1e"),
                },
                l2: BlockNumHash {
                    number: 0,
                    hash: b256!("dd87e0a0c7c757b25807502cd0fd7a2b2f587af374860e38e5e3ddeaf9f1e0f8"),
                },
                l2_time: 1_676_437_164,
                system_config: SystemConfig {
                    batcher_addr: Address::with_last_byte(0x42),
                    overhead: U256::from(2100u64),
                    scalar: U256::from(1_000_000u64),
                    gas_limit: 30_000_000,
                },
            },
            block_time: 2,
            max_sequencer_drift: 600,
            seq_window_size: 3600,
            channel_timeout: 300,
            l1_chain_id: 1,
            l2_chain_id: 255,
            batch_inbox_address: Address::with_last_byte(0xff),
            deposit_contract_address: Address::with_last_byte(0xee),
            p2p_proposer_address: Some(Address::with_last_byte(0xaa)),
        }
    }

    #[test]
    fn test_valid_config() {
        assert_eq!(test_config().validate(), Ok(()));
    }

    #[test]
    fn test_zero_block_time_rejected() {
        let cfg = RollupConfig { block_time: 0, ..test_config() };
        assert_eq!(cfg.validate(), Err(RollupConfigError::ZeroBlockTime));
    }

    #[test]
    fn test_sequencing_window_smaller_than_channel_timeout_rejected() {
        let cfg = RollupConfig { seq_window_size: 10, ..test_config() };
        assert_eq!(cfg.validate(), Err(RollupConfigError::SequencingWindowTooSmall(10, 300)));
    }

    #[test]
    fn test_duplicate_chain_ids_rejected() {
        let cfg = RollupConfig { l1_chain_id: 255, ..test_config() };
        assert_eq!(cfg.validate(), Err(RollupConfigError::DuplicateChainIds));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let cfg = test_config();
        let raw = serde_json::to_string(&cfg).unwrap();
        let decoded: RollupConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(cfg, decoded);
    }

    #[test]
    fn test_timestamp_at() {
        let cfg = test_config();
        assert_eq!(cfg.timestamp_at(0), cfg.genesis.l2_time);
        assert_eq!(cfg.timestamp_at(5), cfg.genesis.l2_time + 10);
    }
}
