//! Test fixtures for gossip validation.

use crate::{Network, NetworkError};
use alloy_eips::eip1898::BlockNumHash;
use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types_engine::ExecutionPayloadV1;
use async_trait::async_trait;
use kanvas_genesis::{ChainGenesis, RollupConfig, SystemConfig};
use std::sync::Mutex;

/// A rollup config for gossip tests.
pub fn test_rollup_config() -> RollupConfig {
    RollupConfig {
        genesis: ChainGenesis {
            l1: BlockNumHash { number: 0, hash: B256::with_last_byte(0x01) },
            l2: BlockNumHash { number: 0, hash: B256::with_last_byte(0x02) },
            l2_time: 0,
            system_config: SystemConfig {
                batcher_addr: Address::with_last_byte(0x42),
                overhead: U256::from(2100u64),
                scalar: U256::from(1_000_000u64),
                gas_limit: 30_000_000,
            },
        },
        block_time: 2,
        max_sequencer_drift: 600,
        seq_window_size: 100,
        channel_timeout: 10,
        l1_chain_id: 1,
        l2_chain_id: 255,
        batch_inbox_address: Address::with_last_byte(0xff),
        deposit_contract_address: Address::with_last_byte(0xee),
        p2p_proposer_address: Some(Address::with_last_byte(0xaa)),
    }
}

/// A minimal execution payload for signing tests.
pub fn test_payload() -> ExecutionPayloadV1 {
    ExecutionPayloadV1 {
        parent_hash: B256::with_last_byte(0x01),
        fee_recipient: Address::with_last_byte(0x02),
        state_root: B256::with_last_byte(0x03),
        receipts_root: B256::with_last_byte(0x04),
        logs_bloom: Default::default(),
        prev_randao: B256::with_last_byte(0x05),
        block_number: 7,
        gas_limit: 30_000_000,
        gas_used: 0,
        timestamp: 14,
        extra_data: Default::default(),
        base_fee_per_gas: U256::from(7u64),
        block_hash: B256::with_last_byte(0x06),
        transactions: vec![],
    }
}

/// A [`Network`] that records published payloads.
#[derive(Debug, Default)]
pub struct TestNetwork {
    /// The payloads published so far.
    pub published: Mutex<Vec<ExecutionPayloadV1>>,
    /// Whether publishing fails.
    pub fail: bool,
}

impl TestNetwork {
    /// Creates a network whose publishes fail.
    pub fn failing() -> Self {
        Self { published: Mutex::new(Vec::new()), fail: true }
    }

    /// Returns the number of published payloads.
    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for TestNetwork {
    async fn publish_l2_payload(&self, payload: ExecutionPayloadV1) -> Result<(), NetworkError> {
        if self.fail {
            return Err(NetworkError::PublishFailed("test network failure".to_string()));
        }
        self.published.lock().unwrap().push(payload);
        Ok(())
    }
}
