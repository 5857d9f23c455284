//! Test fixtures for the engine controller.

use crate::{EngineApi, EngineApiError, EngineState, EngineSyncStateUpdate};
use alloy_eips::eip1898::BlockNumHash;
use alloy_primitives::{Address, B256, U256};
use alloy_rpc_types_engine::{
    ExecutionPayloadV1, ForkchoiceState, ForkchoiceUpdated, PayloadId, PayloadStatus,
    PayloadStatusEnum,
};
use async_trait::async_trait;
use kanvas_genesis::{ChainGenesis, RollupConfig, SystemConfig};
use kanvas_protocol::{
    BlockInfo, KanvasAttributesWithParent, KanvasPayloadAttributes, L1BlockInfoTx, L2BlockInfo,
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

/// Builds a consistent test world: a rollup config, an engine state with all
/// heads at L2 block 10, attributes for block 11, and the payload those
/// attributes produce.
pub fn test_engine_setup(
) -> (std::sync::Arc<RollupConfig>, EngineState, KanvasAttributesWithParent, ExecutionPayloadV1) {
    let cfg = std::sync::Arc::new(RollupConfig {
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
    });

    let origin = BlockInfo {
        hash: B256::with_last_byte(0x44),
        number: 4,
        parent_hash: B256::with_last_byte(0x43),
        timestamp: 8,
    };
    let head = L2BlockInfo::new(
        BlockInfo {
            hash: B256::with_last_byte(0xA0),
            number: 10,
            parent_hash: B256::with_last_byte(0x9F),
            timestamp: 20,
        },
        origin.id(),
        0,
    );

    let mut state = EngineState::default();
    state.sync_state = state
        .sync_state
        .apply_update(EngineSyncStateUpdate {
            unsafe_head: Some(head),
            safe_head: Some(head),
            finalized_head: Some(head),
        })
        .expect("valid initial state");

    let info = L1BlockInfoTx::new(&cfg.genesis.system_config, &origin, U256::from(7u64), 1);
    let transactions = vec![info.to_deposit_tx().encoded_2718()];

    let prev_randao = B256::with_last_byte(0x77);
    let fee_recipient = Address::with_last_byte(0x06);
    let attributes = KanvasAttributesWithParent::new(
        KanvasPayloadAttributes {
            payload_attributes: alloy_rpc_types_engine::PayloadAttributes {
                timestamp: 22,
                prev_randao,
                suggested_fee_recipient: fee_recipient,
                withdrawals: None,
                parent_beacon_block_root: None,
            },
            transactions: Some(transactions.clone()),
            no_tx_pool: Some(true),
            gas_limit: Some(cfg.gas_limit()),
        },
        head,
    );

    let payload = ExecutionPayloadV1 {
        parent_hash: head.block_info.hash,
        fee_recipient,
        state_root: B256::with_last_byte(0x31),
        receipts_root: B256::with_last_byte(0x32),
        logs_bloom: Default::default(),
        prev_randao,
        block_number: 11,
        gas_limit: cfg.gas_limit(),
        gas_used: 21_000,
        timestamp: 22,
        extra_data: Default::default(),
        base_fee_per_gas: U256::from(7u64),
        block_hash: B256::with_last_byte(0xA1),
        transactions,
    };

    (cfg, state, attributes, payload)
}

/// A deterministic in-memory [`EngineApi`].
#[derive(Debug, Default)]
pub struct TestEngineApi {
    /// Payloads served by `get_payload`, in build order.
    payloads: Mutex<std::collections::VecDeque<ExecutionPayloadV1>>,
    /// Canonical payloads by number, served by `payload_by_number`.
    canonical: Mutex<HashMap<u64, ExecutionPayloadV1>>,
    /// Whether `new_payload` reports `INVALID`.
    invalid_new_payload: bool,
    /// Count of `new_payload` calls.
    new_payload_calls: AtomicUsize,
    /// Count of `forkchoice_updated` calls.
    forkchoice_calls: AtomicUsize,
}

impl TestEngineApi {
    /// Creates a client whose build jobs produce `payload`.
    pub fn with_payload(payload: ExecutionPayloadV1) -> Self {
        Self { payloads: Mutex::new([payload].into()), ..Default::default() }
    }

    /// Queues another payload behind the existing ones.
    pub fn push_payload(&self, payload: ExecutionPayloadV1) {
        self.payloads.lock().unwrap().push_back(payload);
    }

    /// Registers `payload` as the canonical block at its height.
    pub fn with_canonical(self, payload: ExecutionPayloadV1) -> Self {
        self.canonical.lock().unwrap().insert(payload.block_number, payload);
        self
    }

    /// Makes `new_payload` report `INVALID`.
    pub fn invalid_new_payload(mut self) -> Self {
        self.invalid_new_payload = true;
        self
    }

    /// Returns the number of `new_payload` calls observed.
    pub fn new_payload_calls(&self) -> usize {
        self.new_payload_calls.load(Ordering::Relaxed)
    }

    /// Returns the number of `forkchoice_updated` calls observed.
    pub fn forkchoice_calls(&self) -> usize {
        self.forkchoice_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EngineApi for TestEngineApi {
    async fn forkchoice_updated(
        &self,
        _state: ForkchoiceState,
        attributes: Option<KanvasPayloadAttributes>,
    ) -> Result<ForkchoiceUpdated, EngineApiError> {
        self.forkchoice_calls.fetch_add(1, Ordering::Relaxed);
        Ok(ForkchoiceUpdated {
            payload_status: PayloadStatus {
                status: PayloadStatusEnum::Valid,
                latest_valid_hash: None,
            },
            payload_id: attributes.is_some().then(|| PayloadId::new([0x2A; 8])),
        })
    }

    async fn get_payload(
        &self,
        _payload_id: PayloadId,
    ) -> Result<ExecutionPayloadV1, EngineApiError> {
        let mut payloads = self.payloads.lock().unwrap();
        // The last payload is served repeatedly, matching an engine asked for
        // the same job twice.
        if payloads.len() > 1 {
            Ok(payloads.pop_front().expect("non-empty"))
        } else {
            payloads
                .front()
                .cloned()
                .ok_or(EngineApiError::Transport("no payload configured".to_string()))
        }
    }

    async fn new_payload(
        &self,
        _payload: ExecutionPayloadV1,
    ) -> Result<PayloadStatus, EngineApiError> {
        self.new_payload_calls.fetch_add(1, Ordering::Relaxed);
        if self.invalid_new_payload {
            return Ok(PayloadStatus {
                status: PayloadStatusEnum::Invalid {
                    validation_error: "invalid block".to_string(),
                },
                latest_valid_hash: None,
            });
        }
        Ok(PayloadStatus { status: PayloadStatusEnum::Valid, latest_valid_hash: None })
    }

    async fn payload_by_number(
        &self,
        number: u64,
    ) -> Result<ExecutionPayloadV1, EngineApiError> {
        self.canonical
            .lock()
            .unwrap()
            .get(&number)
            .cloned()
            .ok_or(EngineApiError::BlockNotFound(number))
    }
}
