//! Sync-start discovery: finding a safe forkchoice to resume from.

use crate::SourceProviderError;
use async_trait::async_trait;
use kanvas_derive::{ChainProvider, L2ChainProvider};
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{BlockInfo, L2BlockInfo};
use thiserror::Error;

/// L2 label reads needed to discover the starting forkchoice.
#[async_trait]
pub trait L2SyncProvider: L2ChainProvider<Error = SourceProviderError> {
    /// Returns the latest L2 block.
    async fn latest_l2_block(&mut self) -> Result<L2BlockInfo, SourceProviderError>;

    /// Returns the finalized L2 block, if the engine has one.
    async fn finalized_l2_block(&mut self) -> Result<Option<L2BlockInfo>, SourceProviderError>;
}

/// The forkchoice to restart derivation from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStart {
    /// The unsafe head: the engine's latest block, kept as-is. If it sits on a
    /// reorged L1 origin, consolidation will rewind it as derivation catches
    /// up.
    pub un_safe: L2BlockInfo,
    /// The safe head: the highest ancestor whose L1 origin is canonical.
    pub safe: L2BlockInfo,
    /// The finalized head.
    pub finalized: L2BlockInfo,
}

/// An error discovering the starting forkchoice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncStartError {
    /// A provider failed.
    #[error(transparent)]
    Provider(#[from] SourceProviderError),
    /// The L2 chain does not connect back to the configured genesis.
    #[error("walked back to L2 block {0} without finding a canonical origin")]
    NoCanonicalAncestor(u64),
}

/// Returns the genesis L2 block ref implied by the rollup config.
pub fn genesis_l2_ref(cfg: &RollupConfig) -> L2BlockInfo {
    L2BlockInfo::new(
        BlockInfo {
            hash: cfg.genesis.l2.hash,
            number: cfg.genesis.l2.number,
            parent_hash: Default::default(),
            timestamp: cfg.genesis.l2_time,
        },
        cfg.genesis.l1,
        0,
    )
}

/// Walks back from the engine's latest block to the highest ancestor whose L1
/// origin is still canonical, producing the `(unsafe, safe, finalized)` triple
/// derivation restarts from.
pub async fn find_starting_forkchoice<L1, L2>(
    cfg: &RollupConfig,
    l1: &mut L1,
    l2: &mut L2,
) -> Result<SyncStart, SyncStartError>
where
    L1: ChainProvider<Error = SourceProviderError> + Send,
    L2: L2SyncProvider + Send,
{
    let genesis = genesis_l2_ref(cfg);
    let latest = l2.latest_l2_block().await?;
    let finalized = l2.finalized_l2_block().await?.unwrap_or(genesis);

    let mut safe = latest;
    loop {
        if safe.block_info.number <= finalized.block_info.number {
            safe = finalized;
            break;
        }
        if safe.block_info.number <= cfg.genesis.l2.number {
            safe = genesis;
            break;
        }

        let canonical = match l1.block_info_by_number(safe.l1_origin.number).await {
            Ok(origin) => origin.hash == safe.l1_origin.hash,
            // An unknown origin (pruned or not yet seen) cannot anchor the
            // safe head.
            Err(SourceProviderError::BlockNotFound(_)) => false,
            Err(err) => return Err(err.into()),
        };
        if canonical {
            break;
        }

        debug!(
            target: "sync_start",
            number = safe.block_info.number,
            origin = safe.l1_origin.number,
            "L1 origin no longer canonical, walking back"
        );
        safe = l2.l2_block_info_by_number(safe.block_info.number - 1).await?;
    }

    info!(
        target: "sync_start",
        un_safe = latest.block_info.number,
        safe = safe.block_info.number,
        finalized = finalized.block_info.number,
        "Found starting forkchoice"
    );
    Ok(SyncStart { un_safe: latest, safe, finalized })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_eips::eip1898::BlockNumHash;
    use alloy_primitives::B256;
    use std::collections::HashMap;

    #[derive(Debug, Default)]
    struct FakeL1 {
        blocks: HashMap<u64, BlockInfo>,
    }

    #[async_trait]
    impl ChainProvider for FakeL1 {
        type Error = SourceProviderError;

        async fn header_by_hash(
            &mut self,
            hash: B256,
        ) -> Result<alloy_consensus::Header, Self::Error> {
            Err(SourceProviderError::HashNotFound(hash))
        }

        async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
            self.blocks.get(&number).copied().ok_or(SourceProviderError::BlockNotFound(number))
        }

        async fn receipts_by_hash(
            &mut self,
            hash: B256,
        ) -> Result<Vec<alloy_consensus::Receipt>, Self::Error> {
            Err(SourceProviderError::HashNotFound(hash))
        }

        async fn block_info_and_transactions_by_hash(
            &mut self,
            hash: B256,
        ) -> Result<(BlockInfo, Vec<alloy_consensus::TxEnvelope>), Self::Error> {
            Err(SourceProviderError::HashNotFound(hash))
        }
    }

    #[derive(Debug, Default)]
    struct FakeL2 {
        blocks: HashMap<u64, L2BlockInfo>,
        latest: u64,
        finalized: Option<u64>,
    }

    #[async_trait]
    impl L2ChainProvider for FakeL2 {
        type Error = SourceProviderError;

        async fn l2_block_info_by_number(
            &mut self,
            number: u64,
        ) -> Result<L2BlockInfo, Self::Error> {
            self.blocks.get(&number).copied().ok_or(SourceProviderError::BlockNotFound(number))
        }
    }

    #[async_trait]
    impl L2SyncProvider for FakeL2 {
        async fn latest_l2_block(&mut self) -> Result<L2BlockInfo, SourceProviderError> {
            let latest = self.latest;
            self.l2_block_info_by_number(latest).await
        }

        async fn finalized_l2_block(
            &mut self,
        ) -> Result<Option<L2BlockInfo>, SourceProviderError> {
            match self.finalized {
                Some(n) => self.l2_block_info_by_number(n).await.map(Some),
                None => Ok(None),
            }
        }
    }

    fn cfg() -> RollupConfig {
        use kanvas_genesis::{ChainGenesis, SystemConfig};
        RollupConfig {
            genesis: ChainGenesis {
                l1: BlockNumHash { number: 0, hash: B256::with_last_byte(0x01) },
                l2: BlockNumHash { number: 0, hash: B256::with_last_byte(0x02) },
                l2_time: 0,
                system_config: SystemConfig {
                    batcher_addr: Default::default(),
                    overhead: Default::default(),
                    scalar: Default::default(),
                    gas_limit: 30_000_000,
                },
            },
            block_time: 2,
            max_sequencer_drift: 600,
            seq_window_size: 100,
            channel_timeout: 10,
            l1_chain_id: 1,
            l2_chain_id: 255,
            batch_inbox_address: Default::default(),
            deposit_contract_address: Default::default(),
            p2p_proposer_address: None,
        }
    }

    fn l1_block(number: u64, tag: u8) -> BlockInfo {
        BlockInfo { hash: B256::with_last_byte(tag), number, ..Default::default() }
    }

    fn l2_block(number: u64, origin: &BlockInfo) -> L2BlockInfo {
        L2BlockInfo::new(
            BlockInfo {
                hash: B256::with_last_byte(0xA0 + number as u8),
                number,
                ..Default::default()
            },
            origin.id(),
            0,
        )
    }

    #[tokio::test]
    async fn test_all_origins_canonical() {
        let config = cfg();
        let origins: Vec<BlockInfo> = (1..=5).map(|n| l1_block(n, 0x10 + n as u8)).collect();
        let mut l1 = FakeL1::default();
        for origin in &origins {
            l1.blocks.insert(origin.number, *origin);
        }
        let mut l2 = FakeL2::default();
        for (i, origin) in origins.iter().enumerate() {
            let n = i as u64 + 1;
            l2.blocks.insert(n, l2_block(n, origin));
        }
        l2.latest = 5;

        let start = find_starting_forkchoice(&config, &mut l1, &mut l2).await.unwrap();
        assert_eq!(start.un_safe.block_info.number, 5);
        assert_eq!(start.safe.block_info.number, 5);
        assert_eq!(start.finalized, genesis_l2_ref(&config));
    }

    #[tokio::test]
    async fn test_reorged_origins_walk_back() {
        let config = cfg();
        let origins: Vec<BlockInfo> = (1..=5).map(|n| l1_block(n, 0x10 + n as u8)).collect();
        let mut l1 = FakeL1::default();
        for origin in &origins {
            l1.blocks.insert(origin.number, *origin);
        }
        // L1 blocks 4 and 5 were replaced.
        l1.blocks.insert(4, l1_block(4, 0xE4));
        l1.blocks.insert(5, l1_block(5, 0xE5));

        let mut l2 = FakeL2::default();
        for (i, origin) in origins.iter().enumerate() {
            let n = i as u64 + 1;
            l2.blocks.insert(n, l2_block(n, origin));
        }
        l2.latest = 5;

        let start = find_starting_forkchoice(&config, &mut l1, &mut l2).await.unwrap();
        // The unsafe head stays; the safe head rewinds to origin 3.
        assert_eq!(start.un_safe.block_info.number, 5);
        assert_eq!(start.safe.block_info.number, 3);
    }
}
