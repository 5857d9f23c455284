//! The alloy-backed L1 chain provider.

use crate::SourceProviderError;
use alloy_consensus::{Header, Receipt, TxEnvelope};
use alloy_eips::BlockNumberOrTag;
use alloy_primitives::B256;
use alloy_provider::{Provider, RootProvider};
use backon::{ExponentialBuilder, Retryable};
use kanvas_derive::ChainProvider;
use kanvas_protocol::BlockInfo;
use lru::LruCache;
use std::num::NonZeroUsize;

/// The number of header/receipt entries kept in the provider caches.
const PROVIDER_CACHE_SIZE: usize = 1024;

/// Transient RPC failures are retried this many times with jittered backoff.
const RPC_RETRY_ATTEMPTS: usize = 3;

fn retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default().with_max_times(RPC_RETRY_ATTEMPTS).with_jitter()
}

/// A [`ChainProvider`] over an L1 JSON-RPC endpoint, with small LRU caches for
/// immutable-by-hash data.
#[derive(Debug, Clone)]
pub struct AlloyChainProvider {
    /// The underlying provider.
    inner: RootProvider,
    /// Headers by hash.
    header_cache: LruCache<B256, Header>,
    /// Receipts by block hash.
    receipt_cache: LruCache<B256, Vec<Receipt>>,
}

impl AlloyChainProvider {
    /// Creates a new provider.
    pub fn new(inner: RootProvider) -> Self {
        let cap = NonZeroUsize::new(PROVIDER_CACHE_SIZE).expect("non-zero cache size");
        Self { inner, header_cache: LruCache::new(cap), receipt_cache: LruCache::new(cap) }
    }

    /// Fetches a block ref by label (`latest`, `safe`, `finalized`).
    ///
    /// Not part of [`ChainProvider`]: label reads are only meaningful for the
    /// L1 watcher, never for derivation.
    pub async fn block_info_by_label(
        &self,
        label: BlockNumberOrTag,
    ) -> Result<Option<BlockInfo>, SourceProviderError> {
        let provider = self.inner.clone();
        let block = (|| {
            let provider = provider.clone();
            async move { provider.get_block_by_number(label).await }
        })
        .retry(retry_policy())
        .await
        .map_err(|e| SourceProviderError::Rpc(e.to_string()))?;

        Ok(block.map(|b| BlockInfo {
            hash: b.header.hash,
            number: b.header.inner.number,
            parent_hash: b.header.inner.parent_hash,
            timestamp: b.header.inner.timestamp,
        }))
    }
}

#[async_trait::async_trait]
impl ChainProvider for AlloyChainProvider {
    type Error = SourceProviderError;

    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error> {
        if let Some(header) = self.header_cache.get(&hash) {
            return Ok(header.clone());
        }

        let provider = self.inner.clone();
        let block = (|| {
            let provider = provider.clone();
            async move { provider.get_block_by_hash(hash).await }
        })
        .retry(retry_policy())
        .await
        .map_err(|e| SourceProviderError::Rpc(e.to_string()))?
        .ok_or(SourceProviderError::HashNotFound(hash))?;

        let header = block.header.inner.clone();
        self.header_cache.put(hash, header.clone());
        Ok(header)
    }

    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
        let provider = self.inner.clone();
        let block = (|| {
            let provider = provider.clone();
            async move { provider.get_block_by_number(number.into()).await }
        })
        .retry(retry_policy())
        .await
        .map_err(|e| SourceProviderError::Rpc(e.to_string()))?
        .ok_or(SourceProviderError::BlockNotFound(number))?;

        Ok(BlockInfo {
            hash: block.header.hash,
            number: block.header.inner.number,
            parent_hash: block.header.inner.parent_hash,
            timestamp: block.header.inner.timestamp,
        })
    }

    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error> {
        if let Some(receipts) = self.receipt_cache.get(&hash) {
            return Ok(receipts.clone());
        }

        let provider = self.inner.clone();
        let receipts = (|| {
            let provider = provider.clone();
            async move { provider.get_block_receipts(hash.into()).await }
        })
        .retry(retry_policy())
        .await
        .map_err(|e| SourceProviderError::Rpc(e.to_string()))?
        .ok_or(SourceProviderError::HashNotFound(hash))?;

        let receipts = receipts
            .into_iter()
            .map(|r| {
                let inner = r.inner.as_receipt().ok_or_else(|| {
                    SourceProviderError::MalformedBlock("receipt without body".to_string())
                })?;
                Ok(Receipt {
                    status: inner.status,
                    cumulative_gas_used: inner.cumulative_gas_used,
                    logs: inner.logs.iter().map(|l| l.inner.clone()).collect(),
                })
            })
            .collect::<Result<Vec<_>, SourceProviderError>>()?;

        self.receipt_cache.put(hash, receipts.clone());
        Ok(receipts)
    }

    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<TxEnvelope>), Self::Error> {
        let provider = self.inner.clone();
        let block = (|| {
            let provider = provider.clone();
            async move { provider.get_block_by_hash(hash).full().await }
        })
        .retry(retry_policy())
        .await
        .map_err(|e| SourceProviderError::Rpc(e.to_string()))?
        .ok_or(SourceProviderError::HashNotFound(hash))?;

        let info = BlockInfo {
            hash: block.header.hash,
            number: block.header.inner.number,
            parent_hash: block.header.inner.parent_hash,
            timestamp: block.header.inner.timestamp,
        };
        let txs = block
            .transactions
            .into_transactions()
            .map(|tx| tx.into_inner())
            .collect();
        Ok((info, txs))
    }
}
