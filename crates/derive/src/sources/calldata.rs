//! Calldata data source.

use crate::{ChainProvider, DataAvailabilityProvider, PipelineError, PipelineResult};
use alloy_consensus::{transaction::SignerRecoverable, Transaction, TxEnvelope};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use kanvas_protocol::BlockInfo;
use std::collections::VecDeque;

/// A data iterator over the calldata of batcher transactions.
#[derive(Debug, Clone)]
pub struct CalldataSource<CP>
where
    CP: ChainProvider + Send,
{
    /// The chain provider calldata is read through.
    pub chain_provider: CP,
    /// The batch inbox address.
    pub batch_inbox_address: Address,
    /// Calldata of the current block, in transaction order.
    pub calldata: VecDeque<Bytes>,
    /// Whether the current block has been loaded.
    pub open: bool,
}

impl<CP: ChainProvider + Send> CalldataSource<CP> {
    /// Creates a new calldata source.
    pub const fn new(chain_provider: CP, batch_inbox_address: Address) -> Self {
        Self { chain_provider, batch_inbox_address, calldata: VecDeque::new(), open: false }
    }

    /// Loads the calldata of `block_ref` if it has not been loaded yet.
    ///
    /// Only successful transactions sent to the batch inbox by the authorized
    /// batcher contribute data.
    async fn load_calldata(
        &mut self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> Result<(), CP::Error> {
        if self.open {
            return Ok(());
        }

        let (_, txs) =
            self.chain_provider.block_info_and_transactions_by_hash(block_ref.hash).await?;

        // Reverted batcher transactions carry no data. Receipts align with the
        // block's transactions by index; without them every matching
        // transaction is included.
        let statuses = self
            .chain_provider
            .receipts_by_hash(block_ref.hash)
            .await
            .ok()
            .map(|receipts| {
                receipts.iter().map(|r| r.status.coerce_status()).collect::<Vec<_>>()
            });

        self.calldata = txs
            .iter()
            .enumerate()
            .filter_map(|(index, tx)| {
                let (to, data) = match tx {
                    TxEnvelope::Legacy(tx) => (tx.tx().to(), tx.tx().input()),
                    TxEnvelope::Eip2930(tx) => (tx.tx().to(), tx.tx().input()),
                    TxEnvelope::Eip1559(tx) => (tx.tx().to(), tx.tx().input()),
                    _ => return None,
                };
                if to? != self.batch_inbox_address {
                    return None;
                }
                if tx.recover_signer().ok()? != batcher_address {
                    return None;
                }
                if let Some(statuses) = &statuses {
                    if !statuses.get(index).copied().unwrap_or(false) {
                        return None;
                    }
                }
                Some(data.to_vec().into())
            })
            .collect::<VecDeque<_>>();

        self.open = true;
        Ok(())
    }
}

#[async_trait]
impl<CP: ChainProvider + Send> DataAvailabilityProvider for CalldataSource<CP> {
    type Item = Bytes;

    async fn next(
        &mut self,
        block_ref: &BlockInfo,
        batcher_address: Address,
    ) -> PipelineResult<Self::Item> {
        self.load_calldata(block_ref, batcher_address).await.map_err(Into::into)?;
        self.calldata.pop_front().ok_or(PipelineError::Eof.temp())
    }

    fn clear(&mut self) {
        self.calldata.clear();
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::PipelineErrorKind, test_utils::TestChainProvider};
    use alloy_consensus::{Receipt, Signed, TxEip1559, TxLegacy};
    use alloy_primitives::{address, Signature, TxKind};

    fn test_legacy_tx(to: Address) -> TxEnvelope {
        TxEnvelope::Legacy(Signed::new_unchecked(
            TxLegacy {
                to: TxKind::Call(to),
                input: Bytes::from_static(&[0x00, 0x01]),
                ..Default::default()
            },
            Signature::test_signature(),
            Default::default(),
        ))
    }

    fn test_eip1559_tx(to: Address) -> TxEnvelope {
        TxEnvelope::Eip1559(Signed::new_unchecked(
            TxEip1559 {
                to: TxKind::Call(to),
                input: Bytes::from_static(&[0x00, 0x02]),
                ..Default::default()
            },
            Signature::test_signature(),
            Default::default(),
        ))
    }

    fn default_test_source() -> CalldataSource<TestChainProvider> {
        CalldataSource::new(TestChainProvider::default(), Default::default())
    }

    #[tokio::test]
    async fn test_clear_calldata() {
        let mut source = default_test_source();
        source.open = true;
        source.calldata.push_back(Bytes::default());
        source.clear();
        assert!(source.calldata.is_empty());
        assert!(!source.open);
    }

    #[tokio::test]
    async fn test_load_calldata_missing_block_errors() {
        let mut source = default_test_source();
        assert!(source.load_calldata(&BlockInfo::default(), Address::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn test_load_calldata_wrong_inbox_filtered() {
        let inbox = address!("0123456789012345678901234567890123456789");
        let mut source = default_test_source();
        source.batch_inbox_address = inbox;
        let block = BlockInfo::default();
        let tx = test_legacy_tx(Address::with_last_byte(0x99));
        source.chain_provider.insert_block_with_transactions(0, block, vec![tx.clone()]);
        source.load_calldata(&block, tx.recover_signer().unwrap()).await.unwrap();
        assert!(source.calldata.is_empty());
        assert!(source.open);
    }

    #[tokio::test]
    async fn test_load_calldata_wrong_signer_filtered() {
        let inbox = address!("0123456789012345678901234567890123456789");
        let mut source = default_test_source();
        source.batch_inbox_address = inbox;
        let block = BlockInfo::default();
        source.chain_provider.insert_block_with_transactions(0, block, vec![test_legacy_tx(inbox)]);
        source.load_calldata(&block, Address::with_last_byte(0x42)).await.unwrap();
        assert!(source.calldata.is_empty());
    }

    #[tokio::test]
    async fn test_load_calldata_valid_txs() {
        let inbox = address!("0123456789012345678901234567890123456789");
        let mut source = default_test_source();
        source.batch_inbox_address = inbox;
        let block = BlockInfo::default();
        let legacy = test_legacy_tx(inbox);
        let eip1559 = test_eip1559_tx(inbox);
        source
            .chain_provider
            .insert_block_with_transactions(0, block, vec![legacy.clone(), eip1559]);
        source.load_calldata(&block, legacy.recover_signer().unwrap()).await.unwrap();
        assert_eq!(source.calldata.len(), 2);
    }

    #[tokio::test]
    async fn test_load_calldata_filters_reverted() {
        let inbox = address!("0123456789012345678901234567890123456789");
        let mut source = default_test_source();
        source.batch_inbox_address = inbox;
        let block = BlockInfo::default();
        let tx = test_legacy_tx(inbox);
        source.chain_provider.insert_block_with_transactions(0, block, vec![tx.clone()]);
        source.chain_provider.insert_receipts(
            block.hash,
            vec![Receipt { status: false.into(), cumulative_gas_used: 21_000, logs: vec![] }],
        );
        source.load_calldata(&block, tx.recover_signer().unwrap()).await.unwrap();
        assert!(source.calldata.is_empty());
    }

    #[tokio::test]
    async fn test_next_eof_when_drained() {
        let inbox = address!("0123456789012345678901234567890123456789");
        let mut source = default_test_source();
        source.batch_inbox_address = inbox;
        let block = BlockInfo::default();
        let tx = test_legacy_tx(inbox);
        source.chain_provider.insert_block_with_transactions(0, block, vec![tx.clone()]);
        let batcher = tx.recover_signer().unwrap();
        assert!(source.next(&block, batcher).await.is_ok());
        assert!(matches!(
            source.next(&block, batcher).await.unwrap_err(),
            PipelineErrorKind::Temporary(PipelineError::Eof)
        ));
    }
}
