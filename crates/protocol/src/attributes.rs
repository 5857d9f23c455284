//! Payload attributes types.

use crate::L2BlockInfo;
use alloy_primitives::Bytes;
use alloy_rpc_types_engine::PayloadAttributes;

/// The payload attributes of a Kanvas L2 block: the standard engine-API
/// attributes extended with the transaction list, the tx-pool toggle, and the
/// block gas limit.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KanvasPayloadAttributes {
    /// The inner engine-API payload attributes.
    #[serde(flatten)]
    pub payload_attributes: PayloadAttributes,
    /// The transactions to force-include, deposits first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transactions: Option<Vec<Bytes>>,
    /// When `true`, the engine must not take transactions from its pool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_tx_pool: Option<bool>,
    /// The gas limit of the block.
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt",
        default
    )]
    pub gas_limit: Option<u64>,
}

impl KanvasPayloadAttributes {
    /// Returns the block timestamp carried by the attributes.
    pub const fn timestamp(&self) -> u64 {
        self.payload_attributes.timestamp
    }

    /// Returns whether the attributes carry only deposit transactions.
    pub fn is_deposits_only(&self) -> bool {
        self.transactions.as_ref().is_none_or(|txs| {
            txs.iter().all(|tx| tx.first() == Some(&crate::DEPOSIT_TX_TYPE))
        })
    }
}

/// Payload attributes paired with the L2 block they build on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KanvasAttributesWithParent {
    /// The payload attributes.
    pub inner: KanvasPayloadAttributes,
    /// The parent block the attributes extend.
    pub parent: L2BlockInfo,
}

impl KanvasAttributesWithParent {
    /// Creates a new [`KanvasAttributesWithParent`].
    pub const fn new(inner: KanvasPayloadAttributes, parent: L2BlockInfo) -> Self {
        Self { inner, parent }
    }

    /// Returns the parent block reference.
    pub const fn parent(&self) -> &L2BlockInfo {
        &self.parent
    }

    /// The expected number of the block built from these attributes.
    pub const fn block_number(&self) -> u64 {
        self.parent.block_info.number + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEPOSIT_TX_TYPE;
    use alloy_primitives::{Address, B256};

    fn test_attributes(txs: Option<Vec<Bytes>>) -> KanvasPayloadAttributes {
        KanvasPayloadAttributes {
            payload_attributes: PayloadAttributes {
                timestamp: 1_700_000_002,
                prev_randao: B256::with_last_byte(0x11),
                suggested_fee_recipient: Address::with_last_byte(0x06),
                withdrawals: None,
                parent_beacon_block_root: None,
            },
            transactions: txs,
            no_tx_pool: Some(true),
            gas_limit: Some(30_000_000),
        }
    }

    #[test]
    fn test_is_deposits_only() {
        let deposit = Bytes::from(vec![DEPOSIT_TX_TYPE, 0x01]);
        let user = Bytes::from(vec![0x02, 0x01]);
        assert!(test_attributes(Some(vec![deposit.clone()])).is_deposits_only());
        assert!(!test_attributes(Some(vec![deposit, user])).is_deposits_only());
        assert!(test_attributes(None).is_deposits_only());
    }

    #[test]
    fn test_serde_camel_case_flattened() {
        let attrs = test_attributes(Some(vec![Bytes::from(vec![DEPOSIT_TX_TYPE])]));
        let raw = serde_json::to_value(&attrs).unwrap();
        assert!(raw.get("prevRandao").is_some());
        assert!(raw.get("noTxPool").is_some());
        assert!(raw.get("gasLimit").is_some());
        let decoded: KanvasPayloadAttributes = serde_json::from_value(raw).unwrap();
        assert_eq!(attrs, decoded);
    }
}
