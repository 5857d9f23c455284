//! Core protocol types for the Kanvas rollup.
//!
//! This crate defines the data-availability wire formats (frames, channels,
//! batches), deposit transaction derivation, the L1-info system transaction,
//! payload attributes, and the signed payload envelope gossiped between nodes.

#![doc(issue_tracker_base_url = "https://github.com/kanvas-network/kanvas-node/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod block;
pub use block::{BlockInfo, FromPayloadError, L2BlockInfo};

mod sync;
pub use sync::SyncStatus;

mod frame;
pub use frame::{
    Frame, FrameDecodingError, FrameParseError, DERIVATION_VERSION_0, MAX_FRAME_LEN,
};

mod channel;
pub use channel::{Channel, ChannelError, ChannelId, CHANNEL_ID_LENGTH};

mod batch;
pub use batch::{
    BatchDecodingError, BatchReader, BatchValidity, SingleBatch, BATCH_VERSION_0,
    MAX_RLP_BYTES_PER_CHANNEL,
};

mod deposit_tx;
pub use deposit_tx::{TxDeposit, TxDepositDecodingError, DEPOSIT_TX_TYPE};

mod deposits;
pub use deposits::{
    decode_deposit, derive_deposits, DepositError, L1InfoDepositSource, UserDepositSource,
    DEPOSIT_EVENT_ABI, DEPOSIT_EVENT_ABI_HASH, DEPOSIT_EVENT_VERSION_0,
};

mod info;
pub use info::{L1BlockInfoTx, L1InfoDecodingError, DEPOSITOR_ACCOUNT, REGOLITH_SYSTEM_TX_GAS};

mod attributes;
pub use attributes::{KanvasAttributesWithParent, KanvasPayloadAttributes};

mod envelope;
pub use envelope::{PayloadEnvelope, PayloadEnvelopeError, SszDecodingError};
