//! Batch types and the channel batch reader.

use crate::{BlockInfo, L2BlockInfo, DEPOSIT_TX_TYPE};
use alloy_eips::eip1898::BlockNumHash;
use alloy_primitives::{BlockHash, Bytes};
use alloy_rlp::{Decodable, Encodable, RlpDecodable, RlpEncodable};
use kanvas_genesis::RollupConfig;

/// The version byte prefixing every batch inside a channel.
pub const BATCH_VERSION_0: u8 = 0;

/// The maximum number of decompressed bytes read out of a single channel.
pub const MAX_RLP_BYTES_PER_CHANNEL: usize = 10_000_000;

/// The validity of a batch against the current safe head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchValidity {
    /// The batch extends the safe chain and should be processed.
    Accept,
    /// The batch is invalid and is dropped without affecting its siblings.
    Drop,
    /// Not enough L1 information to decide yet; retry later.
    Undecided,
    /// The batch is for a future slot and may apply later.
    Future,
}

impl BatchValidity {
    /// Returns whether the batch is accepted.
    pub const fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }

    /// Returns whether the batch is dropped.
    pub const fn is_drop(&self) -> bool {
        matches!(self, Self::Drop)
    }
}

/// A single batch: one encoded L2 block.
#[derive(Debug, Default, RlpDecodable, RlpEncodable, Clone, PartialEq, Eq)]
pub struct SingleBatch {
    /// The hash of the L2 block this batch builds on.
    pub parent_hash: BlockHash,
    /// The epoch number: the number of the first L1 block of the epoch.
    pub epoch_num: u64,
    /// The hash of the first L1 block of the epoch.
    pub epoch_hash: BlockHash,
    /// The L2 block timestamp.
    pub timestamp: u64,
    /// The L2 transactions of this block, excluding deposits.
    pub transactions: Vec<Bytes>,
}

impl SingleBatch {
    /// Returns the epoch this batch belongs to.
    pub const fn epoch(&self) -> BlockNumHash {
        BlockNumHash { number: self.epoch_num, hash: self.epoch_hash }
    }

    /// Encodes the batch as a versioned channel entry: an RLP string whose
    /// content is the version byte followed by the RLP of the batch.
    pub fn encode_channel_entry(&self, out: &mut Vec<u8>) {
        let mut inner = Vec::new();
        inner.push(BATCH_VERSION_0);
        self.encode(&mut inner);
        Bytes::from(inner).encode(out);
    }

    /// Validates this batch against the safe head and the known window of L1
    /// blocks, `l1_blocks[0]` being the current epoch.
    pub fn check_batch(
        &self,
        cfg: &RollupConfig,
        l1_blocks: &[BlockInfo],
        l2_safe_head: L2BlockInfo,
        inclusion_block: &BlockInfo,
    ) -> BatchValidity {
        if l1_blocks.is_empty() {
            return BatchValidity::Undecided;
        }
        let epoch = l1_blocks[0];

        let next_timestamp = l2_safe_head.block_info.timestamp + cfg.block_time;
        if self.timestamp > next_timestamp {
            return BatchValidity::Future;
        }
        if self.timestamp < next_timestamp {
            return BatchValidity::Drop;
        }

        // The timestamp is the expected slot, so the batch must extend the safe
        // head directly.
        if self.parent_hash != l2_safe_head.block_info.hash {
            return BatchValidity::Drop;
        }

        // Batches included past the sequencing window are dropped.
        if self.epoch_num + cfg.seq_window_size < inclusion_block.number {
            return BatchValidity::Drop;
        }

        // The batch origin is either the current epoch or its direct successor.
        let mut batch_origin = epoch;
        if self.epoch_num < epoch.number {
            return BatchValidity::Drop;
        } else if self.epoch_num == epoch.number + 1 {
            // Without visibility of the next L1 origin the batch cannot be
            // judged yet.
            if l1_blocks.len() < 2 {
                return BatchValidity::Undecided;
            }
            batch_origin = l1_blocks[1];
        } else if self.epoch_num != epoch.number {
            return BatchValidity::Drop;
        }

        if self.epoch_hash != batch_origin.hash {
            return BatchValidity::Drop;
        }
        if self.timestamp < batch_origin.timestamp {
            return BatchValidity::Drop;
        }

        // Enforce the sequencer drift limit.
        let Some(max) = batch_origin.timestamp.checked_add(cfg.max_sequencer_drift) else {
            return BatchValidity::Drop;
        };
        let no_txs = self.transactions.is_empty();
        if self.timestamp > max && !no_txs {
            // Past the drift limit only empty batches are allowed.
            return BatchValidity::Drop;
        }
        if self.timestamp > max && no_txs && epoch.number == batch_origin.number {
            // An empty batch is only acceptable past the drift limit if the next
            // origin could not have been adopted instead.
            if l1_blocks.len() < 2 {
                return BatchValidity::Undecided;
            }
            if self.timestamp >= l1_blocks[1].timestamp {
                return BatchValidity::Drop;
            }
        }

        for tx in &self.transactions {
            if tx.is_empty() {
                return BatchValidity::Drop;
            }
            if tx[0] == DEPOSIT_TX_TYPE {
                return BatchValidity::Drop;
            }
        }

        BatchValidity::Accept
    }
}

/// An error reading batches out of a channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchDecodingError {
    /// The channel data failed to decompress.
    #[error("channel decompression failed")]
    Decompression,
    /// A channel entry failed to RLP-decode.
    #[error("invalid batch rlp: {0}")]
    InvalidRlp(alloy_rlp::Error),
    /// A channel entry is empty.
    #[error("empty batch entry")]
    EmptyEntry,
    /// A channel entry carries an unknown batch version.
    #[error("unsupported batch version: {0}")]
    UnsupportedVersion(u8),
}

/// Reads a stream of [`SingleBatch`]es out of a closed channel's compressed
/// data.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReader {
    /// The decompressed channel data.
    decompressed: Vec<u8>,
    /// The read cursor into `decompressed`.
    cursor: usize,
}

impl BatchReader {
    /// Decompresses the channel data and constructs a reader over it.
    ///
    /// Decompression is capped at [`MAX_RLP_BYTES_PER_CHANNEL`]; channels
    /// claiming more data than that fail to open.
    pub fn new(compressed: &[u8]) -> Result<Self, BatchDecodingError> {
        let decompressed = miniz_oxide::inflate::decompress_to_vec_zlib_with_limit(
            compressed,
            MAX_RLP_BYTES_PER_CHANNEL,
        )
        .map_err(|_| BatchDecodingError::Decompression)?;
        Ok(Self { decompressed, cursor: 0 })
    }

    /// Reads the next batch out of the channel, or `None` once the channel data
    /// is exhausted.
    pub fn next_batch(&mut self) -> Option<Result<SingleBatch, BatchDecodingError>> {
        if self.cursor >= self.decompressed.len() {
            return None;
        }
        let mut buf = &self.decompressed[self.cursor..];
        let before = buf.len();
        let entry = match Bytes::decode(&mut buf) {
            Ok(entry) => entry,
            Err(e) => return Some(Err(BatchDecodingError::InvalidRlp(e))),
        };
        self.cursor += before - buf.len();

        let Some((version, inner)) = entry.split_first() else {
            return Some(Err(BatchDecodingError::EmptyEntry));
        };
        if *version != BATCH_VERSION_0 {
            return Some(Err(BatchDecodingError::UnsupportedVersion(*version)));
        }
        Some(SingleBatch::decode(&mut &inner[..]).map_err(BatchDecodingError::InvalidRlp))
    }
}
