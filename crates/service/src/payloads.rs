//! The unsafe payload queue.

use crate::Metrics;
use kanvas_protocol::{L2BlockInfo, PayloadEnvelope};
use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, HashMap},
};

/// Fixed per-entry accounting overhead, in bytes.
const PAYLOAD_MEM_FIXED_COST: usize = 1024;

/// The default memory budget of the queue.
const DEFAULT_MAX_SIZE: usize = 100_000_000;

#[derive(Debug)]
struct QueuedPayload {
    number: u64,
    envelope: PayloadEnvelope,
    size: usize,
}

impl PartialEq for QueuedPayload {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}
impl Eq for QueuedPayload {}
impl PartialOrd for QueuedPayload {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedPayload {
    fn cmp(&self, other: &Self) -> Ordering {
        self.number.cmp(&other.number)
    }
}

/// A min-heap of gossip-delivered payloads awaiting insertion, ordered by
/// block number and bounded by a memory budget.
///
/// When two payloads claim the same block number, the one whose parent matches
/// the current unsafe head wins; the other is dropped.
#[derive(Debug)]
pub struct UnsafePayloadQueue {
    /// The buffered payloads, smallest block number first.
    heap: BinaryHeap<Reverse<QueuedPayload>>,
    /// Block-number membership, to resolve same-height conflicts.
    entries: HashMap<u64, alloy_primitives::B256>,
    /// The current memory footprint estimate.
    current_size: usize,
    /// The memory budget.
    max_size: usize,
}

impl Default for UnsafePayloadQueue {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

impl UnsafePayloadQueue {
    /// Creates a queue with the given memory budget.
    pub fn new(max_size: usize) -> Self {
        Self { heap: BinaryHeap::new(), entries: HashMap::new(), current_size: 0, max_size }
    }

    /// Returns the number of buffered payloads.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    fn payload_size(envelope: &PayloadEnvelope) -> usize {
        PAYLOAD_MEM_FIXED_COST
            + envelope.payload.extra_data.len()
            + envelope.payload.transactions.iter().map(|tx| tx.len()).sum::<usize>()
    }

    /// Buffers a payload.
    ///
    /// Payloads at or below the unsafe head are dropped outright. A payload
    /// conflicting with a buffered one at the same height replaces it only if
    /// its parent hash matches the current unsafe head. On overflow, the
    /// payloads furthest ahead of the head are evicted first.
    pub fn push(&mut self, envelope: PayloadEnvelope, unsafe_head: L2BlockInfo) {
        let number = envelope.payload.block_number;
        if number <= unsafe_head.block_info.number {
            return;
        }

        if let Some(existing_hash) = self.entries.get(&number) {
            if envelope.payload.parent_hash == unsafe_head.block_info.hash
                && *existing_hash != envelope.payload.block_hash
            {
                // The incoming payload connects to our head; replace the
                // buffered conflict.
                self.remove_number(number);
            } else {
                return;
            }
        }

        let size = Self::payload_size(&envelope);
        self.entries.insert(number, envelope.payload.block_hash);
        self.current_size += size;
        self.heap.push(Reverse(QueuedPayload { number, envelope, size }));

        while self.current_size > self.max_size {
            // Evict from the far end: blocks nearest the head are the ones we
            // can actually apply.
            let Some(furthest) = self.pop_max() else { break };
            warn!(
                target: "payload_queue",
                number = furthest.number,
                "Unsafe payload queue full, dropping furthest payload"
            );
        }

        kanvas_macros::set!(gauge, Metrics::UNSAFE_PAYLOAD_QUEUE_LEN, self.heap.len() as f64);
    }

    /// Pops the next payload if it directly extends `unsafe_head`. Stale
    /// entries below the head are discarded along the way.
    pub fn pop_next(&mut self, unsafe_head: L2BlockInfo) -> Option<PayloadEnvelope> {
        loop {
            let next_number = self.heap.peek()?.0.number;
            if next_number <= unsafe_head.block_info.number {
                let stale = self.heap.pop()?.0;
                self.remove_entry(&stale);
                continue;
            }
            if next_number != unsafe_head.block_info.number + 1 {
                // A gap remains; wait for derivation or gossip to fill it.
                return None;
            }
            let queued = self.heap.pop()?.0;
            self.remove_entry(&queued);
            return Some(queued.envelope);
        }
    }

    fn remove_entry(&mut self, queued: &QueuedPayload) {
        self.entries.remove(&queued.number);
        self.current_size = self.current_size.saturating_sub(queued.size);
    }

    fn remove_number(&mut self, number: u64) {
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        entries.retain(|Reverse(q)| {
            if q.number == number {
                self.current_size = self.current_size.saturating_sub(q.size);
                false
            } else {
                true
            }
        });
        self.heap = entries.into();
        self.entries.remove(&number);
    }

    fn pop_max(&mut self) -> Option<QueuedPayload> {
        let mut entries = std::mem::take(&mut self.heap).into_vec();
        let max_at = entries
            .iter()
            .enumerate()
            .max_by_key(|(_, Reverse(q))| q.number)
            .map(|(i, _)| i)?;
        let Reverse(removed) = entries.swap_remove(max_at);
        self.heap = entries.into();
        self.remove_entry(&removed);
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Signature, B256};
    use alloy_rpc_types_engine::ExecutionPayloadV1;
    use kanvas_protocol::BlockInfo;

    fn envelope(number: u64, parent_hash: B256) -> PayloadEnvelope {
        PayloadEnvelope {
            signature: Signature::test_signature(),
            payload: ExecutionPayloadV1 {
                parent_hash,
                fee_recipient: Default::default(),
                state_root: B256::ZERO,
                receipts_root: B256::ZERO,
                logs_bloom: Default::default(),
                prev_randao: B256::ZERO,
                block_number: number,
                gas_limit: 30_000_000,
                gas_used: 0,
                timestamp: number * 2,
                extra_data: Default::default(),
                base_fee_per_gas: Default::default(),
                block_hash: B256::with_last_byte(number as u8),
                transactions: vec![],
            },
        }
    }

    fn head(number: u64) -> L2BlockInfo {
        L2BlockInfo {
            block_info: BlockInfo {
                number,
                hash: B256::with_last_byte(number as u8),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_pops_in_block_number_order() {
        let mut queue = UnsafePayloadQueue::default();
        let head = head(4);
        queue.push(envelope(6, B256::with_last_byte(5)), head);
        queue.push(envelope(5, head.block_info.hash), head);

        assert_eq!(queue.pop_next(head).unwrap().payload.block_number, 5);
        // 6 does not extend head 4.
        assert!(queue.pop_next(head).is_none());
        assert_eq!(queue.pop_next(self::head(5)).unwrap().payload.block_number, 6);
    }

    #[test]
    fn test_stale_payloads_dropped() {
        let mut queue = UnsafePayloadQueue::default();
        queue.push(envelope(5, B256::ZERO), head(4));
        // The head moved past the queued payload.
        assert!(queue.pop_next(head(6)).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_gap_blocks_pop() {
        let mut queue = UnsafePayloadQueue::default();
        queue.push(envelope(8, B256::ZERO), head(4));
        assert!(queue.pop_next(head(4)).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_same_number_conflict_prefers_head_child() {
        let mut queue = UnsafePayloadQueue::default();
        let head = head(4);
        // A payload not connected to our head arrives first.
        queue.push(envelope(5, B256::with_last_byte(0xEE)), head);
        // The conflicting payload that extends our head replaces it.
        let good = envelope(5, head.block_info.hash);
        queue.push(good.clone(), head);

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_next(head).unwrap(), good);
    }

    #[test]
    fn test_same_number_duplicate_ignored() {
        let mut queue = UnsafePayloadQueue::default();
        let head = head(4);
        let payload = envelope(5, head.block_info.hash);
        queue.push(payload.clone(), head);
        queue.push(payload.clone(), head);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_overflow_evicts_furthest() {
        let mut queue = UnsafePayloadQueue::new(3 * PAYLOAD_MEM_FIXED_COST);
        let head = head(0);
        for number in 1..=4 {
            queue.push(envelope(number, B256::with_last_byte(number as u8 - 1)), head);
        }
        // The budget holds three payloads; the furthest (4) was evicted.
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop_next(head).unwrap().payload.block_number, 1);
    }
}
