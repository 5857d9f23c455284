//! The L1 watcher actor.

use crate::NodeActor;
use alloy_eips::BlockNumberOrTag;
use async_trait::async_trait;
use kanvas_protocol::BlockInfo;
use kanvas_sources::{AlloyChainProvider, SourceProviderError};
use std::{fmt::Debug, time::Duration};
use tokio::{select, sync::mpsc};
use tokio_util::sync::CancellationToken;

/// A change in the L1 chain observed by the watcher, in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L1Signal {
    /// The L1 head changed.
    Head(BlockInfo),
    /// The L1 safe block changed.
    Safe(BlockInfo),
    /// The finalized L1 block changed.
    Finalized(BlockInfo),
}

/// Label-based L1 block reads used by the watcher.
#[async_trait]
pub trait L1BlockRefFetcher: Debug + Send {
    /// Fetches the block ref at the given label.
    async fn block_info_by_label(
        &self,
        label: BlockNumberOrTag,
    ) -> Result<Option<BlockInfo>, SourceProviderError>;
}

#[async_trait]
impl L1BlockRefFetcher for AlloyChainProvider {
    async fn block_info_by_label(
        &self,
        label: BlockNumberOrTag,
    ) -> Result<Option<BlockInfo>, SourceProviderError> {
        Self::block_info_by_label(self, label).await
    }
}

/// Polls L1 for head changes and, at the epoch interval, for safe and
/// finalized changes, pushing them into the driver loop.
///
/// When the driver is saturated the freshest signal is dropped with a warning;
/// the next poll re-delivers strictly newer state, so nothing is lost beyond
/// latency.
#[derive(Debug)]
pub struct L1WatcherActor<F: L1BlockRefFetcher> {
    /// The L1 fetcher.
    fetcher: F,
    /// The head poll interval.
    head_interval: Duration,
    /// The safe/finalized poll interval.
    epoch_interval: Duration,
    /// The signal channel into the driver.
    signal_tx: mpsc::Sender<L1Signal>,
    /// The cancellation token, shared between all tasks.
    cancellation: CancellationToken,
    /// The last head sent, to suppress duplicates.
    last_head: Option<BlockInfo>,
    /// The last safe block sent.
    last_safe: Option<BlockInfo>,
    /// The last finalized block sent.
    last_finalized: Option<BlockInfo>,
}

impl<F: L1BlockRefFetcher> L1WatcherActor<F> {
    /// Creates a new watcher.
    pub fn new(
        fetcher: F,
        head_interval: Duration,
        epoch_interval: Duration,
        signal_tx: mpsc::Sender<L1Signal>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            head_interval,
            epoch_interval,
            signal_tx,
            cancellation,
            last_head: None,
            last_safe: None,
            last_finalized: None,
        }
    }

    fn send_signal(&self, signal: L1Signal) {
        if let Err(err) = self.signal_tx.try_send(signal) {
            warn!(target: "l1_watcher", ?err, "Driver is saturated, dropping L1 signal");
        }
    }

    async fn poll_head(&mut self) {
        match self.fetcher.block_info_by_label(BlockNumberOrTag::Latest).await {
            Ok(Some(head)) if self.last_head != Some(head) => {
                self.last_head = Some(head);
                self.send_signal(L1Signal::Head(head));
            }
            Ok(_) => {}
            Err(err) => warn!(target: "l1_watcher", %err, "Failed to poll L1 head"),
        }
    }

    async fn poll_epoch(&mut self) {
        match self.fetcher.block_info_by_label(BlockNumberOrTag::Safe).await {
            Ok(Some(safe)) if self.last_safe != Some(safe) => {
                self.last_safe = Some(safe);
                self.send_signal(L1Signal::Safe(safe));
            }
            Ok(_) => {}
            Err(err) => warn!(target: "l1_watcher", %err, "Failed to poll L1 safe block"),
        }
        match self.fetcher.block_info_by_label(BlockNumberOrTag::Finalized).await {
            Ok(Some(finalized)) if self.last_finalized != Some(finalized) => {
                self.last_finalized = Some(finalized);
                self.send_signal(L1Signal::Finalized(finalized));
            }
            Ok(_) => {}
            Err(err) => warn!(target: "l1_watcher", %err, "Failed to poll finalized L1 block"),
        }
    }
}

#[async_trait]
impl<F: L1BlockRefFetcher + 'static> NodeActor for L1WatcherActor<F> {
    type Error = std::convert::Infallible;

    async fn start(mut self) -> Result<(), Self::Error> {
        let mut head_ticker = tokio::time::interval(self.head_interval);
        let mut epoch_ticker = tokio::time::interval(self.epoch_interval);

        loop {
            select! {
                biased;

                _ = self.cancellation.cancelled() => {
                    info!(target: "l1_watcher", "Received shutdown signal. Exiting L1 watcher task.");
                    return Ok(());
                }
                _ = head_ticker.tick() => self.poll_head().await,
                _ = epoch_ticker.tick() => self.poll_epoch().await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct FakeFetcher {
        heads: Mutex<Vec<BlockInfo>>,
    }

    #[async_trait]
    impl L1BlockRefFetcher for FakeFetcher {
        async fn block_info_by_label(
            &self,
            label: BlockNumberOrTag,
        ) -> Result<Option<BlockInfo>, SourceProviderError> {
            if label != BlockNumberOrTag::Latest {
                return Ok(None);
            }
            let mut heads = self.heads.lock().unwrap();
            if heads.is_empty() {
                Ok(None)
            } else if heads.len() == 1 {
                Ok(Some(heads[0]))
            } else {
                Ok(Some(heads.remove(0)))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_watcher_emits_deduplicated_heads() {
        let head_a = BlockInfo { number: 1, hash: B256::with_last_byte(1), ..Default::default() };
        let head_b = BlockInfo { number: 2, hash: B256::with_last_byte(2), ..Default::default() };
        let fetcher =
            FakeFetcher { heads: Mutex::new(vec![head_a, head_a, head_b]) };

        let (tx, mut rx) = mpsc::channel(10);
        let cancellation = CancellationToken::new();
        let watcher = L1WatcherActor::new(
            fetcher,
            Duration::from_secs(1),
            Duration::from_secs(60),
            tx,
            cancellation.clone(),
        );
        let handle = tokio::spawn(watcher.start());

        assert_eq!(rx.recv().await, Some(L1Signal::Head(head_a)));
        // The duplicate head is suppressed; the next distinct head arrives.
        assert_eq!(rx.recv().await, Some(L1Signal::Head(head_b)));

        cancellation.cancel();
        handle.await.unwrap().unwrap();
    }
}
