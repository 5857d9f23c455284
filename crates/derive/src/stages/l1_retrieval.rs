//! The L1 retrieval stage.

use crate::{
    DataAvailabilityProvider, L1RetrievalProvider, OriginAdvancer, OriginProvider, PipelineError,
    PipelineResult, Signal, SignalReceiver,
};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use kanvas_genesis::RollupConfig;
use kanvas_protocol::BlockInfo;
use std::sync::Arc;

/// Yields raw batcher-transaction payloads to the frame queue.
#[async_trait]
pub trait FrameQueueProvider {
    /// Returns the next batcher payload of the current origin, or `Eof` once
    /// the origin is exhausted.
    async fn next_data(&mut self) -> PipelineResult<Bytes>;
}

/// Fetches the batcher transactions of each L1 block through a
/// [`DataAvailabilityProvider`].
#[derive(Debug)]
pub struct L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer,
{
    /// The previous stage.
    pub prev: P,
    /// The data availability source.
    pub provider: DAP,
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// The L1 block currently being drained.
    current: Option<BlockInfo>,
}

impl<DAP, P> L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer,
{
    /// Creates a new retrieval stage.
    pub const fn new(prev: P, provider: DAP, cfg: Arc<RollupConfig>) -> Self {
        Self { prev, provider, cfg, current: None }
    }
}

#[async_trait]
impl<DAP, P> FrameQueueProvider for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider<Item = Bytes> + Send,
    P: L1RetrievalProvider + OriginAdvancer + Send,
{
    async fn next_data(&mut self) -> PipelineResult<Bytes> {
        if self.current.is_none() {
            self.current = self.prev.next_l1_block()?;
        }
        let block = self.current.ok_or(PipelineError::MissingOrigin.crit())?;
        self.provider.next(&block, self.cfg.batcher_address()).await
    }
}

impl<DAP, P> OriginProvider for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider,
    P: L1RetrievalProvider + OriginAdvancer,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<DAP, P> OriginAdvancer for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send,
    P: L1RetrievalProvider + OriginAdvancer + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await?;
        self.provider.clear();
        self.current = None;
        Ok(())
    }
}

#[async_trait]
impl<DAP, P> SignalReceiver for L1Retrieval<DAP, P>
where
    DAP: DataAvailabilityProvider + Send,
    P: L1RetrievalProvider + OriginAdvancer + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        self.provider.clear();
        self.current = None;
        Ok(())
    }
}
