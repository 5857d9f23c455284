//! The channel reader stage.

use crate::{
    ChannelReaderProvider, OriginAdvancer, OriginProvider, PipelineResult, Signal, SignalReceiver,
};
use async_trait::async_trait;
use kanvas_protocol::{BatchReader, BlockInfo, SingleBatch};

/// Yields decoded batches to the batch queue.
#[async_trait]
pub trait BatchQueueProvider {
    /// Returns the next batch decoded out of a channel.
    async fn next_batch(&mut self) -> PipelineResult<SingleBatch>;
}

/// Decompresses ready channels and reads the batch stream out of them.
///
/// A channel that fails to decompress or decode is treated as a reset
/// condition: the pipeline restarts from the safe head rather than guessing at
/// the channel's contents.
#[derive(Debug)]
pub struct ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer,
{
    /// The previous stage.
    pub prev: P,
    /// The reader over the channel currently being drained.
    next_batch_reader: Option<BatchReader>,
}

impl<P> ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer,
{
    /// Creates a new channel reader.
    pub const fn new(prev: P) -> Self {
        Self { prev, next_batch_reader: None }
    }
}

#[async_trait]
impl<P> BatchQueueProvider for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + Send,
{
    async fn next_batch(&mut self) -> PipelineResult<SingleBatch> {
        loop {
            if self.next_batch_reader.is_none() {
                let data = self.prev.next_channel_data().await?;
                self.next_batch_reader = Some(BatchReader::new(&data).map_err(|err| {
                    warn!(target: "channel_reader", %err, "Failed to open channel");
                    crate::ResetError::MalformedChannel(err).reset()
                })?);
            }

            let reader = self.next_batch_reader.as_mut().expect("reader set above");
            match reader.next_batch() {
                Some(Ok(batch)) => return Ok(batch),
                Some(Err(err)) => {
                    warn!(target: "channel_reader", %err, "Failed to decode batch");
                    self.next_batch_reader = None;
                    return Err(crate::ResetError::MalformedChannel(err).reset());
                }
                None => {
                    self.next_batch_reader = None;
                }
            }
        }
    }
}

impl<P> OriginProvider for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P> SignalReceiver for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        self.next_batch_reader = None;
        Ok(())
    }
}
