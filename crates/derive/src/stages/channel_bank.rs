//! The channel bank stage.

use crate::{
    ChannelBankProvider, OriginAdvancer, OriginProvider, PipelineError, PipelineResult, Signal,
    SignalReceiver,
};
use alloy_primitives::{map::HashMap, Bytes};
use async_trait::async_trait;
use kanvas_genesis::RollupConfig;
use kanvas_protocol::{BlockInfo, Channel, ChannelId};
use std::{collections::VecDeque, sync::Arc};

/// The maximum total size of buffered channels, in bytes.
pub const MAX_CHANNEL_BANK_SIZE: usize = 100_000_000;

/// Yields the data of complete channels to the channel reader.
#[async_trait]
pub trait ChannelReaderProvider {
    /// Returns the concatenated frame data of the next ready channel.
    async fn next_channel_data(&mut self) -> PipelineResult<Bytes>;
}

/// Assembles frames into channels, keyed by channel id.
///
/// Channels are read strictly in the order they were first seen. A channel
/// whose closing frame does not arrive within `channel_timeout` L1 blocks of
/// its opening is dropped, unblocking the channels behind it.
#[derive(Debug)]
pub struct ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer,
{
    /// The previous stage.
    pub prev: P,
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
    /// Open channels, keyed by id.
    channels: HashMap<ChannelId, Channel>,
    /// Channel ids in first-seen order.
    channel_queue: VecDeque<ChannelId>,
}

impl<P> ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer,
{
    /// Creates a new channel bank.
    pub fn new(prev: P, cfg: Arc<RollupConfig>) -> Self {
        Self { prev, cfg, channels: HashMap::default(), channel_queue: VecDeque::new() }
    }

    fn total_size(&self) -> usize {
        self.channels.values().map(Channel::size).sum()
    }

    fn is_timed_out(&self, channel: &Channel, origin: &BlockInfo) -> bool {
        channel.open_block_number() + self.cfg.channel_timeout < origin.number
    }

    /// Buffers a frame into its channel, opening a new channel at the current
    /// origin for unknown ids. Frames for timed-out channels are ignored.
    fn ingest_frame(&mut self, frame: kanvas_protocol::Frame, origin: BlockInfo) {
        let id = frame.id;
        let channel = self.channels.entry(id).or_insert_with(|| {
            self.channel_queue.push_back(id);
            Channel::new(id, origin)
        });

        if channel.open_block_number() + self.cfg.channel_timeout < origin.number {
            debug!(target: "channel_bank", id = ?id, "Ignoring frame for timed-out channel");
            return;
        }
        if let Err(err) = channel.add_frame(frame, origin) {
            warn!(target: "channel_bank", id = ?id, %err, "Dropping invalid frame");
        }

        // Enforce the bank's memory bound by dropping the oldest channels.
        while self.total_size() > MAX_CHANNEL_BANK_SIZE {
            let Some(oldest) = self.channel_queue.pop_front() else { break };
            warn!(target: "channel_bank", id = ?oldest, "Channel bank full, dropping channel");
            self.channels.remove(&oldest);
        }
    }
}

#[async_trait]
impl<P> ChannelReaderProvider for ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer + Send,
{
    async fn next_channel_data(&mut self) -> PipelineResult<Bytes> {
        let origin = self.origin().ok_or(PipelineError::MissingOrigin.crit())?;

        // Drop timed-out channels from the front of the queue so they do not
        // stall the channels behind them.
        while let Some(id) = self.channel_queue.front() {
            let channel = &self.channels[id];
            if self.is_timed_out(channel, &origin) {
                warn!(
                    target: "channel_bank",
                    id = ?id,
                    open_block = channel.open_block_number(),
                    "Dropping timed-out channel"
                );
                kanvas_macros::inc!(counter, crate::Metrics::PIPELINE_CHANNEL_TIMEOUTS);
                let id = *id;
                self.channels.remove(&id);
                self.channel_queue.pop_front();
            } else {
                break;
            }
        }

        // Channels are read in FIFO order; only the front may be emitted.
        if let Some(id) = self.channel_queue.front() {
            if self.channels[id].is_ready() {
                let id = *id;
                let channel = self.channels.remove(&id).expect("channel exists");
                self.channel_queue.pop_front();
                if let Some(data) = channel.frame_data() {
                    return Ok(data);
                }
            }
        }

        // Ingest one frame per step; the caller steps again until a channel
        // completes or the origin runs dry.
        let frame = self.prev.next_frame().await?;
        self.ingest_frame(frame, origin);
        Err(PipelineError::NotEnoughData.temp())
    }
}

impl<P> OriginProvider for ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P> SignalReceiver for ChannelBank<P>
where
    P: ChannelBankProvider + OriginAdvancer + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        self.channels.clear();
        self.channel_queue.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test_utils::{test_rollup_config, TestChannelBankProvider},
        PipelineErrorKind,
    };
    use kanvas_protocol::Frame;

    fn frame(id: ChannelId, number: u16, is_last: bool, data: &[u8]) -> Frame {
        Frame { id, number, data: data.to_vec(), is_last }
    }

    /// Steps the bank until it emits channel data, as the pipeline would.
    async fn next_data(bank: &mut ChannelBank<TestChannelBankProvider>) -> PipelineResult<Bytes> {
        loop {
            match bank.next_channel_data().await {
                Err(PipelineErrorKind::Temporary(PipelineError::NotEnoughData)) => continue,
                other => return other,
            }
        }
    }

    #[tokio::test]
    async fn test_emits_ready_channel() {
        let frames = vec![
            frame([1; 16], 0, false, b"hello "),
            frame([1; 16], 1, true, b"world"),
        ];
        let provider = TestChannelBankProvider::new(frames, BlockInfo::default());
        let mut bank = ChannelBank::new(provider, Arc::new(test_rollup_config()));
        assert_eq!(next_data(&mut bank).await.unwrap().as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_fifo_ordering_across_channels() {
        // The second channel completes first but must wait behind the first.
        let frames = vec![
            frame([1; 16], 0, false, b"a"),
            frame([2; 16], 0, true, b"b"),
            frame([1; 16], 1, true, b"c"),
        ];
        let provider = TestChannelBankProvider::new(frames, BlockInfo::default());
        let mut bank = ChannelBank::new(provider, Arc::new(test_rollup_config()));
        assert_eq!(next_data(&mut bank).await.unwrap().as_ref(), b"ac");
        assert_eq!(next_data(&mut bank).await.unwrap().as_ref(), b"b");
    }

    #[tokio::test]
    async fn test_timed_out_channel_dropped_and_does_not_stall() {
        let cfg = Arc::new(test_rollup_config());
        // The origin has advanced past the channel timeout of a channel that
        // opened at block 0 and never closed.
        let mut late_origin = BlockInfo::default();
        late_origin.number = cfg.channel_timeout + 1;
        let provider =
            TestChannelBankProvider::new(vec![frame([2; 16], 0, true, b"ok")], late_origin);

        let mut bank = ChannelBank::new(provider, cfg);
        bank.ingest_frame(frame([1; 16], 0, false, b"stuck"), BlockInfo::default());

        // The stuck channel is dropped, letting the closed channel through.
        assert_eq!(next_data(&mut bank).await.unwrap().as_ref(), b"ok");
        assert!(bank.channels.is_empty());
    }

    #[tokio::test]
    async fn test_eof_bubbles_when_no_frames() {
        let provider = TestChannelBankProvider::new(vec![], BlockInfo::default());
        let mut bank = ChannelBank::new(provider, Arc::new(test_rollup_config()));
        assert!(matches!(
            next_data(&mut bank).await.unwrap_err(),
            PipelineErrorKind::Temporary(PipelineError::Eof)
        ));
    }
}
