//! The frame queue stage.

use crate::{
    FrameQueueProvider, OriginAdvancer, OriginProvider, PipelineResult, Signal, SignalReceiver,
};
use async_trait::async_trait;
use kanvas_protocol::{BlockInfo, Frame};
use std::collections::VecDeque;

/// Yields individual frames to the channel bank.
#[async_trait]
pub trait ChannelBankProvider {
    /// Returns the next frame, or `Eof` once the current origin is exhausted.
    async fn next_frame(&mut self) -> PipelineResult<Frame>;
}

/// Parses batcher payloads into frames, buffering them in arrival order.
///
/// Malformed payloads are dropped in their entirety: a batcher transaction
/// either parses fully or contributes nothing.
#[derive(Debug)]
pub struct FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer,
{
    /// The previous stage.
    pub prev: P,
    /// Parsed frames awaiting the channel bank.
    queue: VecDeque<Frame>,
}

impl<P> FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer,
{
    /// Creates a new frame queue.
    pub const fn new(prev: P) -> Self {
        Self { prev, queue: VecDeque::new() }
    }
}

#[async_trait]
impl<P> ChannelBankProvider for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + Send,
{
    async fn next_frame(&mut self) -> PipelineResult<Frame> {
        loop {
            if let Some(frame) = self.queue.pop_front() {
                return Ok(frame);
            }
            let data = self.prev.next_data().await?;
            match Frame::parse_frames(&data) {
                Ok(frames) => self.queue.extend(frames),
                Err(err) => {
                    warn!(target: "frame_queue", %err, "Failed to parse batcher data, dropping");
                }
            }
        }
    }
}

impl<P> OriginProvider for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> OriginAdvancer for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

#[async_trait]
impl<P> SignalReceiver for FrameQueue<P>
where
    P: FrameQueueProvider + OriginAdvancer + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        self.prev.signal(signal).await?;
        self.queue.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_utils::TestFrameQueueProvider, PipelineError, PipelineErrorKind};
    use alloy_primitives::Bytes;
    use kanvas_protocol::DERIVATION_VERSION_0;

    fn encode_frames(frames: &[Frame]) -> Bytes {
        let mut out = vec![DERIVATION_VERSION_0];
        for frame in frames {
            out.extend_from_slice(&frame.encode());
        }
        out.into()
    }

    #[tokio::test]
    async fn test_frame_queue_parses_and_orders() {
        let frames = vec![
            Frame { id: [1; 16], number: 0, data: vec![1], is_last: false },
            Frame { id: [1; 16], number: 1, data: vec![2], is_last: true },
        ];
        let provider = TestFrameQueueProvider::new(vec![encode_frames(&frames)]);
        let mut stage = FrameQueue::new(provider);
        assert_eq!(stage.next_frame().await.unwrap(), frames[0]);
        assert_eq!(stage.next_frame().await.unwrap(), frames[1]);
        assert!(matches!(
            stage.next_frame().await.unwrap_err(),
            PipelineErrorKind::Temporary(PipelineError::Eof)
        ));
    }

    #[tokio::test]
    async fn test_frame_queue_drops_malformed_payload() {
        let good = Frame { id: [2; 16], number: 0, data: vec![9], is_last: true };
        let provider = TestFrameQueueProvider::new(vec![
            Bytes::from_static(&[0xFF, 0x00]), // bad version byte
            encode_frames(&[good.clone()]),
        ]);
        let mut stage = FrameQueue::new(provider);
        assert_eq!(stage.next_frame().await.unwrap(), good);
    }
}
