//! Channel assembly.

use crate::{BlockInfo, Frame};
use alloy_primitives::{map::HashMap, Bytes};

/// The length of a channel id, in bytes.
pub const CHANNEL_ID_LENGTH: usize = 16;

/// An opaque identifier for a channel.
pub type ChannelId = [u8; CHANNEL_ID_LENGTH];

/// An error returned when adding a frame to a [`Channel`].
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelError {
    /// The frame id does not match the channel id.
    #[error("frame id does not match channel id")]
    FrameIdMismatch,
    /// The channel is already closed.
    #[error("channel is closed")]
    ChannelClosed,
    /// A frame with this number was already buffered.
    #[error("frame number {0} already exists")]
    FrameNumberExists(u16),
    /// The frame number is past the closing frame.
    #[error("frame number {0} is beyond the end frame")]
    FrameBeyondEndFrame(u16),
}

/// A channel: a set of batches split across one or more [`Frame`]s.
///
/// Frames may be ingested out of order. Once the closing frame has been added,
/// the channel becomes ready as soon as all intervening frames are present.
#[derive(Debug, Clone, Default)]
pub struct Channel {
    /// The channel id.
    id: ChannelId,
    /// The L1 block at which the first frame of this channel was seen.
    open_block: BlockInfo,
    /// Estimated memory usage, for channel bank pruning.
    estimated_size: usize,
    /// Whether the closing frame has been buffered.
    closed: bool,
    /// The highest frame number ingested so far.
    highest_frame_number: u16,
    /// The number of the closing frame. No frame number may exceed this.
    last_frame_number: u16,
    /// Buffered frames, keyed by frame number.
    inputs: HashMap<u16, Frame>,
    /// The highest L1 block a frame of this channel was included in.
    highest_l1_inclusion_block: BlockInfo,
}

impl Channel {
    /// Creates a new [`Channel`] opened at the given L1 block.
    pub fn new(id: ChannelId, open_block: BlockInfo) -> Self {
        Self { id, open_block, inputs: HashMap::default(), ..Default::default() }
    }

    /// Returns the channel id.
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// Returns the number of buffered frames.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Returns whether the channel holds no frames.
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Adds a frame to the channel, recording `l1_inclusion_block` as its
    /// inclusion point.
    pub fn add_frame(
        &mut self,
        frame: Frame,
        l1_inclusion_block: BlockInfo,
    ) -> Result<(), ChannelError> {
        if frame.id != self.id {
            return Err(ChannelError::FrameIdMismatch);
        }
        if frame.is_last && self.closed {
            return Err(ChannelError::ChannelClosed);
        }
        if self.inputs.contains_key(&frame.number) {
            return Err(ChannelError::FrameNumberExists(frame.number));
        }
        if self.closed && frame.number >= self.last_frame_number {
            return Err(ChannelError::FrameBeyondEndFrame(frame.number));
        }

        if frame.is_last {
            self.last_frame_number = frame.number;
            self.closed = true;

            // Drop any frames past the closing frame.
            if self.last_frame_number < self.highest_frame_number {
                let last = self.last_frame_number;
                let mut reclaimed = 0;
                self.inputs.retain(|number, frame| {
                    if *number < last {
                        true
                    } else {
                        reclaimed += frame.size();
                        false
                    }
                });
                self.estimated_size -= reclaimed;
                self.highest_frame_number = self.last_frame_number;
            }
        }

        if frame.number > self.highest_frame_number {
            self.highest_frame_number = frame.number;
        }
        if self.highest_l1_inclusion_block.number < l1_inclusion_block.number {
            self.highest_l1_inclusion_block = l1_inclusion_block;
        }

        self.estimated_size += frame.size();
        self.inputs.insert(frame.number, frame);
        Ok(())
    }

    /// Returns the number of the L1 block this channel was opened at.
    pub const fn open_block_number(&self) -> u64 {
        self.open_block.number
    }

    /// Returns the estimated channel size, including per-frame overhead.
    pub const fn size(&self) -> usize {
        self.estimated_size
    }

    /// Returns whether the channel holds a contiguous run of frames up to and
    /// including the closing frame.
    pub fn is_ready(&self) -> bool {
        if !self.closed {
            return false;
        }
        if self.inputs.len() != (self.last_frame_number + 1) as usize {
            return false;
        }
        (0..=self.last_frame_number).all(|i| self.inputs.contains_key(&i))
    }

    /// Returns the channel's frames concatenated in order, or `None` if frames
    /// are missing.
    pub fn frame_data(&self) -> Option<Bytes> {
        let mut data = Vec::with_capacity(self.size());
        (0..=self.last_frame_number).try_for_each(|i| {
            data.extend_from_slice(&self.inputs.get(&i)?.data);
            Some(())
        })?;
        Some(data.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn frame(id: ChannelId, number: u16, is_last: bool, data: &[u8]) -> Frame {
        Frame { id, number, data: data.to_vec(), is_last }
    }

    #[rstest]
    #[case::wrong_channel(
        vec![frame([0xEE; 16], 0, false, b"")],
        vec![Err(ChannelError::FrameIdMismatch)]
    )]
    #[case::double_close(
        vec![frame([0xFF; 16], 2, true, b"four"), frame([0xFF; 16], 1, true, b"")],
        vec![Ok(()), Err(ChannelError::ChannelClosed)]
    )]
    #[case::duplicate_frame(
        vec![frame([0xFF; 16], 2, false, b"four"), frame([0xFF; 16], 2, false, b"seven")],
        vec![Ok(()), Err(ChannelError::FrameNumberExists(2))]
    )]
    #[case::frame_past_closing(
        vec![frame([0xFF; 16], 2, true, b"four"), frame([0xFF; 16], 10, false, b"seven")],
        vec![Ok(()), Err(ChannelError::FrameBeyondEndFrame(10))]
    )]
    fn test_frame_validity(
        #[case] frames: Vec<Frame>,
        #[case] expected: Vec<Result<(), ChannelError>>,
    ) {
        let mut channel = Channel::new([0xFF; 16], BlockInfo::default());
        for (frame, expected) in frames.into_iter().zip(expected) {
            assert_eq!(channel.add_frame(frame, BlockInfo::default()), expected);
        }
    }

    #[test]
    fn test_prune_after_close_frame() {
        let id = [0xFF; 16];
        let mut channel = Channel::new(id, BlockInfo::default());
        channel.add_frame(frame(id, 10, false, b"seven"), BlockInfo::default()).unwrap();
        let size_before = channel.size();
        channel.add_frame(frame(id, 2, true, b"four"), BlockInfo::default()).unwrap();
        // The out-of-range frame 10 was reclaimed.
        assert_eq!(channel.len(), 1);
        assert!(channel.size() < size_before + frame(id, 2, true, b"four").size());
        assert!(!channel.is_ready());
    }

    #[test]
    fn test_ready_and_frame_data() {
        let id = [0x01; 16];
        let mut channel = Channel::new(id, BlockInfo::default());
        channel.add_frame(frame(id, 1, true, b"world"), BlockInfo::default()).unwrap();
        assert!(!channel.is_ready());
        channel.add_frame(frame(id, 0, false, b"hello "), BlockInfo::default()).unwrap();
        assert!(channel.is_ready());
        assert_eq!(channel.frame_data().unwrap().as_ref(), b"hello world");
    }

    #[test]
    fn test_open_block_number() {
        let open = BlockInfo { number: 42, ..Default::default() };
        let channel = Channel::new([0x01; 16], open);
        assert_eq!(channel.open_block_number(), 42);
    }
}
