//! Channel frame types.

use crate::ChannelId;

/// The version byte prefixing every batcher transaction payload.
pub const DERIVATION_VERSION_0: u8 = 0;

/// Accounting overhead per frame, used when estimating channel memory usage.
pub const FRAME_OVERHEAD: usize = 200;

/// Frames cannot be larger than 1MB.
///
/// Batcher transactions are generally well under 128KB due to L1 network
/// conditions, but the limit leaves room to grow.
pub const MAX_FRAME_LEN: usize = 1_000_000;

const BASE_FRAME_LEN: usize = 16 + 2 + 4 + 1;

/// A frame decoding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum FrameDecodingError {
    /// The frame data is too large.
    #[error("frame data too large: {0} bytes")]
    DataTooLarge(usize),
    /// The frame data is too short.
    #[error("frame data too short: {0} bytes")]
    DataTooShort(usize),
    /// The `is_last` byte is not a boolean.
    #[error("invalid is_last marker: {0}")]
    InvalidIsLast(u8),
}

/// An error parsing a batcher transaction payload into frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum FrameParseError {
    /// A frame failed to decode.
    #[error(transparent)]
    FrameDecoding(#[from] FrameDecodingError),
    /// The payload is empty.
    #[error("no frames to parse")]
    NoFrames,
    /// The payload carries an unknown derivation version.
    #[error("unsupported derivation version: {0}")]
    UnsupportedVersion(u8),
    /// The concatenated frames do not cover the payload exactly.
    #[error("frame data length mismatch")]
    DataLengthMismatch,
}

/// A channel frame: one segment of a channel's compressed data.
///
/// Encoding:
/// `channel_id(16) || frame_number(u16 BE) || frame_data_length(u32 BE) || frame_data || is_last(u8)`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// The channel this frame belongs to.
    pub id: ChannelId,
    /// The index of this frame within the channel.
    pub number: u16,
    /// The frame payload.
    pub data: Vec<u8>,
    /// Whether this is the closing frame of the channel.
    pub is_last: bool,
}

impl Frame {
    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(BASE_FRAME_LEN + self.data.len());
        encoded.extend_from_slice(&self.id);
        encoded.extend_from_slice(&self.number.to_be_bytes());
        encoded.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        encoded.extend_from_slice(&self.data);
        encoded.push(self.is_last as u8);
        encoded
    }

    /// Decodes a single frame from the front of `encoded`, returning the number
    /// of bytes consumed alongside the frame.
    pub fn decode(encoded: &[u8]) -> Result<(usize, Self), FrameDecodingError> {
        if encoded.len() < BASE_FRAME_LEN {
            return Err(FrameDecodingError::DataTooShort(encoded.len()));
        }

        let id: ChannelId = encoded[..16].try_into().expect("16 byte slice");
        let number = u16::from_be_bytes(encoded[16..18].try_into().expect("2 byte slice"));
        let data_len =
            u32::from_be_bytes(encoded[18..22].try_into().expect("4 byte slice")) as usize;

        // The declared length must fit within the remaining bytes, leaving room
        // for the trailing is_last marker.
        if data_len > MAX_FRAME_LEN || data_len > encoded.len() - BASE_FRAME_LEN {
            return Err(FrameDecodingError::DataTooLarge(data_len));
        }

        let data = encoded[22..22 + data_len].to_vec();
        let is_last = match encoded[22 + data_len] {
            0 => false,
            1 => true,
            b => return Err(FrameDecodingError::InvalidIsLast(b)),
        };
        Ok((BASE_FRAME_LEN + data_len, Self { id, number, data, is_last }))
    }

    /// Parses the full payload of a batcher transaction into frames.
    ///
    /// The payload must begin with [`DERIVATION_VERSION_0`], every frame must
    /// decode, and the frames must cover the payload exactly with at least one
    /// frame present.
    pub fn parse_frames(encoded: &[u8]) -> Result<Vec<Self>, FrameParseError> {
        if encoded.is_empty() {
            return Err(FrameParseError::NoFrames);
        }
        if encoded[0] != DERIVATION_VERSION_0 {
            return Err(FrameParseError::UnsupportedVersion(encoded[0]));
        }

        let data = &encoded[1..];
        let mut frames = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let (consumed, frame) = Self::decode(&data[offset..])?;
            frames.push(frame);
            offset += consumed;
        }

        if offset != data.len() || frames.is_empty() {
            return Err(FrameParseError::DataLengthMismatch);
        }

        Ok(frames)
    }

    /// The size of the frame plus fixed overhead, used for channel bank pruning.
    pub const fn size(&self) -> usize {
        self.data.len() + FRAME_OVERHEAD
    }
}
