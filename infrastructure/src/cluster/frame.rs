//! Cluster frame codec.
//!
//! Every channel payload travels in one frame:
//!
//! ```text
//! version:u8 | tag:u8 | len:u32 (big-endian) | payload[len]
//! ```
//!
//! The version byte is [`WIRE_VERSION`]. Frames with any other version, or
//! declaring a payload above the configured maximum, fail the stream.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use scorehive_domain::WIRE_VERSION;
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

const HEADER_LEN: usize = 6;

/// Default for `cluster.max_frame_size`
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// One tagged payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub tag: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(tag: u8, payload: Bytes) -> Self {
        Self { tag, payload }
    }
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported wire version {found}")]
    UnsupportedVersion { found: u8 },

    #[error("Frame of {len} bytes exceeds the maximum of {max}")]
    TooLarge { len: usize, max: usize },
}

/// Length-prefixed, version-checked framing for the cluster connections.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let version = src[0];
        if version != WIRE_VERSION {
            return Err(FrameError::UnsupportedVersion { found: version });
        }
        let tag = src[1];
        let len = u32::from_be_bytes([src[2], src[3], src[4], src[5]]) as usize;
        if len > self.max_frame_size {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_size,
            });
        }

        if src.len() < HEADER_LEN + len {
            src.reserve(HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();
        Ok(Some(Frame { tag, payload }))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        let len = frame.payload.len();
        if len > self.max_frame_size {
            return Err(FrameError::TooLarge {
                len,
                max: self.max_frame_size,
            });
        }

        dst.reserve(HEADER_LEN + len);
        dst.put_u8(WIRE_VERSION);
        dst.put_u8(frame.tag);
        dst.put_u32(len as u32);
        dst.extend_from_slice(&frame.payload);
        Ok(())
    }
}
