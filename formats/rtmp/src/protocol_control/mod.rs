use crate::message::errors::RtmpMessageError;

pub mod consts;
pub mod reader;
pub mod writer;

use consts::MAX_CHUNK_SIZE;

///! @see: 5.4.1. Set Chunk Size (1)
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |0|                     chunk size (31 bits)                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///         Payload for the "Set Chunk Size" protocol message
///
/// only the upper bound is clamped, a negative length is kept as is and is
/// rejected by the chunk layer when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLength {
    length: i32,
}

impl ChunkLength {
    pub fn new(length: i32) -> Self {
        Self {
            length: length.min(MAX_CHUNK_SIZE),
        }
    }

    pub fn length(&self) -> i32 {
        self.length
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerBandwidthLimitType {
    // The peer SHOULD limit its output bandwidth to the indicated window size.
    Hard = 0,
    // The peer SHOULD limit its output bandwidth to the the window indicated in this message
    // or the limit already in effect, whichever is smaller.
    Soft = 1,
    // If the previous Limit Type was Hard,
    // treat this message as though it was marked Hard, otherwise ignore this message.
    Dynamic = 2,
}

impl From<PeerBandwidthLimitType> for u8 {
    fn from(value: PeerBandwidthLimitType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for PeerBandwidthLimitType {
    type Error = RtmpMessageError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PeerBandwidthLimitType::Hard),
            1 => Ok(PeerBandwidthLimitType::Soft),
            2 => Ok(PeerBandwidthLimitType::Dynamic),
            _ => Err(RtmpMessageError::InvalidMessage(format!(
                "invalid set peer bandwidth message, the limit type is unknown: {}",
                value
            ))),
        }
    }
}
