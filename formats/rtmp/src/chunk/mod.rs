use errors::{ChunkMessageError, ChunkMessageResult};

use crate::message::RtmpMessage;

pub mod consts;
pub mod errors;
pub mod reader;
pub mod writer;

use consts::csid;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkBasicHeaderType {
    Type1 = 1,
    Type2 = 2,
    Type3 = 3,
}

type CSID = u32;

///! @see: 5.3.1.1. Chunk Basic Header
///! 1, 2 or 3 bytes
///  0 1 2 3 4 5 6 7
/// +-+-+-+-+-+-+-+-+
/// |fmt|   cs id   |
/// +-+-+-+-+-+-+-+-+
///  Chunk basic header 1
///
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |fmt|     0     |   cs id - 64  |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///      Chunk basic header 2
///
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |fmt|     1     |        cs id - 64 (LE)        |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///                Chunk basic header 3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBasicHeader {
    pub header_type: ChunkBasicHeaderType,
    pub fmt: u8,               // 2 bits
    pub chunk_stream_id: CSID, // 6 bits / 1 byte / 2 bytes
}

impl ChunkBasicHeader {
    pub fn new(fmt: u8, csid: CSID) -> ChunkMessageResult<Self> {
        if fmt > 3 {
            return Err(ChunkMessageError::UnexpectedFmt(fmt));
        }
        let header_type = match csid {
            2..=63 => ChunkBasicHeaderType::Type1,
            64..=319 => ChunkBasicHeaderType::Type2,
            320..=65599 => ChunkBasicHeaderType::Type3,
            _ => {
                return Err(ChunkMessageError::InvalidBasicHeader(format!(
                    "invalid csid: {}",
                    csid
                )));
            }
        };

        Ok(Self {
            header_type,
            fmt,
            chunk_stream_id: csid,
        })
    }
}

///! @see: 5.3.1.2. Chunk Message Header
///! @see: 5.3.1.2.1. Type 0 - for start of a chunk stream, or for timestamp backwards
///! 11 bytes total
///! a timestamp of 0xFFFFFF or above is written as 0xFFFFFF and followed by an extended timestamp field
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                   timestamp                   |message length |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     message length (cont)     |message type id| msg stream id |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |           message stream id (cont)            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///                   Chunk Message Header - Type 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMessageHeaderType0 {
    pub timestamp: u32,         // 3 bytes
    pub message_length: u32,    // 3 bytes
    pub message_type_id: u8,    // 1 byte
    pub message_stream_id: u32, // 4 byte, little endian
}

///! @see: 5.3.1.2.2. Type 1 - this chunk takes the same stream ID as the preceding chunk
///! 7 bytes
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                timestamp delta                |message length |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     message length (cont)     |message type id|
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///                 Chunk Message Header - Type 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMessageHeaderType1 {
    pub timestamp_delta: u32, // 3 bytes
    pub message_length: u32,  // 3 bytes
    pub message_type_id: u8,  // 1 byte
}

///! @see: 5.3.1.2.3. Type 2 - for streams with constant-sized messages
///! 3 bytes
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                timestamp delta                |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
///         Chunk Message Header - Type 2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMessageHeaderType2 {
    pub timestamp_delta: u32, // 3 bytes
}

///! @see: 5.3.1.2.4. Type 3 - for one message split into multiple chunks
/// there are no message header for this type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMessageHeaderType3 {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkMessageHeader {
    Type0(ChunkMessageHeaderType0),
    Type1(ChunkMessageHeaderType1),
    Type2(ChunkMessageHeaderType2),
    Type3(ChunkMessageHeaderType3),
}

impl ChunkMessageHeader {
    pub fn fmt(&self) -> u8 {
        match self {
            ChunkMessageHeader::Type0(_) => 0,
            ChunkMessageHeader::Type1(_) => 1,
            ChunkMessageHeader::Type2(_) => 2,
            ChunkMessageHeader::Type3(_) => 3,
        }
    }
}

/// Header fields of a reassembled message, timestamps resolved to absolute values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMessageCommonHeader {
    pub chunk_stream_id: CSID,
    pub timestamp: u32,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
}

///! @see: 5.3.1. Chunk Format
/// +--------------+----------------+--------------------+--------------+
/// | Basic Header | Message Header | Extended Timestamp |  Chunk Data  |
/// +--------------+----------------+--------------------+--------------+
/// |                                                    |
/// |<------------------- Chunk Header ----------------->|
///                             Chunk Format
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMessage {
    pub header: ChunkMessageCommonHeader,
    pub message: RtmpMessage,
}

/// Chunk stream a message is sent on unless the caller picks one.
pub fn default_csid(message: &RtmpMessage) -> CSID {
    let id = match message {
        RtmpMessage::ChunkLength(_)
        | RtmpMessage::Abort { .. }
        | RtmpMessage::Acknowledgement { .. }
        | RtmpMessage::WindowAcknowledgementSize { .. }
        | RtmpMessage::PeerBandwidth { .. } => csid::PROTOCOL_CONTROL,
        RtmpMessage::UserControl(_) => csid::USER_CONTROL,
        RtmpMessage::Invoke(_) => csid::NET_CONNECTION_COMMAND,
        RtmpMessage::Notify(_) => csid::DATA,
        RtmpMessage::AudioData { .. } => csid::AUDIO,
        RtmpMessage::VideoData { .. } => csid::VIDEO,
    };
    id.into()
}

#[cfg(test)]
mod tests {
    use tokio_util::bytes::Bytes;

    use super::{ChunkBasicHeader, ChunkBasicHeaderType, default_csid};
    use crate::{
        chunk::errors::ChunkMessageError,
        commands::{Invoke, Notify},
        message::RtmpMessage,
        user_control::UserControlMessage,
    };

    #[test]
    fn basic_header_forms() {
        assert_eq!(
            ChunkBasicHeader::new(0, 2).unwrap().header_type,
            ChunkBasicHeaderType::Type1
        );
        assert_eq!(
            ChunkBasicHeader::new(1, 64).unwrap().header_type,
            ChunkBasicHeaderType::Type2
        );
        assert_eq!(
            ChunkBasicHeader::new(2, 319).unwrap().header_type,
            ChunkBasicHeaderType::Type2
        );
        assert_eq!(
            ChunkBasicHeader::new(3, 65599).unwrap().header_type,
            ChunkBasicHeaderType::Type3
        );
        for csid in [0, 1, 65600] {
            assert!(matches!(
                ChunkBasicHeader::new(0, csid),
                Err(ChunkMessageError::InvalidBasicHeader(_))
            ));
        }
        assert!(matches!(
            ChunkBasicHeader::new(4, 3),
            Err(ChunkMessageError::UnexpectedFmt(4))
        ));
    }

    #[test]
    fn default_chunk_streams() {
        assert_eq!(
            default_csid(&RtmpMessage::Acknowledgement { sequence_number: 1 }),
            2
        );
        assert_eq!(
            default_csid(&RtmpMessage::UserControl(UserControlMessage::ping_response(1))),
            2
        );
        assert_eq!(
            default_csid(&RtmpMessage::Invoke(Invoke::new(
                "connect",
                1,
                amf::Value::Null,
                vec![]
            ))),
            3
        );
        assert_eq!(
            default_csid(&RtmpMessage::Notify(Notify::new(
                amf::Version::Amf0,
                Bytes::new()
            ))),
            4
        );
        assert_eq!(
            default_csid(&RtmpMessage::AudioData {
                payload: Bytes::new()
            }),
            6
        );
        assert_eq!(
            default_csid(&RtmpMessage::VideoData {
                payload: Bytes::new()
            }),
            7
        );
    }
}
