use std::{fmt::Debug, io};

use errors::{RtmpMessageError, RtmpMessageResult};
use tokio_util::bytes::Bytes;
use utils::traits::{reader::ReadRemainingFrom, writer::WriteTo};

use crate::{
    commands::{Invoke, Notify},
    protocol_control::{ChunkLength, PeerBandwidthLimitType},
    user_control::UserControlMessage,
};

pub mod errors;
pub mod reader;
pub mod writer;

///! @see: 5.4. Protocol Control Messages, 6.2. Message Types
/// the message type id carried in every chunk message header
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    SetChunkSize = 1,
    AbortMessage = 2,
    Acknowledgement = 3,
    UserControlMessage = 4,
    WindowAcknowledgementSize = 5,
    SetPeerBandwidth = 6,
    Audio = 8,
    Video = 9,
    DataAmf3 = 15,
    CommandAmf3 = 17,
    DataAmf0 = 18,
    CommandAmf0 = 20,
}

impl From<ContentType> for u8 {
    fn from(value: ContentType) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for ContentType {
    type Error = RtmpMessageError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ContentType::SetChunkSize),
            2 => Ok(ContentType::AbortMessage),
            3 => Ok(ContentType::Acknowledgement),
            4 => Ok(ContentType::UserControlMessage),
            5 => Ok(ContentType::WindowAcknowledgementSize),
            6 => Ok(ContentType::SetPeerBandwidth),
            8 => Ok(ContentType::Audio),
            9 => Ok(ContentType::Video),
            15 => Ok(ContentType::DataAmf3),
            17 => Ok(ContentType::CommandAmf3),
            18 => Ok(ContentType::DataAmf0),
            20 => Ok(ContentType::CommandAmf0),
            _ => Err(RtmpMessageError::UnknownMessageType(value)),
        }
    }
}

impl ContentType {
    pub fn is_protocol_control(&self) -> bool {
        matches!(
            self,
            ContentType::SetChunkSize
                | ContentType::AbortMessage
                | ContentType::Acknowledgement
                | ContentType::WindowAcknowledgementSize
                | ContentType::SetPeerBandwidth
        )
    }

    /// Object encoding of command and data messages, `None` for the rest.
    pub fn encoding(&self) -> Option<amf::Version> {
        match self {
            ContentType::CommandAmf0 | ContentType::DataAmf0 => Some(amf::Version::Amf0),
            ContentType::CommandAmf3 | ContentType::DataAmf3 => Some(amf::Version::Amf3),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq)]
pub enum RtmpMessage {
    ChunkLength(ChunkLength),
    Abort {
        chunk_stream_id: u32,
    },
    Acknowledgement {
        sequence_number: u32,
    },
    UserControl(UserControlMessage),
    WindowAcknowledgementSize {
        count: i32,
    },
    PeerBandwidth {
        ack_window_size: u32,
        limit_type: PeerBandwidthLimitType,
    },
    AudioData {
        payload: Bytes,
    },
    VideoData {
        payload: Bytes,
    },
    Notify(Notify),
    Invoke(Invoke),
}

impl Debug for RtmpMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChunkLength(length) => write!(f, "ChunkLength: {}", length.length()),
            Self::Abort { chunk_stream_id } => write!(f, "Abort, csid: {}", chunk_stream_id),
            Self::Acknowledgement { sequence_number } => {
                write!(f, "Acknowledgement, sequence number: {}", sequence_number)
            }
            Self::UserControl(message) => write!(f, "UserControl: {:?}", message),
            Self::WindowAcknowledgementSize { count } => {
                write!(f, "WindowAcknowledgementSize: {}", count)
            }
            Self::PeerBandwidth {
                ack_window_size,
                limit_type,
            } => write!(f, "PeerBandwidth: {}, {:?}", ack_window_size, limit_type),
            Self::AudioData { payload } => write!(f, "Audio, length: {}", payload.len()),
            Self::VideoData { payload } => write!(f, "Video, length: {}", payload.len()),
            Self::Notify(notify) => write!(f, "Notify: {:?}", notify),
            Self::Invoke(invoke) => write!(f, "Invoke: {:?}", invoke),
        }
    }
}

impl RtmpMessage {
    pub fn content_type(&self) -> ContentType {
        match self {
            RtmpMessage::ChunkLength(_) => ContentType::SetChunkSize,
            RtmpMessage::Abort { .. } => ContentType::AbortMessage,
            RtmpMessage::Acknowledgement { .. } => ContentType::Acknowledgement,
            RtmpMessage::UserControl(_) => ContentType::UserControlMessage,
            RtmpMessage::WindowAcknowledgementSize { .. } => {
                ContentType::WindowAcknowledgementSize
            }
            RtmpMessage::PeerBandwidth { .. } => ContentType::SetPeerBandwidth,
            RtmpMessage::AudioData { .. } => ContentType::Audio,
            RtmpMessage::VideoData { .. } => ContentType::Video,
            RtmpMessage::Notify(notify) => match notify.encoding {
                amf::Version::Amf0 => ContentType::DataAmf0,
                amf::Version::Amf3 => ContentType::DataAmf3,
            },
            RtmpMessage::Invoke(invoke) => match invoke.encoding {
                amf::Version::Amf0 => ContentType::CommandAmf0,
                amf::Version::Amf3 => ContentType::CommandAmf3,
            },
        }
    }

    pub fn read_from<R>(content_type: ContentType, mut payload: R) -> RtmpMessageResult<Self>
    where
        R: io::Read,
    {
        Self::read_remaining_from(content_type, &mut payload)
    }

    pub fn to_bytes(&self) -> RtmpMessageResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::bytes::Bytes;
    use utils::bytes::hex_to_bytes;

    use super::{ContentType, RtmpMessage};
    use crate::{
        commands::{Invoke, Notify},
        message::errors::RtmpMessageError,
        protocol_control::{ChunkLength, PeerBandwidthLimitType},
        user_control::{UserControlEventType, UserControlMessage},
    };

    fn round_trip(message: RtmpMessage) {
        let bytes = message.to_bytes().unwrap();
        let decoded = RtmpMessage::read_from(message.content_type(), &bytes[..]).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn content_type_ids() {
        let ids = [1u8, 2, 3, 4, 5, 6, 8, 9, 15, 17, 18, 20];
        for id in ids {
            assert_eq!(u8::from(ContentType::try_from(id).unwrap()), id);
        }
        for id in [0u8, 7, 16, 19, 22, 255] {
            assert!(matches!(
                ContentType::try_from(id),
                Err(RtmpMessageError::UnknownMessageType(v)) if v == id
            ));
        }
    }

    #[test]
    fn control_messages_wire_format() {
        assert_eq!(
            RtmpMessage::ChunkLength(ChunkLength::new(4096)).to_bytes().unwrap(),
            hex_to_bytes("00001000").unwrap()
        );
        assert_eq!(
            RtmpMessage::Acknowledgement {
                sequence_number: 0x01020304
            }
            .to_bytes()
            .unwrap(),
            hex_to_bytes("01020304").unwrap()
        );
        assert_eq!(
            RtmpMessage::PeerBandwidth {
                ack_window_size: 2_500_000,
                limit_type: PeerBandwidthLimitType::Dynamic
            }
            .to_bytes()
            .unwrap(),
            hex_to_bytes("002625a0 02").unwrap()
        );
        assert_eq!(
            RtmpMessage::WindowAcknowledgementSize { count: -1 }
                .to_bytes()
                .unwrap(),
            hex_to_bytes("ffffffff").unwrap()
        );
    }

    #[test]
    fn every_kind_round_trips() {
        round_trip(RtmpMessage::ChunkLength(ChunkLength::new(128)));
        round_trip(RtmpMessage::Abort { chunk_stream_id: 7 });
        round_trip(RtmpMessage::Acknowledgement {
            sequence_number: u32::MAX,
        });
        round_trip(RtmpMessage::UserControl(UserControlMessage::new(
            UserControlEventType::SetBufferLength,
            vec![1, 3000],
        )));
        round_trip(RtmpMessage::WindowAcknowledgementSize { count: 2_500_000 });
        round_trip(RtmpMessage::PeerBandwidth {
            ack_window_size: 5_000_000,
            limit_type: PeerBandwidthLimitType::Soft,
        });
        round_trip(RtmpMessage::AudioData {
            payload: Bytes::from_static(&[0xaf, 0x01, 0x02]),
        });
        round_trip(RtmpMessage::VideoData {
            payload: Bytes::new(),
        });
        round_trip(RtmpMessage::Notify(
            Notify::from_values(amf::Version::Amf0, &[amf::amf0::string("onMetaData")]).unwrap(),
        ));
        round_trip(RtmpMessage::Notify(
            Notify::from_values(amf::Version::Amf3, &[amf::amf0::number(1)]).unwrap(),
        ));
        round_trip(RtmpMessage::Invoke(Invoke::new(
            "connect",
            1,
            amf::Value::Null,
            vec![amf::amf0::string("app")],
        )));
        round_trip(RtmpMessage::Invoke(
            Invoke::new("play", 0, amf::Value::Null, vec![amf::amf0::string("s")])
                .with_encoding(amf::Version::Amf3),
        ));
    }

    #[test]
    fn content_type_follows_encoding() {
        let invoke = Invoke::new("x", 2, amf::Value::Null, vec![]);
        assert_eq!(
            RtmpMessage::Invoke(invoke.clone()).content_type(),
            ContentType::CommandAmf0
        );
        assert_eq!(
            RtmpMessage::Invoke(invoke.with_encoding(amf::Version::Amf3)).content_type(),
            ContentType::CommandAmf3
        );
    }

    #[test]
    fn truncated_control_message() {
        assert!(matches!(
            RtmpMessage::read_from(ContentType::Acknowledgement, &[0x00, 0x01][..]),
            Err(RtmpMessageError::Io(_))
        ));
    }
}
