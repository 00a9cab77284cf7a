use std::io;

use tokio_util::bytes::Bytes;
use utils::traits::reader::{ReadFrom, ReadRemainingFrom};

use crate::{
    commands::{Invoke, Notify},
    protocol_control,
    user_control::UserControlMessage,
};

use super::{ContentType, RtmpMessage, errors::RtmpMessageError};

/// The reader must hold exactly one message payload, opaque payloads take the
/// rest of it.
impl<R: io::Read> ReadRemainingFrom<ContentType, R> for RtmpMessage {
    type Error = RtmpMessageError;
    fn read_remaining_from(content_type: ContentType, reader: &mut R) -> Result<Self, Self::Error> {
        let message = match content_type {
            ContentType::SetChunkSize
            | ContentType::AbortMessage
            | ContentType::Acknowledgement
            | ContentType::WindowAcknowledgementSize
            | ContentType::SetPeerBandwidth => {
                protocol_control::reader::Reader::new(reader).read(content_type)?
            }
            ContentType::UserControlMessage => {
                RtmpMessage::UserControl(UserControlMessage::read_from(reader)?)
            }
            ContentType::Audio => RtmpMessage::AudioData {
                payload: read_opaque(reader)?,
            },
            ContentType::Video => RtmpMessage::VideoData {
                payload: read_opaque(reader)?,
            },
            ContentType::DataAmf0 | ContentType::DataAmf3 => RtmpMessage::Notify(
                Notify::read_remaining_from(encoding_of(content_type)?, reader)?,
            ),
            ContentType::CommandAmf0 | ContentType::CommandAmf3 => RtmpMessage::Invoke(
                Invoke::read_remaining_from(encoding_of(content_type)?, reader)?,
            ),
        };
        Ok(message)
    }
}

fn encoding_of(content_type: ContentType) -> Result<amf::Version, RtmpMessageError> {
    content_type.encoding().ok_or_else(|| {
        RtmpMessageError::InvalidMessage(format!(
            "content type {:?} carries no object encoding",
            content_type
        ))
    })
}

pub(crate) fn read_opaque<R: io::Read>(reader: &mut R) -> Result<Bytes, RtmpMessageError> {
    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    Ok(payload.into())
}
