use byteorder::{BigEndian, ReadBytesExt};
use std::io;

use crate::message::{
    ContentType, RtmpMessage,
    errors::{RtmpMessageError, RtmpMessageResult},
};

use super::{ChunkLength, PeerBandwidthLimitType};

pub struct Reader<R> {
    inner: R,
}

impl<R> Reader<R>
where
    R: io::Read,
{
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn read(&mut self, content_type: ContentType) -> RtmpMessageResult<RtmpMessage> {
        match content_type {
            ContentType::SetChunkSize => self.read_set_chunk_size_message(),
            ContentType::AbortMessage => self.read_abort_message(),
            ContentType::Acknowledgement => self.read_acknowledgement_message(),
            ContentType::WindowAcknowledgementSize => self.read_window_ack_size_message(),
            ContentType::SetPeerBandwidth => self.read_set_peer_bandwidth_message(),
            _ => Err(RtmpMessageError::InvalidMessage(format!(
                "not a protocol control message: {:?}",
                content_type
            ))),
        }
    }

    fn read_set_chunk_size_message(&mut self) -> RtmpMessageResult<RtmpMessage> {
        let length = self.inner.read_i32::<BigEndian>()?;
        Ok(RtmpMessage::ChunkLength(ChunkLength::new(length)))
    }

    fn read_abort_message(&mut self) -> RtmpMessageResult<RtmpMessage> {
        Ok(RtmpMessage::Abort {
            chunk_stream_id: self.inner.read_u32::<BigEndian>()?,
        })
    }

    fn read_acknowledgement_message(&mut self) -> RtmpMessageResult<RtmpMessage> {
        Ok(RtmpMessage::Acknowledgement {
            sequence_number: self.inner.read_u32::<BigEndian>()?,
        })
    }

    fn read_window_ack_size_message(&mut self) -> RtmpMessageResult<RtmpMessage> {
        Ok(RtmpMessage::WindowAcknowledgementSize {
            count: self.inner.read_i32::<BigEndian>()?,
        })
    }

    fn read_set_peer_bandwidth_message(&mut self) -> RtmpMessageResult<RtmpMessage> {
        let ack_window_size = self.inner.read_u32::<BigEndian>()?;
        let limit_type: PeerBandwidthLimitType = self.inner.read_u8()?.try_into()?;
        Ok(RtmpMessage::PeerBandwidth {
            ack_window_size,
            limit_type,
        })
    }
}
