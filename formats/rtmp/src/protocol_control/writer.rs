use byteorder::{BigEndian, WriteBytesExt};
use std::io;

use crate::message::{
    RtmpMessage,
    errors::{RtmpMessageError, RtmpMessageResult},
};

use super::{ChunkLength, PeerBandwidthLimitType};

pub struct Writer<W> {
    inner: W,
}

impl<W> Writer<W>
where
    W: io::Write,
{
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write(&mut self, message: &RtmpMessage) -> RtmpMessageResult<()> {
        match message {
            RtmpMessage::ChunkLength(length) => self.write_set_chunk_size_message(length),
            RtmpMessage::Abort { chunk_stream_id } => self.write_u32(*chunk_stream_id),
            RtmpMessage::Acknowledgement { sequence_number } => self.write_u32(*sequence_number),
            RtmpMessage::WindowAcknowledgementSize { count } => {
                self.inner.write_i32::<BigEndian>(*count)?;
                Ok(())
            }
            RtmpMessage::PeerBandwidth {
                ack_window_size,
                limit_type,
            } => self.write_set_peer_bandwidth_message(*ack_window_size, *limit_type),
            _ => Err(RtmpMessageError::InvalidMessage(format!(
                "not a protocol control message: {:?}",
                message.content_type()
            ))),
        }
    }

    fn write_set_chunk_size_message(&mut self, length: &ChunkLength) -> RtmpMessageResult<()> {
        self.inner.write_i32::<BigEndian>(length.length())?;
        Ok(())
    }

    fn write_u32(&mut self, value: u32) -> RtmpMessageResult<()> {
        self.inner.write_u32::<BigEndian>(value)?;
        Ok(())
    }

    fn write_set_peer_bandwidth_message(
        &mut self,
        ack_window_size: u32,
        limit_type: PeerBandwidthLimitType,
    ) -> RtmpMessageResult<()> {
        self.inner.write_u32::<BigEndian>(ack_window_size)?;
        self.inner.write_u8(limit_type.into())?;
        Ok(())
    }
}
