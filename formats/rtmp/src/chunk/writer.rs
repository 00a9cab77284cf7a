use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::{collections::HashMap, io};
use tokio_util::bytes::BytesMut;

use crate::message::RtmpMessage;

use super::{
    CSID, ChunkBasicHeader, ChunkBasicHeaderType, ChunkMessageHeader, ChunkMessageHeaderType0,
    ChunkMessageHeaderType1, ChunkMessageHeaderType2, ChunkMessageHeaderType3,
    consts::{DEFAULT_CHUNK_SIZE, MAX_MESSAGE_LENGTH, MAX_TIMESTAMP},
    errors::{ChunkMessageError, ChunkMessageResult},
};

#[derive(Debug, Default)]
struct WriteContext {
    timestamp: u32,
    message_length: u32,
    message_stream_id: u32,
    message_type_id: u8,
}

type ChunkMessageWriteContext = HashMap<CSID, WriteContext>;

/// Splits messages into chunks, compressing headers against the previous message
/// of the same chunk stream.
#[derive(Debug)]
pub struct Writer {
    context: ChunkMessageWriteContext,
    chunk_size: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Self {
            context: ChunkMessageWriteContext::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn set_chunk_size(&mut self, size: i32) -> ChunkMessageResult<usize> {
        if size < 1 {
            return Err(ChunkMessageError::InvalidMessage(format!(
                "invalid chunk size: {}",
                size
            )));
        }
        let old_size = self.chunk_size;
        self.chunk_size = size as usize;
        Ok(old_size)
    }

    /// Appends the chunks of `message` to `buffer`, nothing is appended on error.
    ///
    /// A set chunk size message takes effect for the messages after it.
    pub fn write(
        &mut self,
        csid: CSID,
        timestamp: u32,
        message_stream_id: u32,
        message: &RtmpMessage,
        buffer: &mut BytesMut,
    ) -> ChunkMessageResult<()> {
        let payload = encode_payload(message)?;
        self.write_encoded(csid, timestamp, message_stream_id, message, &payload, buffer)
    }

    /// Same as [`Writer::write`] with a payload already produced by [`encode_payload`].
    pub fn write_encoded(
        &mut self,
        csid: CSID,
        timestamp: u32,
        message_stream_id: u32,
        message: &RtmpMessage,
        payload: &[u8],
        buffer: &mut BytesMut,
    ) -> ChunkMessageResult<()> {
        check_chunkable(message, payload.len())?;
        let new_chunk_size = match message {
            RtmpMessage::ChunkLength(length) => Some(length.length()),
            _ => None,
        };

        let message_length = payload.len() as u32;
        let message_type_id: u8 = message.content_type().into();
        let message_header = self.justify_message_header(
            csid,
            timestamp,
            message_length,
            message_type_id,
            message_stream_id,
        );
        let basic_header = ChunkBasicHeader::new(message_header.fmt(), csid)?;
        let continuation_header = ChunkBasicHeader::new(3, csid)?;

        let mut bytes = Vec::with_capacity(payload.len() + 16);
        write_basic_header(&mut bytes, &basic_header)?;
        let extended_timestamp = write_message_header(&mut bytes, &message_header)?;

        let mut chunks = payload.chunks(self.chunk_size);
        if let Some(first) = chunks.next() {
            bytes.extend_from_slice(first);
        }
        for chunk in chunks {
            write_basic_header(&mut bytes, &continuation_header)?;
            if let Some(timestamp) = extended_timestamp {
                bytes.write_u32::<BigEndian>(timestamp)?;
            }
            bytes.extend_from_slice(chunk);
        }
        buffer.extend_from_slice(&bytes);

        self.context.insert(
            csid,
            WriteContext {
                timestamp,
                message_length,
                message_stream_id,
                message_type_id,
            },
        );

        if let Some(size) = new_chunk_size {
            let old_size = self.set_chunk_size(size)?;
            tracing::debug!("outbound chunk size changed from {} to {}", old_size, size);
        }
        Ok(())
    }

    fn justify_message_header(
        &self,
        csid: CSID,
        timestamp: u32,
        message_length: u32,
        message_type_id: u8,
        message_stream_id: u32,
    ) -> ChunkMessageHeader {
        let type0 = || {
            ChunkMessageHeader::Type0(ChunkMessageHeaderType0 {
                timestamp,
                message_length,
                message_type_id,
                message_stream_id,
            })
        };

        // no context at all, this must be the first message of this chunk stream
        let Some(ctx) = self.context.get(&csid) else {
            return type0();
        };
        if ctx.message_stream_id != message_stream_id || timestamp < ctx.timestamp {
            return type0();
        }

        let timestamp_delta = timestamp - ctx.timestamp;
        if ctx.message_length != message_length || ctx.message_type_id != message_type_id {
            return ChunkMessageHeader::Type1(ChunkMessageHeaderType1 {
                timestamp_delta,
                message_length,
                message_type_id,
            });
        }
        ChunkMessageHeader::Type2(ChunkMessageHeaderType2 { timestamp_delta })
    }
}

/// Serializes `message` and checks it can be chunked, no writer state is touched.
pub fn encode_payload(message: &RtmpMessage) -> ChunkMessageResult<Vec<u8>> {
    let payload = message.to_bytes()?;
    check_chunkable(message, payload.len())?;
    Ok(payload)
}

fn check_chunkable(message: &RtmpMessage, payload_len: usize) -> ChunkMessageResult<()> {
    if payload_len > MAX_MESSAGE_LENGTH {
        return Err(ChunkMessageError::InvalidMessage(format!(
            "message too long: {} bytes",
            payload_len
        )));
    }
    match message {
        RtmpMessage::ChunkLength(length) if length.length() < 1 => {
            Err(ChunkMessageError::InvalidMessage(format!(
                "invalid chunk size: {}",
                length.length()
            )))
        }
        _ => Ok(()),
    }
}

fn write_basic_header<W: io::Write>(
    writer: &mut W,
    header: &ChunkBasicHeader,
) -> ChunkMessageResult<()> {
    let fmt_bits = header.fmt << 6;
    match header.header_type {
        ChunkBasicHeaderType::Type1 => {
            writer.write_u8(fmt_bits | header.chunk_stream_id as u8)?;
        }
        ChunkBasicHeaderType::Type2 => {
            writer.write_u8(fmt_bits)?;
            writer.write_u8((header.chunk_stream_id - 64) as u8)?;
        }
        ChunkBasicHeaderType::Type3 => {
            writer.write_u8(fmt_bits | 0b00000001)?;
            writer.write_u16::<LittleEndian>((header.chunk_stream_id - 64) as u16)?;
        }
    }
    Ok(())
}

/// Writes a 24-bit timestamp field, returns the extended timestamp to repeat on
/// continuation chunks.
fn write_timestamp_field<W: io::Write>(writer: &mut W, timestamp: u32) -> io::Result<Option<u32>> {
    if timestamp >= MAX_TIMESTAMP {
        writer.write_u24::<BigEndian>(MAX_TIMESTAMP)?;
        Ok(Some(timestamp))
    } else {
        writer.write_u24::<BigEndian>(timestamp)?;
        Ok(None)
    }
}

fn write_message_header<W: io::Write>(
    writer: &mut W,
    header: &ChunkMessageHeader,
) -> ChunkMessageResult<Option<u32>> {
    let extended_timestamp = match header {
        ChunkMessageHeader::Type0(header) => {
            let extended = write_timestamp_field(writer, header.timestamp)?;
            writer.write_u24::<BigEndian>(header.message_length)?;
            writer.write_u8(header.message_type_id)?;
            writer.write_u32::<LittleEndian>(header.message_stream_id)?;
            extended
        }
        ChunkMessageHeader::Type1(header) => {
            let extended = write_timestamp_field(writer, header.timestamp_delta)?;
            writer.write_u24::<BigEndian>(header.message_length)?;
            writer.write_u8(header.message_type_id)?;
            extended
        }
        ChunkMessageHeader::Type2(header) => write_timestamp_field(writer, header.timestamp_delta)?,
        ChunkMessageHeader::Type3(ChunkMessageHeaderType3 {}) => None,
    };
    if let Some(timestamp) = extended_timestamp {
        writer.write_u32::<BigEndian>(timestamp)?;
    }
    Ok(extended_timestamp)
}

#[cfg(test)]
mod tests {
    use tokio_util::bytes::{Bytes, BytesMut};
    use utils::bytes::hex_to_bytes;

    use super::{Writer, encode_payload};
    use crate::{
        chunk::errors::ChunkMessageError,
        message::RtmpMessage,
        protocol_control::ChunkLength,
    };

    fn audio(len: usize) -> RtmpMessage {
        RtmpMessage::AudioData {
            payload: Bytes::from(vec![0xaf; len]),
        }
    }

    #[test]
    fn first_message_uses_type0() {
        let mut writer = Writer::new();
        let mut buffer = BytesMut::new();
        writer
            .write(
                2,
                0,
                0,
                &RtmpMessage::WindowAcknowledgementSize { count: 2_500_000 },
                &mut buffer,
            )
            .unwrap();
        assert_eq!(
            buffer[..],
            hex_to_bytes("02 000000 000004 05 00000000 002625a0").unwrap()[..]
        );
    }

    #[test]
    fn message_stream_id_is_little_endian() {
        let mut writer = Writer::new();
        let mut buffer = BytesMut::new();
        writer.write(6, 0, 1, &audio(1), &mut buffer).unwrap();
        assert_eq!(buffer[8..12], [0x01, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn header_compression() {
        let mut writer = Writer::new();
        let mut fmts = Vec::new();
        let steps = [
            (0, 0, 10),  // first message
            (20, 0, 10), // same length and type
            (40, 0, 12), // length changed
            (30, 0, 12), // timestamp went backwards
            (50, 1, 12), // another message stream
        ];
        for (timestamp, stream_id, len) in steps {
            let mut buffer = BytesMut::new();
            writer
                .write(6, timestamp, stream_id, &audio(len), &mut buffer)
                .unwrap();
            fmts.push(buffer[0] >> 6);
        }
        assert_eq!(fmts, vec![0, 2, 1, 0, 0]);
    }

    #[test]
    fn large_message_is_split() {
        let mut writer = Writer::new();
        let mut buffer = BytesMut::new();
        writer.write(6, 0, 0, &audio(300), &mut buffer).unwrap();
        assert_eq!(buffer.len(), 12 + 300 + 2);
        assert_eq!(buffer[12 + 128], 0xc6);
        assert_eq!(buffer[12 + 128 + 1 + 128], 0xc6);
    }

    #[test]
    fn chunk_size_applies_after_the_message() {
        let mut writer = Writer::new();
        let mut buffer = BytesMut::new();
        writer
            .write(
                2,
                0,
                0,
                &RtmpMessage::ChunkLength(ChunkLength::new(4096)),
                &mut buffer,
            )
            .unwrap();
        assert_eq!(writer.chunk_size(), 4096);

        let mut buffer = BytesMut::new();
        writer.write(6, 0, 0, &audio(300), &mut buffer).unwrap();
        assert_eq!(buffer.len(), 12 + 300);
    }

    #[test]
    fn invalid_writes_append_nothing() {
        let mut writer = Writer::new();
        let mut buffer = BytesMut::new();
        assert!(matches!(
            writer.write(
                2,
                0,
                0,
                &RtmpMessage::ChunkLength(ChunkLength::new(0)),
                &mut buffer
            ),
            Err(ChunkMessageError::InvalidMessage(_))
        ));
        assert!(matches!(
            writer.write(1, 0, 0, &audio(1), &mut buffer),
            Err(ChunkMessageError::InvalidBasicHeader(_))
        ));
        assert!(matches!(
            writer.write(6, 0, 0, &audio(0x1000000), &mut buffer),
            Err(ChunkMessageError::InvalidMessage(_))
        ));
        assert!(buffer.is_empty());
        assert_eq!(writer.chunk_size(), 128);
    }

    #[test]
    fn encode_payload_rejects_what_write_rejects() {
        assert!(matches!(
            encode_payload(&RtmpMessage::ChunkLength(ChunkLength::new(-1))),
            Err(ChunkMessageError::InvalidMessage(_))
        ));
        assert!(matches!(
            encode_payload(&audio(0x1000000)),
            Err(ChunkMessageError::InvalidMessage(_))
        ));

        let message = audio(300);
        let payload = encode_payload(&message).unwrap();
        let mut encoded = BytesMut::new();
        Writer::new()
            .write_encoded(6, 0, 0, &message, &payload, &mut encoded)
            .unwrap();
        let mut written = BytesMut::new();
        Writer::new().write(6, 0, 0, &message, &mut written).unwrap();
        assert_eq!(encoded, written);
    }
}
