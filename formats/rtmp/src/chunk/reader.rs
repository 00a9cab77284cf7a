use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use std::{cmp::min, collections::HashMap};
use tokio_util::bytes::{Buf, BytesMut};

use crate::{
    chunk::errors::ChunkMessageError,
    message::{ContentType, RtmpMessage},
};

use super::{
    CSID, ChunkBasicHeader, ChunkMessage, ChunkMessageCommonHeader, ChunkMessageHeader,
    ChunkMessageHeaderType0, ChunkMessageHeaderType1, ChunkMessageHeaderType2,
    ChunkMessageHeaderType3,
    consts::{DEFAULT_CHUNK_SIZE, MAX_TIMESTAMP},
    errors::ChunkMessageResult,
};

/// Header state carried from one chunk to the next on the same chunk stream.
#[derive(Debug, Default, Clone, Copy)]
struct HeaderState {
    timestamp: u32,
    timestamp_delta: u32,
    extended_timestamp_enabled: bool,
    message_length: u32,
    message_stream_id: u32,
    message_type_id: u8,
}

#[derive(Debug, Default)]
struct ReadContext {
    header: HeaderState,
    incomplete_message: Option<BytesMut>,
}

enum ReadStep {
    NeedMoreData,
    ChunkConsumed,
    Message(ChunkMessage),
}

type ChunkStreamReadContext = HashMap<CSID, ReadContext>;

/// Reassembles messages from the chunks of all chunk streams, in arrival order.
#[derive(Debug)]
pub struct Reader {
    context: ChunkStreamReadContext,
    chunk_size: usize,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reader {
    pub fn new() -> Self {
        Self {
            context: HashMap::new(),
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

    pub fn abort_chunk_message(&mut self, csid: CSID) {
        if let Some(ctx) = self.context.get_mut(&csid) {
            ctx.incomplete_message = None;
        }
    }

    /// Consumes whole chunks from the front of `buffer` until a message completes.
    ///
    /// A trailing incomplete chunk is left untouched, `Ok(None)` means more
    /// bytes are needed. Set chunk size and abort messages are applied here
    /// and still returned.
    pub fn read(&mut self, buffer: &mut BytesMut) -> ChunkMessageResult<Option<ChunkMessage>> {
        loop {
            match self.read_chunk(buffer)? {
                ReadStep::NeedMoreData => return Ok(None),
                ReadStep::ChunkConsumed => continue,
                ReadStep::Message(message) => return Ok(Some(message)),
            }
        }
    }

    fn read_chunk(&mut self, buffer: &mut BytesMut) -> ChunkMessageResult<ReadStep> {
        let mut rest: &[u8] = &buffer[..];

        let Some(basic_header) = read_basic_header(&mut rest)? else {
            return Ok(ReadStep::NeedMoreData);
        };
        let csid = basic_header.chunk_stream_id;
        let fmt = basic_header.fmt;

        let (mut state, in_progress) = match self.context.get(&csid) {
            Some(ctx) => (
                ctx.header,
                ctx.incomplete_message.as_ref().map(|payload| payload.len()),
            ),
            None if fmt == 0 => (HeaderState::default(), None),
            None => {
                tracing::error!(
                    "chunk stream {} starts with a type {} message header",
                    csid,
                    fmt
                );
                return Err(ChunkMessageError::NeedContext(csid));
            }
        };

        let Some(message_header) =
            read_message_header(&mut rest, fmt, state.extended_timestamp_enabled)?
        else {
            return Ok(ReadStep::NeedMoreData);
        };

        let continuation = fmt == 3 && in_progress.is_some();
        match message_header {
            (ChunkMessageHeader::Type0(header0), extended) => {
                state.timestamp = header0.timestamp;
                state.timestamp_delta = header0.timestamp;
                state.extended_timestamp_enabled = extended;
                state.message_length = header0.message_length;
                state.message_type_id = header0.message_type_id;
                state.message_stream_id = header0.message_stream_id;
            }
            (ChunkMessageHeader::Type1(header1), extended) => {
                state.timestamp_delta = header1.timestamp_delta;
                state.timestamp = state.timestamp.wrapping_add(header1.timestamp_delta);
                state.extended_timestamp_enabled = extended;
                state.message_length = header1.message_length;
                state.message_type_id = header1.message_type_id;
            }
            (ChunkMessageHeader::Type2(header2), extended) => {
                state.timestamp_delta = header2.timestamp_delta;
                state.timestamp = state.timestamp.wrapping_add(header2.timestamp_delta);
                state.extended_timestamp_enabled = extended;
            }
            (ChunkMessageHeader::Type3(_), _) => {
                if !continuation {
                    state.timestamp = state.timestamp.wrapping_add(state.timestamp_delta);
                }
            }
        }

        let total_length = state.message_length as usize;
        let received = if continuation {
            in_progress.unwrap_or(0)
        } else {
            0
        };
        let bytes_need = min(self.chunk_size, total_length - received);
        if rest.len() < bytes_need {
            return Ok(ReadStep::NeedMoreData);
        }
        let consumed = buffer.len() - rest.len() + bytes_need;

        let ctx = self.context.entry(csid).or_default();
        if !continuation && ctx.incomplete_message.is_some() {
            tracing::warn!(
                "chunk stream {} starts a new message before the previous one completes",
                csid
            );
        }
        ctx.header = state;
        let mut payload = match ctx.incomplete_message.take() {
            Some(payload) if continuation => payload,
            _ => BytesMut::with_capacity(total_length),
        };
        payload.extend_from_slice(&rest[..bytes_need]);
        buffer.advance(consumed);

        if payload.len() < total_length {
            ctx.incomplete_message = Some(payload);
            return Ok(ReadStep::ChunkConsumed);
        }

        let header = ChunkMessageCommonHeader {
            chunk_stream_id: csid,
            timestamp: state.timestamp,
            message_length: state.message_length,
            message_type_id: state.message_type_id,
            message_stream_id: state.message_stream_id,
        };
        let content_type = ContentType::try_from(state.message_type_id)?;
        let message = RtmpMessage::read_from(content_type, &payload[..]).map_err(|err| {
            match content_type {
                // the chunk layer depends on these two
                ContentType::SetChunkSize | ContentType::AbortMessage => {
                    ChunkMessageError::InvalidMessage(format!(
                        "undecodable {:?} payload: {}",
                        content_type, err
                    ))
                }
                _ => ChunkMessageError::Message(err),
            }
        })?;
        self.apply_control_message(&message)?;

        Ok(ReadStep::Message(ChunkMessage { header, message }))
    }

    fn apply_control_message(&mut self, message: &RtmpMessage) -> ChunkMessageResult<()> {
        match message {
            RtmpMessage::ChunkLength(length) => {
                let old_size = self.set_chunk_size(length.length())?;
                tracing::debug!(
                    "inbound chunk size changed from {} to {}",
                    old_size,
                    self.chunk_size
                );
            }
            RtmpMessage::Abort { chunk_stream_id } => {
                tracing::debug!("abort message on chunk stream {}", chunk_stream_id);
                self.abort_chunk_message(*chunk_stream_id);
            }
            _ => {}
        }
        Ok(())
    }
}

fn read_basic_header(reader: &mut &[u8]) -> ChunkMessageResult<Option<ChunkBasicHeader>> {
    if reader.is_empty() {
        return Ok(None);
    }

    let first_byte = reader.read_u8()?;

    let fmt = (first_byte >> 6) & 0b11;
    let csid = match (first_byte & 0b00111111) as u32 {
        0 => {
            if reader.is_empty() {
                return Ok(None);
            }
            reader.read_u8()? as u32 + 64
        }
        1 => {
            if reader.len() < 2 {
                return Ok(None);
            }
            reader.read_u16::<LittleEndian>()? as u32 + 64
        }
        csid => csid,
    };
    Ok(Some(ChunkBasicHeader::new(fmt, csid)?))
}

/// Replaces a saturated 24-bit timestamp field with the extended timestamp following the header.
fn resolve_timestamp(reader: &mut &[u8], field: u32) -> ChunkMessageResult<Option<(u32, bool)>> {
    if field < MAX_TIMESTAMP {
        return Ok(Some((field, false)));
    }
    Ok(read_extended_timestamp(reader)?.map(|timestamp| (timestamp, true)))
}

fn read_extended_timestamp(reader: &mut &[u8]) -> ChunkMessageResult<Option<u32>> {
    if reader.len() < 4 {
        return Ok(None);
    }
    Ok(Some(reader.read_u32::<BigEndian>()?))
}

/// The flag tells whether an extended timestamp field was present.
fn read_message_header(
    reader: &mut &[u8],
    fmt: u8,
    extended_timestamp_enabled: bool,
) -> ChunkMessageResult<Option<(ChunkMessageHeader, bool)>> {
    match fmt {
        0 => {
            if reader.len() < 11 {
                return Ok(None);
            }
            let timestamp = reader.read_u24::<BigEndian>()?;
            let message_length = reader.read_u24::<BigEndian>()?;
            let message_type_id = reader.read_u8()?;
            let message_stream_id = reader.read_u32::<LittleEndian>()?;
            let Some((timestamp, extended)) = resolve_timestamp(reader, timestamp)? else {
                return Ok(None);
            };
            Ok(Some((
                ChunkMessageHeader::Type0(ChunkMessageHeaderType0 {
                    timestamp,
                    message_length,
                    message_type_id,
                    message_stream_id,
                }),
                extended,
            )))
        }
        1 => {
            if reader.len() < 7 {
                return Ok(None);
            }
            let timestamp_delta = reader.read_u24::<BigEndian>()?;
            let message_length = reader.read_u24::<BigEndian>()?;
            let message_type_id = reader.read_u8()?;
            let Some((timestamp_delta, extended)) = resolve_timestamp(reader, timestamp_delta)?
            else {
                return Ok(None);
            };
            Ok(Some((
                ChunkMessageHeader::Type1(ChunkMessageHeaderType1 {
                    timestamp_delta,
                    message_length,
                    message_type_id,
                }),
                extended,
            )))
        }
        2 => {
            if reader.len() < 3 {
                return Ok(None);
            }
            let timestamp_delta = reader.read_u24::<BigEndian>()?;
            let Some((timestamp_delta, extended)) = resolve_timestamp(reader, timestamp_delta)?
            else {
                return Ok(None);
            };
            Ok(Some((
                ChunkMessageHeader::Type2(ChunkMessageHeaderType2 { timestamp_delta }),
                extended,
            )))
        }
        3 => {
            // repeated extended timestamp of the previous header
            if extended_timestamp_enabled && read_extended_timestamp(reader)?.is_none() {
                return Ok(None);
            }
            Ok(Some((
                ChunkMessageHeader::Type3(ChunkMessageHeaderType3 {}),
                extended_timestamp_enabled,
            )))
        }
        _ => Err(ChunkMessageError::UnexpectedFmt(fmt)),
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::bytes::{Bytes, BytesMut};
    use utils::bytes::hex_to_bytes;

    use super::Reader;
    use crate::{
        chunk::{default_csid, errors::ChunkMessageError, writer::Writer},
        commands::{Invoke, Notify},
        message::{RtmpMessage, errors::RtmpMessageError},
        protocol_control::{ChunkLength, PeerBandwidthLimitType},
        user_control::UserControlMessage,
    };

    fn encode(writer: &mut Writer, timestamp: u32, message: &RtmpMessage) -> BytesMut {
        let mut buffer = BytesMut::new();
        writer
            .write(default_csid(message), timestamp, 0, message, &mut buffer)
            .unwrap();
        buffer
    }

    fn read_all(reader: &mut Reader, buffer: &mut BytesMut) -> Vec<RtmpMessage> {
        let mut messages = Vec::new();
        while let Some(message) = reader.read(buffer).unwrap() {
            messages.push(message.message);
        }
        messages
    }

    #[test]
    fn every_message_kind_survives_chunking() {
        let messages = vec![
            RtmpMessage::WindowAcknowledgementSize { count: 2_500_000 },
            RtmpMessage::PeerBandwidth {
                ack_window_size: 2_500_000,
                limit_type: PeerBandwidthLimitType::Dynamic,
            },
            RtmpMessage::UserControl(UserControlMessage::stream_begin(0)),
            RtmpMessage::Invoke(Invoke::new(
                "connect",
                1,
                amf::Value::Null,
                vec![amf::amf0::object([("app", amf::amf0::string("live"))])],
            )),
            RtmpMessage::Notify(
                Notify::from_values(
                    amf::Version::Amf0,
                    &[amf::amf0::string("onMetaData"), amf::amf0::number(30)],
                )
                .unwrap(),
            ),
            RtmpMessage::AudioData {
                payload: Bytes::from(vec![0xaf; 300]),
            },
            RtmpMessage::VideoData {
                payload: Bytes::from(vec![0x17; 1000]),
            },
            RtmpMessage::Acknowledgement {
                sequence_number: 7,
            },
        ];
        let mut writer = Writer::new();
        let mut buffer = BytesMut::new();
        for (timestamp, message) in messages.iter().enumerate() {
            buffer.extend_from_slice(&encode(&mut writer, timestamp as u32 * 10, message));
        }

        let mut reader = Reader::new();
        assert_eq!(read_all(&mut reader, &mut buffer), messages);
        assert!(buffer.is_empty());
    }

    #[test]
    fn timestamps_are_resolved() {
        let mut writer = Writer::new();
        let mut buffer = BytesMut::new();
        for timestamp in [0, 40, 80, 20] {
            buffer.extend_from_slice(&encode(
                &mut writer,
                timestamp,
                &RtmpMessage::AudioData {
                    payload: Bytes::from_static(&[1, 2, 3]),
                },
            ));
        }
        let mut reader = Reader::new();
        let mut timestamps = Vec::new();
        while let Some(message) = reader.read(&mut buffer).unwrap() {
            assert_eq!(message.header.chunk_stream_id, 6);
            assert_eq!(message.header.message_length, 3);
            timestamps.push(message.header.timestamp);
        }
        assert_eq!(timestamps, vec![0, 40, 80, 20]);
    }

    #[test]
    fn extended_timestamp() {
        let mut writer = Writer::new();
        let message = RtmpMessage::VideoData {
            payload: Bytes::from(vec![0x27; 200]),
        };
        let mut buffer = encode(&mut writer, 0x01020304, &message);
        // type 0 header, extended timestamp, 128 bytes, then type 3 with the extended timestamp again
        assert_eq!(
            buffer[..16],
            hex_to_bytes("07 ffffff 0000c8 09 00000000 01020304").unwrap()[..]
        );
        assert_eq!(
            buffer[16 + 128..16 + 128 + 5],
            hex_to_bytes("c7 01020304").unwrap()[..]
        );
        buffer.extend_from_slice(&encode(&mut writer, 0x01020310, &message));

        let mut reader = Reader::new();
        let first = reader.read(&mut buffer).unwrap().unwrap();
        assert_eq!(first.header.timestamp, 0x01020304);
        assert_eq!(first.message, message);
        let second = reader.read(&mut buffer).unwrap().unwrap();
        assert_eq!(second.header.timestamp, 0x01020310);
        assert_eq!(second.message, message);
        assert!(buffer.is_empty());
    }

    #[test]
    fn chunk_size_change_mid_stream() {
        let mut writer = Writer::new();
        let video = RtmpMessage::VideoData {
            payload: Bytes::from(vec![0x17; 1000]),
        };
        let mut buffer = encode(&mut writer, 0, &video);
        let small_chunks = buffer.len();
        buffer.extend_from_slice(&encode(
            &mut writer,
            0,
            &RtmpMessage::ChunkLength(ChunkLength::new(4096)),
        ));
        let tail = encode(&mut writer, 10, &video);
        // one chunk once the larger size is in effect
        assert_eq!(tail.len(), 1 + 3 + 1000);
        assert!(small_chunks > tail.len());
        buffer.extend_from_slice(&tail);

        let mut reader = Reader::new();
        let messages = read_all(&mut reader, &mut buffer);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2], video);
        assert_eq!(reader.chunk_size(), 4096);
    }

    #[test]
    fn incomplete_chunk_consumes_nothing() {
        let mut writer = Writer::new();
        let message = RtmpMessage::Invoke(Invoke::new(
            "createStream",
            2,
            amf::Value::Null,
            vec![],
        ));
        let encoded = encode(&mut writer, 0, &message);

        let mut reader = Reader::new();
        for split in [1, 5, 12, encoded.len() - 1] {
            let mut buffer = BytesMut::from(&encoded[..split]);
            assert!(reader.read(&mut buffer).unwrap().is_none());
            assert_eq!(buffer.len(), split);
        }

        let mut buffer = BytesMut::from(&encoded[..10]);
        assert!(reader.read(&mut buffer).unwrap().is_none());
        buffer.extend_from_slice(&encoded[10..]);
        assert_eq!(reader.read(&mut buffer).unwrap().unwrap().message, message);
        assert!(buffer.is_empty());
    }

    #[test]
    fn partial_message_across_reads() {
        let mut writer = Writer::new();
        let message = RtmpMessage::AudioData {
            payload: Bytes::from(vec![0xaf; 300]),
        };
        let encoded = encode(&mut writer, 0, &message);

        let mut reader = Reader::new();
        // the first complete chunk is consumed, the second half chunk is kept
        let mut buffer = BytesMut::from(&encoded[..12 + 128 + 50]);
        assert!(reader.read(&mut buffer).unwrap().is_none());
        assert_eq!(buffer.len(), 50);
        buffer.extend_from_slice(&encoded[12 + 128 + 50..]);
        assert_eq!(reader.read(&mut buffer).unwrap().unwrap().message, message);
    }

    #[test]
    fn header_without_context() {
        let mut buffer = BytesMut::from(&hex_to_bytes("43 000000 000001 08 00").unwrap()[..]);
        let mut reader = Reader::new();
        assert!(matches!(
            reader.read(&mut buffer),
            Err(ChunkMessageError::NeedContext(3))
        ));
    }

    #[test]
    fn unknown_message_type_keeps_stream_aligned() {
        let mut buffer =
            BytesMut::from(&hex_to_bytes("03 000000 000002 07 00000000 aabb").unwrap()[..]);
        let mut writer = Writer::new();
        let ack = RtmpMessage::Acknowledgement {
            sequence_number: 1,
        };
        buffer.extend_from_slice(&encode(&mut writer, 0, &ack));

        let mut reader = Reader::new();
        let err = reader.read(&mut buffer).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            ChunkMessageError::Message(RtmpMessageError::UnknownMessageType(7))
        ));
        assert_eq!(reader.read(&mut buffer).unwrap().unwrap().message, ack);
    }

    #[test]
    fn unknown_user_control_event_keeps_stream_aligned() {
        // user control event 31 with a four byte body
        let mut buffer =
            BytesMut::from(&hex_to_bytes("02 000000 000006 04 00000000 001f00000001").unwrap()[..]);
        let mut writer = Writer::new();
        let ack = RtmpMessage::Acknowledgement {
            sequence_number: 2,
        };
        buffer.extend_from_slice(&encode(&mut writer, 0, &ack));

        let mut reader = Reader::new();
        let err = reader.read(&mut buffer).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            ChunkMessageError::Message(RtmpMessageError::UnknownEventType(31))
        ));
        assert_eq!(reader.read(&mut buffer).unwrap().unwrap().message, ack);
        assert!(buffer.is_empty());
    }

    #[test]
    fn truncated_abort_payload_is_fatal() {
        let mut buffer =
            BytesMut::from(&hex_to_bytes("02 000000 000002 02 00000000 0001").unwrap()[..]);
        let mut reader = Reader::new();
        let err = reader.read(&mut buffer).unwrap_err();
        assert!(matches!(err, ChunkMessageError::InvalidMessage(_)));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn invalid_chunk_size_is_rejected() {
        // set chunk size -1, written by hand since the writer refuses it
        let mut buffer =
            BytesMut::from(&hex_to_bytes("02 000000 000004 01 00000000 ffffffff").unwrap()[..]);
        let mut reader = Reader::new();
        let err = reader.read(&mut buffer).unwrap_err();
        assert!(matches!(err, ChunkMessageError::InvalidMessage(_)));
        assert!(!err.is_recoverable());
        assert_eq!(reader.chunk_size(), 128);
    }

    #[test]
    fn abort_drops_the_partial_message() {
        let mut writer = Writer::new();
        let audio = RtmpMessage::AudioData {
            payload: Bytes::from(vec![0xaf; 300]),
        };
        let encoded = encode(&mut writer, 0, &audio);
        let mut buffer = BytesMut::from(&encoded[..12 + 128]);
        buffer.extend_from_slice(&encode(
            &mut writer,
            0,
            &RtmpMessage::Abort { chunk_stream_id: 6 },
        ));
        let small = RtmpMessage::AudioData {
            payload: Bytes::from_static(&[1, 2]),
        };
        buffer.extend_from_slice(&encode(&mut writer, 10, &small));

        let mut reader = Reader::new();
        assert_eq!(
            reader.read(&mut buffer).unwrap().unwrap().message,
            RtmpMessage::Abort { chunk_stream_id: 6 }
        );
        let next = reader.read(&mut buffer).unwrap().unwrap();
        assert_eq!(next.message, small);
        assert_eq!(next.header.timestamp, 10);
        assert!(buffer.is_empty());
    }

    #[test]
    fn two_and_three_byte_basic_headers() {
        let ack = RtmpMessage::Acknowledgement {
            sequence_number: 9,
        };
        let mut writer = Writer::new();
        let mut buffer = BytesMut::new();
        writer.write(64, 0, 0, &ack, &mut buffer).unwrap();
        assert_eq!(buffer[..2], [0x00, 0x00]);
        let first_len = buffer.len();
        writer.write(320, 0, 0, &ack, &mut buffer).unwrap();
        assert_eq!(buffer[first_len..first_len + 3], [0x01, 0x00, 0x01]);

        let mut reader = Reader::new();
        let first = reader.read(&mut buffer).unwrap().unwrap();
        assert_eq!(first.header.chunk_stream_id, 64);
        let second = reader.read(&mut buffer).unwrap().unwrap();
        assert_eq!(second.header.chunk_stream_id, 320);
        assert_eq!(second.message, ack);
    }
}
