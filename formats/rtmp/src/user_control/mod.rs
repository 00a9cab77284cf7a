use crate::message::errors::RtmpMessageError;

pub mod reader;
pub mod writer;

///! @see: 7.1.7. User Control Message Events
/// +------------------------------+-------------------------
/// |     Event Type (16 bits)     | Event Data
/// +------------------------------+-------------------------
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserControlEventType {
    StreamBegin = 0,
    StreamEof = 1,
    StreamDry = 2,
    SetBufferLength = 3,
    StreamIsRecorded = 4,
    PingRequest = 6,
    PingResponse = 7,
}

impl UserControlEventType {
    /// Number of 4-byte values in the event data.
    pub fn parameter_count(&self) -> usize {
        match self {
            // stream id, buffer length in millis
            UserControlEventType::SetBufferLength => 2,
            _ => 1,
        }
    }
}

impl From<UserControlEventType> for u16 {
    fn from(value: UserControlEventType) -> Self {
        value as u16
    }
}

impl TryFrom<u16> for UserControlEventType {
    type Error = RtmpMessageError;
    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(UserControlEventType::StreamBegin),
            1 => Ok(UserControlEventType::StreamEof),
            2 => Ok(UserControlEventType::StreamDry),
            3 => Ok(UserControlEventType::SetBufferLength),
            4 => Ok(UserControlEventType::StreamIsRecorded),
            6 => Ok(UserControlEventType::PingRequest),
            7 => Ok(UserControlEventType::PingResponse),
            _ => Err(RtmpMessageError::UnknownEventType(value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserControlMessage {
    pub event_type: UserControlEventType,
    pub values: Vec<u32>,
}

impl UserControlMessage {
    pub fn new(event_type: UserControlEventType, values: Vec<u32>) -> Self {
        Self { event_type, values }
    }

    pub fn stream_begin(stream_id: u32) -> Self {
        Self::new(UserControlEventType::StreamBegin, vec![stream_id])
    }

    pub fn set_buffer_length(stream_id: u32, buffer_length: u32) -> Self {
        Self::new(
            UserControlEventType::SetBufferLength,
            vec![stream_id, buffer_length],
        )
    }

    pub fn ping_request(timestamp: u32) -> Self {
        Self::new(UserControlEventType::PingRequest, vec![timestamp])
    }

    pub fn ping_response(timestamp: u32) -> Self {
        Self::new(UserControlEventType::PingResponse, vec![timestamp])
    }

    /// Stream id for the stream events, the timestamp for pings.
    pub fn first_value(&self) -> Option<u32> {
        self.values.first().copied()
    }
}
