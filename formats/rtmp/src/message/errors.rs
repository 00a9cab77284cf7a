use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtmpMessageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("amf error: {0}")]
    Amf(#[from] amf::errors::AmfError),
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),
    #[error("unknown event type: {0}")]
    UnknownEventType(u16),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
    #[error("unexpected amf type: {0}")]
    UnexpectedAmfType(String),
}

pub type RtmpMessageResult<T> = Result<T, RtmpMessageError>;
