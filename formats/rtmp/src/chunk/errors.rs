use std::io;

use thiserror::Error;

use crate::message::errors::RtmpMessageError;

#[derive(Debug, Error)]
pub enum ChunkMessageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("message error: {0}")]
    Message(#[from] RtmpMessageError),
    #[error("unexpected fmt bits: {0:#b}")]
    UnexpectedFmt(u8),
    #[error("invalid csid: {0}")]
    InvalidBasicHeader(String),
    #[error("need context for chunk stream: {0}")]
    NeedContext(u32),
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ChunkMessageError {
    /// The offending message was fully consumed, the chunk stream is still aligned.
    ///
    /// Only payload decode failures qualify, undecodable set chunk size and
    /// abort payloads are reported as [`ChunkMessageError::InvalidMessage`].
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ChunkMessageError::Message(_))
    }
}

pub type ChunkMessageResult<T> = Result<T, ChunkMessageError>;
