use std::io;

use config::ConfigError;
use rtmp_formats::{chunk::errors::ChunkMessageError, commands::InvocationFault};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RtmpSessionError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("chunk error: {0}")]
    Chunk(#[from] ChunkMessageError),
    #[error("amf error: {0}")]
    Amf(#[from] amf::errors::AmfError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("session closed")]
    SessionClosed,
}

pub type RtmpSessionResult<T> = Result<T, RtmpSessionError>;

/// Failure delivered to the caller of an invocation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvokeError {
    /// The peer answered with `_error`.
    #[error("invocation fault: {0}")]
    Fault(InvocationFault),
    /// The session ended before a reply arrived.
    #[error("connection closed: {reason}")]
    ConnectionClosed { reason: String },
}
