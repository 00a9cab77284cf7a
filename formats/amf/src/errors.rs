use std::{io, string};

use thiserror::Error;
use utils::io::{ReadExactError, ShortStream};

#[derive(Error, Debug)]
pub enum AmfError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("{0}")]
    ShortStream(#[from] ShortStream),
    #[error("invalid utf8 data: {0}")]
    InvalidUtf8(#[from] string::FromUtf8Error),
    #[error("unsupported amf value marker: {marker}")]
    Unsupported { marker: u8 },
    #[error("unknown marker: {marker}")]
    Unknown { marker: u8 },
    #[error("index of reference out of range, index: {index}")]
    OutOfRangeReference { index: usize },
    #[error("circular reference not supported, index: {index}")]
    CircularReference { index: usize },
    #[error("invalid value for a unix date: {milliseconds}")]
    InvalidDate { milliseconds: f64 },
    #[error("unknown amf version: {0}")]
    UnknownVersion(u8),
    #[error("value has no amf0 encoding: {0}")]
    UnsupportedValue(String),
}

impl AmfError {
    /// True when the input ended in the middle of a value.
    pub fn is_short_stream(&self) -> bool {
        match self {
            AmfError::ShortStream(_) => true,
            AmfError::Io(err) => err.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

impl From<ReadExactError> for AmfError {
    fn from(value: ReadExactError) -> Self {
        match value {
            ReadExactError::Io(err) => AmfError::Io(err),
            ReadExactError::ShortStream(short) => AmfError::ShortStream(short),
        }
    }
}

impl serde::ser::Error for AmfError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        AmfError::UnsupportedValue(msg.to_string())
    }
}

pub type AmfResult<T> = Result<T, AmfError>;
