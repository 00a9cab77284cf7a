use std::io;

use amf::{Value, amf0};
use byteorder::ReadBytesExt;
use utils::traits::reader::ReadRemainingFrom;

use crate::message::{errors::RtmpMessageError, reader::read_opaque};

use super::{Invoke, Notify};

/// Skips the format byte of amf3 tagged payloads.
fn skip_format_prefix<R: io::Read>(
    reader: &mut R,
    encoding: amf::Version,
) -> Result<(), RtmpMessageError> {
    if encoding == amf::Version::Amf3 {
        reader.read_u8()?;
    }
    Ok(())
}

impl<R: io::Read> ReadRemainingFrom<amf::Version, R> for Invoke {
    type Error = RtmpMessageError;
    fn read_remaining_from(encoding: amf::Version, reader: &mut R) -> Result<Self, Self::Error> {
        skip_format_prefix(reader, encoding)?;
        // references are counted across the whole payload
        let mut values = amf0::Reader::new(reader);

        let method_name = match values.read()? {
            Some(Value::String(name)) => name,
            Some(value) => {
                return Err(RtmpMessageError::UnexpectedAmfType(format!(
                    "expect a string method name, got: {:?}",
                    value
                )));
            }
            None => {
                return Err(RtmpMessageError::InvalidMessage(
                    "empty command message".to_string(),
                ));
            }
        };
        let invocation_id = match values.read()? {
            // saturates on out of range ids
            Some(Value::Number(id)) => id as u32,
            Some(value) => {
                return Err(RtmpMessageError::UnexpectedAmfType(format!(
                    "expect a number invocation id, got: {:?}",
                    value
                )));
            }
            None => {
                return Err(RtmpMessageError::InvalidMessage(format!(
                    "command {} has no invocation id",
                    method_name
                )));
            }
        };
        let headers = values.read()?.unwrap_or(Value::Null);
        let arguments = values.read_all()?;

        Ok(Invoke {
            encoding,
            method_name,
            invocation_id,
            headers,
            arguments,
        })
    }
}

impl<R: io::Read> ReadRemainingFrom<amf::Version, R> for Notify {
    type Error = RtmpMessageError;
    fn read_remaining_from(encoding: amf::Version, reader: &mut R) -> Result<Self, Self::Error> {
        skip_format_prefix(reader, encoding)?;
        Ok(Notify::new(encoding, read_opaque(reader)?))
    }
}
