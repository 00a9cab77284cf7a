use std::io;

use amf::Value;
use byteorder::WriteBytesExt;
use utils::traits::writer::WriteTo;

use crate::message::errors::RtmpMessageError;

use super::{Invoke, Notify, consts::AMF3_FORMAT_PREFIX};

fn write_format_prefix<W: io::Write>(
    writer: &mut W,
    encoding: amf::Version,
) -> Result<(), RtmpMessageError> {
    if encoding == amf::Version::Amf3 {
        writer.write_u8(AMF3_FORMAT_PREFIX)?;
    }
    Ok(())
}

impl<W: io::Write> WriteTo<W> for Invoke {
    type Error = RtmpMessageError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        write_format_prefix(writer, self.encoding)?;
        Value::write_string(writer, &self.method_name)?;
        Value::write_number(writer, self.invocation_id as f64)?;
        self.headers.write_to(writer)?;
        Value::write_all(writer, &self.arguments)?;
        Ok(())
    }
}

impl<W: io::Write> WriteTo<W> for Notify {
    type Error = RtmpMessageError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        write_format_prefix(writer, self.encoding)?;
        writer.write_all(&self.payload)?;
        Ok(())
    }
}
