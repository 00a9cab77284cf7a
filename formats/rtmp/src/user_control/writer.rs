use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use utils::traits::writer::WriteTo;

use crate::message::errors::RtmpMessageError;

use super::UserControlMessage;

impl<W: io::Write> WriteTo<W> for UserControlMessage {
    type Error = RtmpMessageError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        let expected = self.event_type.parameter_count();
        if self.values.len() != expected {
            return Err(RtmpMessageError::InvalidMessage(format!(
                "user control event {:?} takes {} values, got {}",
                self.event_type,
                expected,
                self.values.len()
            )));
        }
        writer.write_u16::<BigEndian>(self.event_type.into())?;
        for value in &self.values {
            writer.write_u32::<BigEndian>(*value)?;
        }
        Ok(())
    }
}
