use std::io;

use byteorder::{BigEndian, ReadBytesExt};
use utils::traits::reader::ReadFrom;

use crate::message::errors::RtmpMessageError;

use super::{UserControlEventType, UserControlMessage};

impl<R: io::Read> ReadFrom<R> for UserControlMessage {
    type Error = RtmpMessageError;
    fn read_from(reader: &mut R) -> Result<Self, Self::Error> {
        let event_type: UserControlEventType = reader.read_u16::<BigEndian>()?.try_into()?;
        let mut values = Vec::with_capacity(event_type.parameter_count());
        for _ in 0..event_type.parameter_count() {
            values.push(reader.read_u32::<BigEndian>()?);
        }
        Ok(Self { event_type, values })
    }
}
