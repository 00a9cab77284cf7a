use std::io;

use byteorder::{BigEndian, WriteBytesExt};
use utils::traits::writer::WriteTo;

use crate::errors::{AmfError, AmfResult};

use super::{Value, amf0_marker};

impl<W: io::Write> WriteTo<W> for Value {
    type Error = AmfError;
    fn write_to(&self, writer: &mut W) -> Result<(), Self::Error> {
        match self {
            Value::Number(n) => Self::write_number(writer, *n),
            Value::Boolean(b) => Self::write_boolean(writer, *b),
            Value::String(s) => Self::write_string(writer, s),
            Value::Object { name, entries } => match name {
                Some(name) => Self::write_typed_object(writer, name, entries),
                None => Self::write_anonymous_object(writer, entries),
            },
            Value::Null => Self::write_null(writer),
            Value::Undefined => Self::write_undefined(writer),
            Value::Reference { index } => Self::write_reference(writer, *index),
            Value::ECMAArray(entries) => Self::write_ecma_array(writer, entries),
            Value::ObjectEnd => Self::write_object_end(writer),
            Value::StrictArray(values) => Self::write_strict_array(writer, values),
            Value::Date { millis_timestamp } => Self::write_date(writer, *millis_timestamp),
            Value::XMLDocument(xml) => Self::write_xml(writer, xml),
        }
    }
}

fn u32_length(len: usize, what: &str) -> AmfResult<u32> {
    u32::try_from(len)
        .map_err(|_| AmfError::UnsupportedValue(format!("{} too long: {}", what, len)))
}

impl Value {
    pub fn write_number<W: io::Write>(writer: &mut W, v: f64) -> AmfResult<()> {
        writer.write_u8(amf0_marker::NUMBER)?;
        writer.write_f64::<BigEndian>(v)?;
        Ok(())
    }

    pub fn write_boolean<W: io::Write>(writer: &mut W, v: bool) -> AmfResult<()> {
        writer.write_u8(amf0_marker::BOOLEAN)?;
        writer.write_u8(v as u8)?;
        Ok(())
    }

    /// Bare u16-prefixed utf8, used for object keys and class names.
    fn write_short_string_inner<W: io::Write>(writer: &mut W, v: &str) -> AmfResult<()> {
        let len = u16::try_from(v.len()).map_err(|_| {
            AmfError::UnsupportedValue(format!("object key too long: {} bytes", v.len()))
        })?;
        writer.write_u16::<BigEndian>(len)?;
        writer.write_all(v.as_bytes())?;
        Ok(())
    }

    fn write_long_string_inner<W: io::Write>(writer: &mut W, v: &str) -> AmfResult<()> {
        writer.write_u32::<BigEndian>(u32_length(v.len(), "long string")?)?;
        writer.write_all(v.as_bytes())?;
        Ok(())
    }

    pub fn write_string<W: io::Write>(writer: &mut W, v: &str) -> AmfResult<()> {
        if v.len() <= u16::MAX as usize {
            writer.write_u8(amf0_marker::STRING)?;
            Self::write_short_string_inner(writer, v)?;
        } else {
            writer.write_u8(amf0_marker::LONG_STRING)?;
            Self::write_long_string_inner(writer, v)?;
        }
        Ok(())
    }

    fn write_pairs_inner<W: io::Write>(
        writer: &mut W,
        entries: &[(String, Value)],
    ) -> AmfResult<()> {
        for (key, value) in entries {
            Self::write_short_string_inner(writer, key)?;
            value.write_to(writer)?;
        }
        writer.write_u16::<BigEndian>(0)?;
        writer.write_u8(amf0_marker::OBJECT_END)?;
        Ok(())
    }

    pub fn write_anonymous_object<W: io::Write>(
        writer: &mut W,
        entries: &[(String, Value)],
    ) -> AmfResult<()> {
        writer.write_u8(amf0_marker::OBJECT)?;
        Self::write_pairs_inner(writer, entries)
    }

    pub fn write_typed_object<W: io::Write>(
        writer: &mut W,
        name: &str,
        entries: &[(String, Value)],
    ) -> AmfResult<()> {
        writer.write_u8(amf0_marker::TYPED_OBJECT)?;
        Self::write_short_string_inner(writer, name)?;
        Self::write_pairs_inner(writer, entries)
    }

    pub fn write_null<W: io::Write>(writer: &mut W) -> AmfResult<()> {
        writer.write_u8(amf0_marker::NULL)?;
        Ok(())
    }

    pub fn write_undefined<W: io::Write>(writer: &mut W) -> AmfResult<()> {
        writer.write_u8(amf0_marker::UNDEFINED)?;
        Ok(())
    }

    pub fn write_reference<W: io::Write>(writer: &mut W, index: u16) -> AmfResult<()> {
        writer.write_u8(amf0_marker::REFERENCE)?;
        writer.write_u16::<BigEndian>(index)?;
        Ok(())
    }

    pub fn write_ecma_array<W: io::Write>(
        writer: &mut W,
        entries: &[(String, Value)],
    ) -> AmfResult<()> {
        let count = u32_length(entries.len(), "ecma array")?;
        writer.write_u8(amf0_marker::ECMA_ARRAY)?;
        writer.write_u32::<BigEndian>(count)?;
        Self::write_pairs_inner(writer, entries)
    }

    fn write_object_end<W: io::Write>(writer: &mut W) -> AmfResult<()> {
        writer.write_u8(amf0_marker::OBJECT_END)?;
        Ok(())
    }

    pub fn write_strict_array<W: io::Write>(writer: &mut W, values: &[Value]) -> AmfResult<()> {
        let count = u32_length(values.len(), "strict array")?;
        writer.write_u8(amf0_marker::STRICT_ARRAY)?;
        writer.write_u32::<BigEndian>(count)?;
        for v in values {
            v.write_to(writer)?;
        }
        Ok(())
    }

    /// The timezone field is always written as zero.
    pub fn write_date<W: io::Write>(writer: &mut W, millis_timestamp: f64) -> AmfResult<()> {
        writer.write_u8(amf0_marker::DATE)?;
        writer.write_f64::<BigEndian>(millis_timestamp)?;
        writer.write_i16::<BigEndian>(0x0000)?;
        Ok(())
    }

    pub fn write_xml<W: io::Write>(writer: &mut W, xml: &str) -> AmfResult<()> {
        writer.write_u8(amf0_marker::XML_DOCUMENT)?;
        Self::write_long_string_inner(writer, xml)
    }
}
