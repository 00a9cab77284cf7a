use std::io;

use byteorder::{BigEndian, ReadBytesExt};
use utils::io::{ReadExactError, ReadExactly, ShortStream};

use crate::errors::{AmfError, AmfResult};

use super::{Value, amf0_marker};

/// Complex values in the order their markers were read, `None` while a value
/// is still being decoded.
#[derive(Debug, Default)]
struct Amf0Referenceable {
    objects: Vec<Option<Value>>,
}

#[derive(Debug)]
pub struct Reader<R> {
    inner: R,
    referenceable: Amf0Referenceable,
}

impl<R> Reader<R> {
    /// Unwraps this `Reader`, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R> Reader<R>
where
    R: io::Read,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            referenceable: Amf0Referenceable::default(),
        }
    }

    /// Reads the next value, `Ok(None)` when the input ends before a marker.
    pub fn read(&mut self) -> AmfResult<Option<Value>> {
        let mut marker = [0u8; 1];
        match self.inner.read_exactly_into(&mut marker) {
            Ok(()) => {}
            Err(ReadExactError::ShortStream(_)) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
        let marker = marker[0];
        let value = match marker {
            amf0_marker::NUMBER => self.read_number()?,
            amf0_marker::BOOLEAN => self.read_boolean()?,
            amf0_marker::STRING => self.read_string()?,
            amf0_marker::OBJECT => self.read_anonymous_object()?,
            amf0_marker::NULL => Value::Null,
            amf0_marker::UNDEFINED => Value::Undefined,
            amf0_marker::REFERENCE => self.read_reference()?,
            amf0_marker::ECMA_ARRAY => self.read_ecma_array()?,
            amf0_marker::OBJECT_END => Value::ObjectEnd,
            amf0_marker::STRICT_ARRAY => self.read_strict_array()?,
            amf0_marker::DATE => self.read_date()?,
            amf0_marker::LONG_STRING => self.read_long_string()?,
            amf0_marker::XML_DOCUMENT => self.read_xml_document()?,
            amf0_marker::TYPED_OBJECT => self.read_typed_object()?,
            amf0_marker::MOVIECLIP
            | amf0_marker::UNSUPPORTED
            | amf0_marker::RECORDSET
            | amf0_marker::AVMPLUS_OBJECT => return Err(AmfError::Unsupported { marker }),
            _ => return Err(AmfError::Unknown { marker }),
        };
        Ok(Some(value))
    }

    pub fn read_all(&mut self) -> AmfResult<Vec<Value>> {
        let mut result = Vec::new();
        while let Some(value) = self.read()? {
            result.push(value);
        }
        Ok(result)
    }

    /// A value that must be there, the end of input is a short stream.
    fn read_required(&mut self) -> AmfResult<Value> {
        self.read()?.ok_or(AmfError::ShortStream(ShortStream {
            expected: 1,
            actual: 0,
        }))
    }

    fn read_number(&mut self) -> AmfResult<Value> {
        let number = self.inner.read_f64::<BigEndian>()?;
        Ok(Value::Number(number))
    }

    fn read_boolean(&mut self) -> AmfResult<Value> {
        let bool = self.inner.read_u8()?;
        Ok(Value::Boolean(bool != 0))
    }

    fn read_utf8_inner(&mut self, len: usize) -> AmfResult<String> {
        let buffer = self.inner.read_exactly(len)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn read_short_utf8_inner(&mut self) -> AmfResult<String> {
        let len = self.inner.read_u16::<BigEndian>()?;
        self.read_utf8_inner(len as usize)
    }

    fn read_long_utf8_inner(&mut self) -> AmfResult<String> {
        let len = self.inner.read_u32::<BigEndian>()?;
        self.read_utf8_inner(len as usize)
    }

    fn read_string(&mut self) -> AmfResult<Value> {
        self.read_short_utf8_inner().map(Value::String)
    }

    fn read_long_string(&mut self) -> AmfResult<Value> {
        self.read_long_utf8_inner().map(Value::String)
    }

    fn read_xml_document(&mut self) -> AmfResult<Value> {
        self.read_long_utf8_inner().map(Value::XMLDocument)
    }

    fn read_key_value_pairs_inner(&mut self) -> AmfResult<Vec<(String, Value)>> {
        let mut result = Vec::new();
        loop {
            let key = self.read_short_utf8_inner()?;
            match self.read_required()? {
                Value::ObjectEnd if key.is_empty() => break,
                value => result.push((key, value)),
            }
        }
        Ok(result)
    }

    fn read_anonymous_object(&mut self) -> AmfResult<Value> {
        self.read_and_record_referenceable_inner(|this| {
            let entries = this.read_key_value_pairs_inner()?;
            Ok(Value::Object {
                name: None,
                entries,
            })
        })
    }

    fn read_typed_object(&mut self) -> AmfResult<Value> {
        self.read_and_record_referenceable_inner(|this| {
            let name = this.read_short_utf8_inner()?;
            let entries = this.read_key_value_pairs_inner()?;
            Ok(Value::Object {
                name: Some(name),
                entries,
            })
        })
    }

    fn read_ecma_array(&mut self) -> AmfResult<Value> {
        self.read_and_record_referenceable_inner(|this| {
            // the count is advisory, entries run until the end marker
            let _count = this.inner.read_u32::<BigEndian>()?;
            let entries = this.read_key_value_pairs_inner()?;
            Ok(Value::ECMAArray(entries))
        })
    }

    fn read_strict_array(&mut self) -> AmfResult<Value> {
        self.read_and_record_referenceable_inner(|this| {
            let len = this.inner.read_u32::<BigEndian>()? as usize;
            let mut values = Vec::with_capacity(len.min(1024));
            for _ in 0..len {
                values.push(this.read_required()?);
            }
            Ok(Value::StrictArray(values))
        })
    }

    fn read_reference(&mut self) -> AmfResult<Value> {
        let index = self.inner.read_u16::<BigEndian>()? as usize;
        match self.referenceable.objects.get(index) {
            None => Err(AmfError::OutOfRangeReference { index }),
            Some(None) => Err(AmfError::CircularReference { index }),
            Some(Some(value)) => Ok(value.clone()),
        }
    }

    fn read_date(&mut self) -> AmfResult<Value> {
        let millis_timestamp = self.inner.read_f64::<BigEndian>()?;
        let _time_zone = self.inner.read_i16::<BigEndian>()?;
        if !millis_timestamp.is_finite() {
            return Err(AmfError::InvalidDate {
                milliseconds: millis_timestamp,
            });
        }
        Ok(Value::Date { millis_timestamp })
    }

    fn read_and_record_referenceable_inner<F>(&mut self, f: F) -> AmfResult<Value>
    where
        F: FnOnce(&mut Self) -> AmfResult<Value>,
    {
        let index = self.referenceable.objects.len();
        self.referenceable.objects.push(None);
        let result = f(self)?;
        self.referenceable.objects[index] = Some(result.clone());
        Ok(result)
    }
}
