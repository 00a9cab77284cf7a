//! Fallback preparation for any `serde::Serialize` value.
//!
//! Structs become typed objects named after the struct, string keyed maps
//! become ecma arrays, sequences and tuples become strict arrays. Byte
//! buffers and maps with non-string keys have no amf0 form.
use serde::{
    Serialize,
    ser::{self, Impossible},
};

use crate::errors::{AmfError, AmfResult};

use super::Value;

pub fn to_value<T: ?Sized + Serialize>(value: &T) -> AmfResult<Value> {
    value.serialize(ValueSerializer)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = AmfError;

    type SerializeSeq = SeqSerializer;
    type SerializeTuple = SeqSerializer;
    type SerializeTupleStruct = SeqSerializer;
    type SerializeTupleVariant = TupleVariantSerializer;
    type SerializeMap = MapSerializer;
    type SerializeStruct = ObjectSerializer;
    type SerializeStructVariant = ObjectSerializer;

    fn serialize_bool(self, v: bool) -> AmfResult<Value> {
        Ok(Value::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_i16(self, v: i16) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_i32(self, v: i32) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_i64(self, v: i64) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_i128(self, v: i128) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_u8(self, v: u8) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_u16(self, v: u16) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_u32(self, v: u32) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_u64(self, v: u64) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_u128(self, v: u128) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_f32(self, v: f32) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_f64(self, v: f64) -> AmfResult<Value> {
        Ok(Value::Number(v))
    }

    fn serialize_char(self, v: char) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_str(self, v: &str) -> AmfResult<Value> {
        Ok(v.into())
    }

    fn serialize_bytes(self, v: &[u8]) -> AmfResult<Value> {
        Err(AmfError::UnsupportedValue(format!(
            "byte buffer of {} bytes",
            v.len()
        )))
    }

    fn serialize_none(self) -> AmfResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> AmfResult<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> AmfResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> AmfResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        variant_index: u32,
        _variant: &'static str,
    ) -> AmfResult<Value> {
        Ok(variant_index.into())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> AmfResult<Value> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> AmfResult<Value> {
        Ok(Value::Object {
            name: Some(name.to_string()),
            entries: vec![(variant.to_string(), to_value(value)?)],
        })
    }

    fn serialize_seq(self, len: Option<usize>) -> AmfResult<SeqSerializer> {
        Ok(SeqSerializer {
            values: Vec::with_capacity(len.unwrap_or_default()),
        })
    }

    fn serialize_tuple(self, len: usize) -> AmfResult<SeqSerializer> {
        ser::Serializer::serialize_seq(self, Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> AmfResult<SeqSerializer> {
        ser::Serializer::serialize_seq(self, Some(len))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> AmfResult<TupleVariantSerializer> {
        Ok(TupleVariantSerializer {
            name,
            variant,
            values: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> AmfResult<MapSerializer> {
        Ok(MapSerializer {
            entries: Vec::with_capacity(len.unwrap_or_default()),
            next_key: None,
        })
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> AmfResult<ObjectSerializer> {
        Ok(ObjectSerializer {
            name,
            entries: Vec::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> AmfResult<ObjectSerializer> {
        Ok(ObjectSerializer {
            name: variant,
            entries: Vec::with_capacity(len),
        })
    }
}

pub struct SeqSerializer {
    values: Vec<Value>,
}

impl ser::SerializeSeq for SeqSerializer {
    type Ok = Value;
    type Error = AmfError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> AmfResult<()> {
        self.values.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> AmfResult<Value> {
        Ok(Value::StrictArray(self.values))
    }
}

impl ser::SerializeTuple for SeqSerializer {
    type Ok = Value;
    type Error = AmfError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> AmfResult<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> AmfResult<Value> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqSerializer {
    type Ok = Value;
    type Error = AmfError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> AmfResult<()> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> AmfResult<Value> {
        ser::SerializeSeq::end(self)
    }
}

/// `Enum::Variant(a, b)` becomes `Enum { Variant: [a, b] }`.
pub struct TupleVariantSerializer {
    name: &'static str,
    variant: &'static str,
    values: Vec<Value>,
}

impl ser::SerializeTupleVariant for TupleVariantSerializer {
    type Ok = Value;
    type Error = AmfError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> AmfResult<()> {
        self.values.push(to_value(value)?);
        Ok(())
    }

    fn end(self) -> AmfResult<Value> {
        Ok(Value::Object {
            name: Some(self.name.to_string()),
            entries: vec![(
                self.variant.to_string(),
                Value::StrictArray(self.values),
            )],
        })
    }
}

pub struct MapSerializer {
    entries: Vec<(String, Value)>,
    next_key: Option<String>,
}

impl ser::SerializeMap for MapSerializer {
    type Ok = Value;
    type Error = AmfError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> AmfResult<()> {
        match key.serialize(KeySerializer)? {
            Value::String(key) => {
                self.next_key = Some(key);
                Ok(())
            }
            other => Err(AmfError::UnsupportedValue(format!(
                "map key must be a string, got {:?}",
                other
            ))),
        }
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> AmfResult<()> {
        let key = self.next_key.take().ok_or_else(|| {
            AmfError::UnsupportedValue("map value without a key".to_string())
        })?;
        self.entries.push((key, to_value(value)?));
        Ok(())
    }

    fn end(self) -> AmfResult<Value> {
        Ok(Value::ECMAArray(self.entries))
    }
}

/// Map keys go through the value serializer, anything but a string is rejected
/// by the map itself.
struct KeySerializer;

impl KeySerializer {
    fn reject(what: &str) -> AmfError {
        AmfError::UnsupportedValue(format!("map key must be a string, got {}", what))
    }
}

macro_rules! key_through_value {
    ($($method:ident: $t:ty),*) => {
        $(
            fn $method(self, v: $t) -> AmfResult<Value> {
                ser::Serializer::$method(ValueSerializer, v)
            }
        )*
    };
}

impl ser::Serializer for KeySerializer {
    type Ok = Value;
    type Error = AmfError;

    type SerializeSeq = Impossible<Value, AmfError>;
    type SerializeTuple = Impossible<Value, AmfError>;
    type SerializeTupleStruct = Impossible<Value, AmfError>;
    type SerializeTupleVariant = Impossible<Value, AmfError>;
    type SerializeMap = Impossible<Value, AmfError>;
    type SerializeStruct = Impossible<Value, AmfError>;
    type SerializeStructVariant = Impossible<Value, AmfError>;

    key_through_value!(
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_f32: f32,
        serialize_f64: f64,
        serialize_char: char,
        serialize_str: &str,
        serialize_bytes: &[u8]
    );

    fn serialize_none(self) -> AmfResult<Value> {
        Err(Self::reject("none"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> AmfResult<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> AmfResult<Value> {
        Err(Self::reject("unit"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> AmfResult<Value> {
        Err(Self::reject(name))
    }

    /// Unit variants key by their name.
    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> AmfResult<Value> {
        Ok(variant.into())
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> AmfResult<Value> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> AmfResult<Value> {
        Err(Self::reject(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> AmfResult<Self::SerializeSeq> {
        Err(Self::reject("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> AmfResult<Self::SerializeTuple> {
        Err(Self::reject("tuple"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> AmfResult<Self::SerializeTupleStruct> {
        Err(Self::reject(name))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> AmfResult<Self::SerializeTupleVariant> {
        Err(Self::reject(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> AmfResult<Self::SerializeMap> {
        Err(Self::reject("map"))
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> AmfResult<Self::SerializeStruct> {
        Err(Self::reject(name))
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> AmfResult<Self::SerializeStructVariant> {
        Err(Self::reject(name))
    }
}

/// Typed object under construction, struct fields keep declaration order.
pub struct ObjectSerializer {
    name: &'static str,
    entries: Vec<(String, Value)>,
}

impl ObjectSerializer {
    fn push<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> AmfResult<()> {
        self.entries.push((key.to_string(), to_value(value)?));
        Ok(())
    }

    fn finish(self) -> Value {
        Value::Object {
            name: Some(self.name.to_string()),
            entries: self.entries,
        }
    }
}

impl ser::SerializeStruct for ObjectSerializer {
    type Ok = Value;
    type Error = AmfError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> AmfResult<()> {
        self.push(key, value)
    }

    fn end(self) -> AmfResult<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for ObjectSerializer {
    type Ok = Value;
    type Error = AmfError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> AmfResult<()> {
        self.push(key, value)
    }

    fn end(self) -> AmfResult<Value> {
        Ok(self.finish())
    }
}
