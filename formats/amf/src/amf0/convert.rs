//! Native values prepared for the wire.
//!
//! Every conversion yields the [`Value`] the writer dispatches on, numbers
//! are normalized to `f64` and integers above 2^53 lose precision.
use std::{
    collections::{BTreeMap, HashMap},
    time::{SystemTime, UNIX_EPOCH},
};

use uuid::Uuid;

use crate::Version;

use super::Value;

macro_rules! number_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(value: $t) -> Self {
                    Value::Number(value as f64)
                }
            }
        )*
    };
}

number_from!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Value::String(value.to_string())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::String(value.hyphenated().to_string())
    }
}

impl From<SystemTime> for Value {
    fn from(value: SystemTime) -> Self {
        let millis_timestamp = match value.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_secs_f64() * 1000.0,
            Err(before) => -(before.duration().as_secs_f64() * 1000.0),
        };
        Value::Date { millis_timestamp }
    }
}

impl From<Version> for Value {
    fn from(value: Version) -> Self {
        Value::Number(u8::from(value) as f64)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::StrictArray(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Clone + Into<Value>> From<&[T]> for Value {
    fn from(value: &[T]) -> Self {
        Value::StrictArray(value.iter().cloned().map(Into::into).collect())
    }
}

/// Keys are sorted so the encoding does not depend on hash order.
impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(value: HashMap<String, T>) -> Self {
        let mut entries: Vec<(String, Value)> =
            value.into_iter().map(|(k, v)| (k, v.into())).collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        Value::ECMAArray(entries)
    }
}

impl<T: Into<Value>> From<BTreeMap<String, T>> for Value {
    fn from(value: BTreeMap<String, T>) -> Self {
        Value::ECMAArray(value.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Marks a string as an xml document rather than plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument(pub String);

impl From<XmlDocument> for Value {
    fn from(value: XmlDocument) -> Self {
        Value::XMLDocument(value.0)
    }
}

/// Typed object builder, fields keep their insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct AsObject {
    class_name: Option<String>,
    fields: Vec<(String, Value)>,
}

impl AsObject {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            fields: Vec::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            class_name: None,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

impl From<AsObject> for Value {
    fn from(value: AsObject) -> Self {
        Value::Object {
            name: value.class_name,
            entries: value.fields,
        }
    }
}
