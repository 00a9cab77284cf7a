use errors::AmfError;

pub mod amf0;
pub mod errors;

pub use amf0::Value;

/// Object encoding announced in `connect` and selected per message by its content type.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Version {
    #[default]
    Amf0 = 0,
    Amf3 = 3,
}

impl From<Version> for u8 {
    fn from(value: Version) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for Version {
    type Error = AmfError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Version::Amf0),
            3 => Ok(Version::Amf3),
            v => Err(AmfError::UnknownVersion(v)),
        }
    }
}

pub trait AmfComplexObject {
    fn extract_bool_field(&self, key: &str) -> Option<bool>;
    fn extract_number_field(&self, key: &str) -> Option<f64>;
    fn extract_string_field(&self, key: &str) -> Option<String>;
    fn extract_object_field(&self, key: &str) -> Option<&[(String, Value)]>;
}

impl AmfComplexObject for [(String, Value)] {
    fn extract_bool_field(&self, key: &str) -> Option<bool> {
        lookup(self, key).and_then(Value::try_as_bool)
    }

    fn extract_number_field(&self, key: &str) -> Option<f64> {
        lookup(self, key).and_then(Value::try_as_f64)
    }

    fn extract_string_field(&self, key: &str) -> Option<String> {
        lookup(self, key)
            .and_then(Value::try_as_str)
            .map(|s| s.to_string())
    }

    fn extract_object_field(&self, key: &str) -> Option<&[(String, Value)]> {
        lookup(self, key).and_then(Value::try_as_pairs)
    }
}

impl AmfComplexObject for Value {
    fn extract_bool_field(&self, key: &str) -> Option<bool> {
        self.try_as_pairs()?.extract_bool_field(key)
    }

    fn extract_number_field(&self, key: &str) -> Option<f64> {
        self.try_as_pairs()?.extract_number_field(key)
    }

    fn extract_string_field(&self, key: &str) -> Option<String> {
        self.try_as_pairs()?.extract_string_field(key)
    }

    fn extract_object_field(&self, key: &str) -> Option<&[(String, Value)]> {
        self.try_as_pairs()?.extract_object_field(key)
    }
}

fn lookup<'a>(pairs: &'a [(String, Value)], key: &str) -> Option<&'a Value> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}
