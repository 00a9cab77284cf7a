use std::fmt;

use amf::{AmfComplexObject, Value, errors::AmfResult};
use tokio_util::bytes::Bytes;

use consts::{fault_fields, s2c_command_names};

pub mod consts;
pub mod reader;
pub mod writer;

///! @see: 7.1.1. Command Message (20, 17)
/// +----------------+---------+----------------+-------------+-------------
/// |  method name   |   id    |    headers     |  argument   | argument ...
/// |  (AMF String)  | (Number)| (commonly Null)|   (Value)   |
/// +----------------+---------+----------------+-------------+-------------
///
/// amf3 tagged commands put a single 0x00 format byte in front of the values.
#[derive(Debug, Clone, PartialEq)]
pub struct Invoke {
    pub encoding: amf::Version,
    pub method_name: String,
    /// 0 for calls that expect no reply
    pub invocation_id: u32,
    pub headers: Value,
    pub arguments: Vec<Value>,
}

impl Invoke {
    pub fn new(
        method_name: impl Into<String>,
        invocation_id: u32,
        headers: Value,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            encoding: amf::Version::Amf0,
            method_name: method_name.into(),
            invocation_id,
            headers,
            arguments,
        }
    }

    pub fn with_encoding(mut self, encoding: amf::Version) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn is_result(&self) -> bool {
        self.method_name == s2c_command_names::RESULT
    }

    pub fn is_error(&self) -> bool {
        self.method_name == s2c_command_names::ERROR
    }

    /// A reply to one of our own invocations.
    pub fn is_reply(&self) -> bool {
        self.is_result() || self.is_error()
    }

    pub fn first_argument(&self) -> Option<&Value> {
        self.arguments.first()
    }

    /// The structured fault carried by an `_error` reply.
    pub fn fault(&self) -> Option<InvocationFault> {
        if !self.is_error() {
            return None;
        }
        Some(InvocationFault::from_arguments(&self.arguments))
    }
}

///! @see: 7.1.2. Data Message (18, 15)
/// The payload stays opaque, amf3 tagged messages have their format byte
/// stripped.
#[derive(Debug, Clone, PartialEq)]
pub struct Notify {
    pub encoding: amf::Version,
    pub payload: Bytes,
}

impl Notify {
    pub fn new(encoding: amf::Version, payload: Bytes) -> Self {
        Self { encoding, payload }
    }

    pub fn from_values(encoding: amf::Version, values: &[Value]) -> AmfResult<Self> {
        let mut payload = Vec::new();
        Value::write_all(&mut payload, values)?;
        Ok(Self::new(encoding, payload.into()))
    }

    pub fn values(&self) -> AmfResult<Vec<Value>> {
        Value::read_all(&self.payload[..])
    }
}

/// Failure reported by the remote side in an `_error` reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvocationFault {
    pub code: Option<String>,
    pub description: Option<String>,
    pub details: Option<String>,
    pub level: Option<String>,
    pub root_cause: Option<Value>,
    pub extended_data: Option<Value>,
}

impl InvocationFault {
    pub fn from_arguments(arguments: &[Value]) -> Self {
        match arguments.first() {
            Some(Value::String(description)) => Self {
                description: Some(description.clone()),
                ..Default::default()
            },
            Some(value) => value
                .try_as_pairs()
                .map(Self::from_pairs)
                .unwrap_or_default(),
            None => Self::default(),
        }
    }

    pub fn from_pairs(pairs: &[(String, Value)]) -> Self {
        let string_field = |key: &str, alias: &str| {
            pairs
                .extract_string_field(key)
                .or_else(|| pairs.extract_string_field(alias))
        };
        let value_field = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };
        Self {
            code: string_field(fault_fields::CODE, fault_fields::FAULT_CODE),
            description: string_field(fault_fields::DESCRIPTION, fault_fields::FAULT_STRING),
            details: string_field(fault_fields::DETAILS, fault_fields::FAULT_DETAIL),
            level: pairs.extract_string_field(fault_fields::LEVEL),
            root_cause: value_field(fault_fields::ROOT_CAUSE),
            extended_data: value_field(fault_fields::EXTENDED_DATA),
        }
    }
}

impl fmt::Display for InvocationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code.as_deref().unwrap_or("unknown");
        match &self.description {
            Some(description) => write!(f, "{}: {}", code, description),
            None => write!(f, "{}", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use amf::{Value, amf0};
    use tokio_util::bytes::Bytes;
    use utils::{
        bytes::hex_to_bytes,
        traits::{reader::ReadRemainingFrom, writer::WriteTo},
    };

    use super::{InvocationFault, Invoke, Notify};
    use crate::message::errors::RtmpMessageError;

    #[test]
    fn connect_wire_format() {
        let invoke = Invoke::new("connect", 1, Value::Null, vec![amf0::string("app")]);
        let mut bytes = Vec::new();
        invoke.write_to(&mut bytes).unwrap();
        assert_eq!(
            bytes,
            hex_to_bytes(
                "02 0007 636f6e6e656374
                 00 3ff0000000000000
                 05
                 02 0003 617070"
            )
            .unwrap()
        );

        let decoded = Invoke::read_remaining_from(amf::Version::Amf0, &mut &bytes[..]).unwrap();
        assert_eq!(decoded.method_name, "connect");
        assert_eq!(decoded.invocation_id, 1);
        assert_eq!(decoded.headers, Value::Null);
        assert_eq!(decoded.arguments, vec![amf0::string("app")]);
    }

    #[test]
    fn amf3_prefix_is_written_and_skipped() {
        let invoke = Invoke::new("ping", 0, Value::Null, vec![]).with_encoding(amf::Version::Amf3);
        let mut bytes = Vec::new();
        invoke.write_to(&mut bytes).unwrap();
        assert_eq!(bytes[0], 0x00);
        assert_eq!(bytes[1], 0x02);

        let decoded = Invoke::read_remaining_from(amf::Version::Amf3, &mut &bytes[..]).unwrap();
        assert_eq!(decoded, invoke);
    }

    #[test]
    fn missing_headers_default_to_null() {
        let bytes = hex_to_bytes("02 0001 78 00 4000000000000000").unwrap();
        let decoded = Invoke::read_remaining_from(amf::Version::Amf0, &mut &bytes[..]).unwrap();
        assert_eq!(decoded.invocation_id, 2);
        assert_eq!(decoded.headers, Value::Null);
        assert!(decoded.arguments.is_empty());
    }

    #[test]
    fn malformed_invokes() {
        // method name is a number
        let bytes = hex_to_bytes("00 3ff0000000000000").unwrap();
        assert!(matches!(
            Invoke::read_remaining_from(amf::Version::Amf0, &mut &bytes[..]),
            Err(RtmpMessageError::UnexpectedAmfType(_))
        ));
        // invocation id is missing
        let bytes = hex_to_bytes("02 0001 78").unwrap();
        assert!(matches!(
            Invoke::read_remaining_from(amf::Version::Amf0, &mut &bytes[..]),
            Err(RtmpMessageError::InvalidMessage(_))
        ));
        // invocation id is a string
        let bytes = hex_to_bytes("02 0001 78 02 0001 31").unwrap();
        assert!(matches!(
            Invoke::read_remaining_from(amf::Version::Amf0, &mut &bytes[..]),
            Err(RtmpMessageError::UnexpectedAmfType(_))
        ));
        assert!(
            Invoke::read_remaining_from(amf::Version::Amf0, &mut &[][..]).is_err()
        );
    }

    #[test]
    fn reply_classification() {
        let result = Invoke::new("_result", 1, Value::Null, vec![]);
        assert!(result.is_result() && result.is_reply() && !result.is_error());
        assert_eq!(result.fault(), None);

        let status = Invoke::new("onStatus", 0, Value::Null, vec![]);
        assert!(!status.is_reply());
    }

    #[test]
    fn fault_fields() {
        let error = Invoke::new(
            "_error",
            3,
            Value::Null,
            vec![amf0::object([
                ("level", amf0::string("error")),
                ("code", amf0::string("NetConnection.Call.Failed")),
                ("description", amf0::string("no such method")),
                ("rootCause", amf0::number(7)),
            ])],
        );
        let fault = error.fault().unwrap();
        assert_eq!(fault.code.as_deref(), Some("NetConnection.Call.Failed"));
        assert_eq!(fault.description.as_deref(), Some("no such method"));
        assert_eq!(fault.level.as_deref(), Some("error"));
        assert_eq!(fault.details, None);
        assert_eq!(fault.root_cause, Some(amf0::number(7)));
        assert_eq!(fault.extended_data, None);
        assert_eq!(
            fault.to_string(),
            "NetConnection.Call.Failed: no such method"
        );
    }

    #[test]
    fn fault_aliases() {
        let fault = InvocationFault::from_arguments(&[amf0::object([
            ("faultCode", amf0::string("Server.Processing")),
            ("faultString", amf0::string("boom")),
            ("faultDetail", amf0::string("trace")),
            ("extendedData", amf0::object([("x", amf0::number(1))])),
        ])]);
        assert_eq!(fault.code.as_deref(), Some("Server.Processing"));
        assert_eq!(fault.description.as_deref(), Some("boom"));
        assert_eq!(fault.details.as_deref(), Some("trace"));
        assert_eq!(
            fault.extended_data,
            Some(amf0::object([("x", amf0::number(1))]))
        );

        let fault = InvocationFault::from_arguments(&[amf0::string("plain failure")]);
        assert_eq!(fault.description.as_deref(), Some("plain failure"));
        assert_eq!(fault.to_string(), "unknown: plain failure");

        assert_eq!(InvocationFault::from_arguments(&[]), InvocationFault::default());
    }

    #[test]
    fn notify_values() {
        let notify = Notify::from_values(
            amf::Version::Amf0,
            &[amf0::string("onMetaData"), amf0::number(25)],
        )
        .unwrap();
        assert_eq!(
            notify.values().unwrap(),
            vec![amf0::string("onMetaData"), amf0::number(25)]
        );

        let amf3 = Notify::new(amf::Version::Amf3, Bytes::from_static(&[0x05]));
        let mut bytes = Vec::new();
        amf3.write_to(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0x00, 0x05]);
        let decoded = Notify::read_remaining_from(amf::Version::Amf3, &mut &bytes[..]).unwrap();
        assert_eq!(decoded, amf3);
        assert_eq!(decoded.values().unwrap(), vec![Value::Null]);
    }
}
