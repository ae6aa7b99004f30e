use std::{fmt, io::Read};

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::EncodingError;

const APPLICATION_JSON: &str = "application/json";

/// Request body value supplied by the caller.
#[derive(Default)]
pub enum Payload {
    /// No body at all.
    #[default]
    Empty,
    /// Text, sent as a JSON string literal.
    Text(String),
    /// Mapping, sent as a JSON object.
    Structured(Map<String, Value>),
    /// Untyped JSON value, classified when the request is built.
    ///
    /// Only strings and objects are accepted; any other shape fails with
    /// [`EncodingError::UnsupportedPayload`].
    Value(Value),
    /// Raw bytes, sent as-is.
    Bytes(Bytes),
    /// Readable byte source, drained once and sent as-is.
    ///
    /// The source is read to the end synchronously on the calling task when
    /// the request is built, so slow sources block that task.
    Reader(Box<dyn Read + Send>),
}

impl Payload {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn bytes(value: impl Into<Bytes>) -> Self {
        Self::Bytes(value.into())
    }

    pub fn reader(source: impl Read + Send + 'static) -> Self {
        Self::Reader(Box::new(source))
    }

    /// Serializes any serde value into an untyped [`Payload::Value`].
    pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, EncodingError> {
        serde_json::to_value(value)
            .map(Self::Value)
            .map_err(EncodingError::Serialization)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(value) => f.debug_tuple("Text").field(value).finish(),
            Self::Structured(map) => f.debug_tuple("Structured").field(map).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(value: Map<String, Value>) -> Self {
        Self::Structured(value)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<&'static [u8]> for Payload {
    fn from(value: &'static [u8]) -> Self {
        Self::Bytes(Bytes::from_static(value))
    }
}

/// Body bytes ready to be attached to a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncodedBody {
    pub bytes: Bytes,
    /// `Some("application/json")` for JSON branches, `None` for raw bytes.
    pub content_type: Option<&'static str>,
}

impl EncodedBody {
    fn json(bytes: Vec<u8>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: Some(APPLICATION_JSON),
        }
    }

    fn raw(bytes: Bytes) -> Self {
        Self {
            bytes,
            content_type: None,
        }
    }
}

/// Converts a payload into request body bytes.
///
/// Shape classification happens exactly once here, before any network
/// attempt. Readers are drained fully so retries can replay the same bytes.
pub fn encode(payload: Payload) -> Result<EncodedBody, EncodingError> {
    match payload {
        Payload::Empty => Ok(EncodedBody::default()),
        Payload::Text(text) => to_json(&text),
        Payload::Structured(map) => to_json(&map),
        Payload::Value(value) => match value {
            Value::String(text) => to_json(&text),
            Value::Object(map) => to_json(&map),
            other => Err(EncodingError::UnsupportedPayload {
                kind: json_kind(&other),
            }),
        },
        Payload::Bytes(bytes) => Ok(EncodedBody::raw(bytes)),
        Payload::Reader(mut source) => {
            let mut buf = Vec::new();
            source.read_to_end(&mut buf).map_err(EncodingError::Read)?;
            Ok(EncodedBody::raw(buf.into()))
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<EncodedBody, EncodingError> {
    serde_json::to_vec(value)
        .map(EncodedBody::json)
        .map_err(EncodingError::Serialization)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
