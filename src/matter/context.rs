//! Per-request values handed from the protocol stack to the translators.

use super::ids::{AttributeId, ClusterId, CommandId, EndpointId};
use crate::error::TranslateError;
use serde_json::{Map, Value};

/// Decoded command fields, keyed by the Matter field name (e.g. `GroupID`).
pub type CommandPayload = Map<String, Value>;

/// One protocol-level request, owned by the protocol stack for the duration
/// of the call.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerContext {
    pub endpoint: EndpointId,
    pub cluster: ClusterId,
    pub command: CommandId,
    pub payload: CommandPayload,
}

impl HandlerContext {
    pub fn new(endpoint: EndpointId, cluster: ClusterId, command: CommandId) -> Self {
        Self {
            endpoint,
            cluster,
            command,
            payload: CommandPayload::new(),
        }
    }

    /// Add a decoded field. Returns self for chaining.
    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(name.to_string(), value.into());
        self
    }

    pub fn with_payload(mut self, payload: CommandPayload) -> Self {
        self.payload = payload;
        self
    }
}

/// Typed access to decoded command fields.
pub trait PayloadFields {
    /// Read a required unsigned field that must fit in `max`.
    fn unsigned_field(&self, name: &str, max: u64) -> Result<u64, TranslateError>;

    /// Read a required signed field within `min..=max`.
    fn signed_field(&self, name: &str, min: i64, max: i64) -> Result<i64, TranslateError>;

    /// Like [`unsigned_field`](Self::unsigned_field), but absent or null
    /// fields yield `default`.
    fn unsigned_or(&self, name: &str, max: u64, default: u64) -> Result<u64, TranslateError>;
}

impl PayloadFields for CommandPayload {
    fn unsigned_field(&self, name: &str, max: u64) -> Result<u64, TranslateError> {
        match self.get(name).and_then(Value::as_u64) {
            Some(v) if v <= max => Ok(v),
            Some(v) => Err(TranslateError::InvalidPayload(format!(
                "{name}={v} is out of range"
            ))),
            None => Err(TranslateError::InvalidPayload(format!(
                "missing unsigned field {name}"
            ))),
        }
    }

    fn signed_field(&self, name: &str, min: i64, max: i64) -> Result<i64, TranslateError> {
        match self.get(name).and_then(Value::as_i64) {
            Some(v) if (min..=max).contains(&v) => Ok(v),
            Some(v) => Err(TranslateError::InvalidPayload(format!(
                "{name}={v} is out of range"
            ))),
            None => Err(TranslateError::InvalidPayload(format!(
                "missing signed field {name}"
            ))),
        }
    }

    fn unsigned_or(&self, name: &str, max: u64, default: u64) -> Result<u64, TranslateError> {
        match self.get(name) {
            None | Some(Value::Null) => Ok(default),
            Some(_) => self.unsigned_field(name, max),
        }
    }
}

/// Attribute write request.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeWrite {
    pub endpoint: EndpointId,
    pub cluster: ClusterId,
    pub attribute: AttributeId,
    pub value: AttributeValue,
}

/// Wire shape of an attribute, used to validate values in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Bool,
    U8,
    U16,
    I16,
    /// Nullable signed 16 bit (e.g. LocalTemperature in centi-degrees).
    NullableI16,
    /// 8 bit enumeration, carried numerically.
    Enum8,
    /// Nullable 8 bit enumeration (e.g. StartUpOnOff).
    NullableEnum8,
    Bitmap8,
}

/// Already-decoded attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Null,
}

impl AttributeValue {
    /// Decode a JSON value from the bus, checking it fits `kind`.
    pub fn from_json(kind: AttributeKind, value: &Value) -> Result<Self, TranslateError> {
        let out_of_range = || TranslateError::InvalidPayload(format!("{value} is not a {kind:?}"));

        match kind {
            AttributeKind::Bool => value
                .as_bool()
                .map(AttributeValue::Bool)
                .ok_or_else(out_of_range),
            AttributeKind::U8 | AttributeKind::Enum8 | AttributeKind::Bitmap8 => value
                .as_u64()
                .filter(|v| *v <= u8::MAX as u64)
                .map(AttributeValue::Unsigned)
                .ok_or_else(out_of_range),
            AttributeKind::U16 => value
                .as_u64()
                .filter(|v| *v <= u16::MAX as u64)
                .map(AttributeValue::Unsigned)
                .ok_or_else(out_of_range),
            AttributeKind::I16 => value
                .as_i64()
                .filter(|v| (i16::MIN as i64..=i16::MAX as i64).contains(v))
                .map(AttributeValue::Signed)
                .ok_or_else(out_of_range),
            AttributeKind::NullableI16 if value.is_null() => Ok(AttributeValue::Null),
            AttributeKind::NullableI16 => Self::from_json(AttributeKind::I16, value),
            AttributeKind::NullableEnum8 if value.is_null() => Ok(AttributeValue::Null),
            AttributeKind::NullableEnum8 => Self::from_json(AttributeKind::Enum8, value),
        }
    }

    /// Check a protocol-side value against `kind` before it goes to the bus.
    pub fn check(&self, kind: AttributeKind) -> Result<(), TranslateError> {
        Self::from_json(kind, &self.to_json()).map(|_| ())
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::Unsigned(v) => Value::from(*v),
            AttributeValue::Signed(v) => Value::from(*v),
            AttributeValue::Null => Value::Null,
        }
    }
}
