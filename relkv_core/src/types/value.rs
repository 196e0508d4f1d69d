use std::fmt;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value as JsonValue;

use crate::error::StoreError;

/// An attribute value. The variant set is closed: every variant maps to
/// exactly one column type, so shape dispatch happens at construction time
/// rather than inside the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Json(JsonValue),
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Maps a parsed JSON literal onto a value. Booleans take precedence over
    /// numbers by construction, integers are tried before decimals. `null`
    /// and numbers outside the supported ranges are rejected.
    pub fn from_json(value: JsonValue) -> Result<Self, StoreError> {
        match value {
            JsonValue::String(s) => Ok(Value::Text(s)),
            JsonValue::Bool(b) => Ok(Value::Bool(b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Decimal::from_f64(f)
                        .map(Value::Decimal)
                        .ok_or_else(|| StoreError::UnsupportedValue(format!("number {n} is out of range")))
                } else {
                    Err(StoreError::UnsupportedValue(format!("number {n} is out of range")))
                }
            }
            JsonValue::Null => Err(StoreError::UnsupportedValue("null".to_string())),
            other => Ok(Value::Json(other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Json(j) => write!(f, "{j}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Decimal(d) => write!(f, "{}", d.normalize()),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode_upper(b)),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}
