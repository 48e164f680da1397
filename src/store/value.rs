//! Value type held by the string store

use bytes::Bytes;

/// A string-store value: an opaque payload or a 64-bit counter
///
/// Counter operations only accept `Integer`. A payload that happens to
/// spell a number is never reinterpreted; store an `Integer` explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    /// Opaque payload (binary-safe)
    Bytes(Bytes),

    /// Integer value (used for counters)
    Integer(i64),
}

impl Value {
    /// Create a payload value
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Value::Bytes(bytes.into())
    }

    /// Create an integer value
    pub fn integer(i: i64) -> Self {
        Value::Integer(i)
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "bytes",
            Value::Integer(_) => "integer",
        }
    }

    /// Check if value is an integer
    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    /// Try to get as payload bytes
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<&'static str> for Value {
    fn from(s: &'static str) -> Self {
        Value::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Bytes(Bytes::from(s))
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_text_stays_bytes() {
        let value = Value::from("42");
        assert!(!value.is_integer());
        assert_eq!(value.as_integer(), None);
        assert_eq!(value.type_name(), "bytes");
    }
}
