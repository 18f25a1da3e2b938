//! # Runtime Value Representation
//!
//! `Value` is the owned, decoded form of a field. Reading a field decodes the
//! relevant byte range into a `Value`; writing a field encodes a `Value` back
//! into the buffer. Aggregates nest: a multidimensional array decodes to
//! nested `Value::Array` rows, a sub-record snapshot decodes to
//! `Value::Record` with one entry per field in declaration order.
//!
//! `Value::Null` appears in exactly three places: an unbound variant reads as
//! null, a hidden field inside a record snapshot reads as null, and a null
//! entry inside `Value::Record` is skipped on write (the underlying bytes are
//! left untouched).

use eyre::{bail, Result};

/// Owned, decoded representation of a field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Record(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Signed integer view. Unsigned values convert when they fit.
    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(v) => Ok(*v),
            Value::UInt(v) => {
                if *v <= i64::MAX as u64 {
                    Ok(*v as i64)
                } else {
                    bail!("value {} out of range for a signed integer", v)
                }
            }
            other => bail!("expected an integer value, got {:?}", other),
        }
    }

    /// Unsigned integer view. Signed values convert when non-negative.
    pub fn as_uint(&self) -> Result<u64> {
        match self {
            Value::UInt(v) => Ok(*v),
            Value::Int(v) => {
                if *v >= 0 {
                    Ok(*v as u64)
                } else {
                    bail!("value {} out of range for an unsigned integer", v)
                }
            }
            other => bail!("expected an unsigned integer value, got {:?}", other),
        }
    }

    /// Float view. Integers promote.
    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            Value::UInt(v) => Ok(*v as f64),
            other => bail!("expected a float value, got {:?}", other),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(v) => Ok(*v),
            other => bail!("expected a boolean value, got {:?}", other),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(v) => Ok(v.as_str()),
            other => bail!("expected a string value, got {:?}", other),
        }
    }

    pub fn as_bytes(&self) -> Result<&[u8]> {
        match self {
            Value::Bytes(v) => Ok(v.as_slice()),
            other => bail!("expected a byte string value, got {:?}", other),
        }
    }

    pub fn as_array(&self) -> Result<&[Value]> {
        match self {
            Value::Array(v) => Ok(v.as_slice()),
            other => bail!("expected an array value, got {:?}", other),
        }
    }

    pub fn as_record(&self) -> Result<&[Value]> {
        match self {
            Value::Record(v) => Ok(v.as_slice()),
            other => bail!("expected a record value, got {:?}", other),
        }
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::UInt(v as u64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value> + Clone, const N: usize> From<[T; N]> for Value {
    fn from(v: [T; N]) -> Self {
        Value::Array(v.iter().cloned().map(Into::into).collect())
    }
}
