//! Input record contract.
//!
//! A record is anything offering named-field access. Lookups distinguish a
//! missing field from one that cannot be read as the requested type, since
//! the increment path treats the two differently.

use crate::MappingError;
use serde_json::{Map, Value};

/// Named-field access over one unit of input data.
pub trait Record {
    /// Read a field as a string.
    fn get_string(&self, field: &str) -> Result<String, MappingError>;

    /// Read a field as a signed 64-bit integer.
    fn get_i64(&self, field: &str) -> Result<i64, MappingError>;
}

fn lookup<'a>(map: &'a Map<String, Value>, field: &str) -> Result<&'a Value, MappingError> {
    map.get(field).ok_or_else(|| MappingError::FieldNotFound {
        field: field.to_string(),
    })
}

fn value_as_string(field: &str, value: &Value) -> Result<String, MappingError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(MappingError::FieldTypeMismatch {
            field: field.to_string(),
            expected: "string",
        }),
    }
}

fn value_as_i64(field: &str, value: &Value) -> Result<i64, MappingError> {
    value.as_i64().ok_or_else(|| MappingError::FieldTypeMismatch {
        field: field.to_string(),
        expected: "i64",
    })
}

impl Record for Map<String, Value> {
    fn get_string(&self, field: &str) -> Result<String, MappingError> {
        value_as_string(field, lookup(self, field)?)
    }

    fn get_i64(&self, field: &str) -> Result<i64, MappingError> {
        value_as_i64(field, lookup(self, field)?)
    }
}

/// Non-object values behave as records with no fields.
impl Record for Value {
    fn get_string(&self, field: &str) -> Result<String, MappingError> {
        match self {
            Value::Object(map) => map.get_string(field),
            _ => Err(MappingError::FieldNotFound {
                field: field.to_string(),
            }),
        }
    }

    fn get_i64(&self, field: &str) -> Result<i64, MappingError> {
        match self {
            Value::Object(map) => map.get_i64(field),
            _ => Err(MappingError::FieldNotFound {
                field: field.to_string(),
            }),
        }
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn get_string(&self, field: &str) -> Result<String, MappingError> {
        (**self).get_string(field)
    }

    fn get_i64(&self, field: &str) -> Result<i64, MappingError> {
        (**self).get_i64(field)
    }
}
