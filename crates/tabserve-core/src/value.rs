//! Typed field values
//!
//! Every cell of a snapshot row and every filter operand is a [`Value`].
//! Values are converted from JSON against a [`FieldDef`] so that the declared
//! type (and date format) decides how a wire value is read.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::schema::{FieldDef, FieldType, DEFAULT_DATE_FORMAT};

/// A single typed value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    String(String),
    Char(char),
    Byte(i8),
    Short(i16),
    Integer(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Date(NaiveDateTime),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Char(_) => "char",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Integer(_) => "integer",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Date(_) => "date",
        }
    }

    /// Declared type this value carries (None for null)
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(FieldType::Boolean),
            Value::String(_) => Some(FieldType::String),
            Value::Char(_) => Some(FieldType::Char),
            Value::Byte(_) => Some(FieldType::Byte),
            Value::Short(_) => Some(FieldType::Short),
            Value::Integer(_) => Some(FieldType::Integer),
            Value::Long(_) => Some(FieldType::Long),
            Value::Float(_) => Some(FieldType::Float),
            Value::Double(_) => Some(FieldType::Double),
            Value::Date(_) => Some(FieldType::Date),
        }
    }

    /// Null conforms to every type
    pub fn conforms_to(&self, field_type: FieldType) -> bool {
        self.field_type().map_or(true, |t| t == field_type)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Read a JSON value as the declared type of `field`.
    ///
    /// Numbers may arrive as JSON numbers or numeric strings; dates arrive as
    /// strings in the field's format or as epoch milliseconds. Floating point
    /// values must be finite, since JSON has no rendering for NaN or infinity.
    pub fn from_json(json: &JsonValue, field: &FieldDef) -> Result<Self> {
        if json.is_null() {
            return Ok(Value::Null);
        }

        let mismatch = || Error::TypeMismatch {
            field: field.name.clone(),
            expected: field.field_type,
            actual: json.to_string(),
        };

        let value = match field.field_type {
            FieldType::Boolean => match json {
                JsonValue::Bool(b) => Value::Boolean(*b),
                JsonValue::String(s) => Value::Boolean(s.parse().map_err(|_| mismatch())?),
                _ => return Err(mismatch()),
            },
            FieldType::String => match json {
                JsonValue::String(s) => Value::String(s.clone()),
                _ => return Err(mismatch()),
            },
            FieldType::Char => {
                let s = json.as_str().ok_or_else(mismatch)?;
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(mismatch()),
                }
            }
            FieldType::Byte => Value::Byte(
                i8::try_from(json_to_i64(json).ok_or_else(mismatch)?).map_err(|_| mismatch())?,
            ),
            FieldType::Short => Value::Short(
                i16::try_from(json_to_i64(json).ok_or_else(mismatch)?).map_err(|_| mismatch())?,
            ),
            FieldType::Integer => Value::Integer(
                i32::try_from(json_to_i64(json).ok_or_else(mismatch)?).map_err(|_| mismatch())?,
            ),
            FieldType::Long => Value::Long(json_to_i64(json).ok_or_else(mismatch)?),
            FieldType::Float => {
                let v = json_to_f64(json).ok_or_else(mismatch)? as f32;
                if !v.is_finite() {
                    return Err(mismatch());
                }
                Value::Float(v)
            }
            FieldType::Double => {
                let v = json_to_f64(json).ok_or_else(mismatch)?;
                if !v.is_finite() {
                    return Err(mismatch());
                }
                Value::Double(v)
            }
            FieldType::Date => match json {
                JsonValue::String(s) => {
                    Value::Date(parse_date(s, field.date_format()).ok_or_else(mismatch)?)
                }
                JsonValue::Number(n) => {
                    let millis = n.as_i64().ok_or_else(mismatch)?;
                    let ts = DateTime::from_timestamp_millis(millis).ok_or_else(mismatch)?;
                    Value::Date(ts.naive_utc())
                }
                _ => return Err(mismatch()),
            },
        };

        Ok(value)
    }

    /// Natural JSON rendering; dates use the field's format
    pub fn to_json(&self, field: &FieldDef) -> JsonValue {
        match self {
            Value::Date(d) => JsonValue::String(d.format(field.date_format()).to_string()),
            other => other.to_json_plain(),
        }
    }

    fn to_json_plain(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Char(c) => JsonValue::String(c.to_string()),
            Value::Byte(v) => JsonValue::from(*v),
            Value::Short(v) => JsonValue::from(*v),
            Value::Integer(v) => JsonValue::from(*v),
            Value::Long(v) => JsonValue::from(*v),
            Value::Float(v) => JsonValue::from(*v),
            Value::Double(v) => JsonValue::from(*v),
            Value::Date(d) => JsonValue::String(d.format(DEFAULT_DATE_FORMAT).to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Char(c) => write!(f, "{}", c),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Date(d) => write!(f, "{}", d.format(DEFAULT_DATE_FORMAT)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Date(v)
    }
}

fn json_to_i64(json: &JsonValue) -> Option<i64> {
    match json {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_to_f64(json: &JsonValue) -> Option<f64> {
    match json {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse with a full date-time pattern, falling back to date-only patterns at midnight
fn parse_date(s: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, format).ok().or_else(|| {
        NaiveDate::parse_from_str(s, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })
}
