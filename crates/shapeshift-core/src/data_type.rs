//! The closed set of field data types and the runtime values they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator as _, IntoStaticStr};

use crate::{Error, Result};

// ─── DataType ────────────────────────────────────────────────────────────────

/// The type of a field declaration.
///
/// The string form (`"character"`, `"integer"`, ...) is what gets persisted in
/// the metadata store and accepted on the command line.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DataType {
  /// Short text bounded by the attachment's `max_length`.
  Character,
  /// Unbounded text.
  Text,
  Integer,
  Float,
  Boolean,
  /// A UTC date-time.
  Date,
}

impl DataType {
  /// Every supported data type, in declaration order.
  pub fn all() -> Vec<DataType> { DataType::iter().collect() }

  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse the persisted name of a data type.
  pub fn from_name(name: &str) -> Result<Self> {
    name
      .parse()
      .map_err(|_| Error::UnknownDataType(name.to_owned()))
  }

  /// Whether attachments of this type must carry a `max_length`.
  pub fn requires_max_length(self) -> bool { matches!(self, Self::Character) }

  /// Check that `value` can be stored in a field of this type, widening
  /// integers to floats where needed. `Null` always conforms; presence is a
  /// separate check.
  pub fn conform(self, value: Value) -> Result<Value, String> {
    match (self, value) {
      (_, Value::Null) => Ok(Value::Null),
      (Self::Character | Self::Text, v @ Value::Text(_)) => Ok(v),
      (Self::Integer, v @ Value::Integer(_)) => Ok(v),
      (Self::Float, v @ Value::Float(_)) => Ok(v),
      (Self::Float, Value::Integer(i)) => Ok(Value::Float(i as f64)),
      (Self::Boolean, v @ Value::Boolean(_)) => Ok(v),
      (Self::Date, v @ Value::Date(_)) => Ok(v),
      (ty, v) => Err(format!("expected {ty}, got {}", v.kind())),
    }
  }

  /// Parse a textual value (e.g. from the command line) into a [`Value`] of
  /// this type.
  pub fn parse_value(self, raw: &str) -> Result<Value, String> {
    match self {
      Self::Character | Self::Text => Ok(Value::Text(raw.to_owned())),
      Self::Integer => raw
        .trim()
        .parse()
        .map(Value::Integer)
        .map_err(|e| format!("not an integer: {e}")),
      Self::Float => raw
        .trim()
        .parse()
        .map(Value::Float)
        .map_err(|e| format!("not a float: {e}")),
      Self::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" => Ok(Value::Boolean(true)),
        "false" | "f" | "no" | "0" => Ok(Value::Boolean(false)),
        other => Err(format!("not a boolean: {other:?}")),
      },
      Self::Date => DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| Value::Date(dt.with_timezone(&Utc)))
        .map_err(|e| format!("not an RFC 3339 date-time: {e}")),
    }
  }
}

// ─── Value ───────────────────────────────────────────────────────────────────

/// A single field value held by a record or used as a column default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
  Null,
  Text(String),
  Integer(i64),
  Float(f64),
  Boolean(bool),
  Date(DateTime<Utc>),
}

impl Value {
  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  /// Short name of the variant, for error messages.
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Null => "null",
      Self::Text(_) => "text",
      Self::Integer(_) => "integer",
      Self::Float(_) => "float",
      Self::Boolean(_) => "boolean",
      Self::Date(_) => "date",
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Self::Integer(i) => Some(*i),
      _ => None,
    }
  }

  pub fn as_f64(&self) -> Option<f64> {
    match self {
      Self::Float(f) => Some(*f),
      Self::Integer(i) => Some(*i as f64),
      _ => None,
    }
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Boolean(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_date(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Date(d) => Some(*d),
      _ => None,
    }
  }

  /// Length in characters, for text values.
  pub fn char_len(&self) -> Option<usize> { self.as_str().map(|s| s.chars().count()) }
}

impl std::fmt::Display for Value {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Null => f.write_str("null"),
      Self::Text(s) => f.write_str(s),
      Self::Integer(i) => write!(f, "{i}"),
      Self::Float(x) => write!(f, "{x}"),
      Self::Boolean(b) => write!(f, "{b}"),
      Self::Date(d) => f.write_str(&d.to_rfc3339()),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self { Self::Integer(i) }
}

impl From<i32> for Value {
  fn from(i: i32) -> Self { Self::Integer(i64::from(i)) }
}

impl From<f64> for Value {
  fn from(f: f64) -> Self { Self::Float(f) }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self { Self::Boolean(b) }
}

impl From<DateTime<Utc>> for Value {
  fn from(d: DateTime<Utc>) -> Self { Self::Date(d) }
}

impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self { v.map_or(Self::Null, Into::into) }
}
