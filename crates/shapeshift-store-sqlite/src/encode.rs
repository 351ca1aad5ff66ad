//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated lowercase
//! strings, and attachment defaults as compact JSON. Record values use
//! SQLite's native types, with booleans as 0/1 and dates as RFC 3339 text.

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use shapeshift_core::{
  data_type::{DataType, Value},
  declaration::{
    AttachedField, Constraints, FieldAttachment, FieldDeclaration, ModelDeclaration,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Markers ─────────────────────────────────────────────────────────────────

pub fn decode_marker(raw: i64) -> Result<u64> {
  u64::try_from(raw).map_err(|_| Error::Decode(format!("negative marker {raw}")))
}

// ─── Defaults ────────────────────────────────────────────────────────────────

pub fn encode_default(v: Option<&Value>) -> Result<Option<String>> {
  v.map(serde_json::to_string).transpose().map_err(Error::from)
}

pub fn decode_default(s: Option<&str>) -> Result<Option<Value>> {
  s.map(serde_json::from_str).transpose().map_err(Error::from)
}

// ─── Record values ───────────────────────────────────────────────────────────

/// Convert a record value into the SQLite value bound for its column.
pub fn encode_value(v: &Value) -> SqlValue {
  match v {
    Value::Null => SqlValue::Null,
    Value::Text(s) => SqlValue::Text(s.clone()),
    Value::Integer(i) => SqlValue::Integer(*i),
    Value::Float(f) => SqlValue::Real(*f),
    Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
    Value::Date(d) => SqlValue::Text(encode_dt(*d)),
  }
}

/// Read a column value back as `data_type`.
pub fn decode_value(data_type: DataType, raw: SqlValue) -> Result<Value> {
  let value = match (data_type, raw) {
    (_, SqlValue::Null) => Value::Null,
    (DataType::Character | DataType::Text, SqlValue::Text(s)) => Value::Text(s),
    (DataType::Integer, SqlValue::Integer(i)) => Value::Integer(i),
    (DataType::Float, SqlValue::Real(f)) => Value::Float(f),
    (DataType::Float, SqlValue::Integer(i)) => Value::Float(i as f64),
    (DataType::Boolean, SqlValue::Integer(i)) => Value::Boolean(i != 0),
    (DataType::Date, SqlValue::Text(s)) => Value::Date(decode_dt(&s)?),
    (ty, other) => {
      return Err(Error::Decode(format!(
        "stored {:?} cannot be read as {ty}",
        other.data_type()
      )));
    }
  };
  Ok(value)
}

/// Render a value as an SQL literal, for `DEFAULT` clauses and backfills.
pub fn sql_literal(v: &Value) -> String {
  match v {
    Value::Null => "NULL".to_owned(),
    Value::Text(s) => quote_str(s),
    Value::Integer(i) => i.to_string(),
    Value::Float(f) if f.is_finite() => format!("{f:?}"),
    Value::Float(_) => "NULL".to_owned(),
    Value::Boolean(b) => i64::from(*b).to_string(),
    Value::Date(d) => quote_str(&encode_dt(*d)),
  }
}

fn quote_str(s: &str) -> String { format!("'{}'", s.replace('\'', "''")) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `shapeshift_models` row.
pub struct RawModel {
  pub model_id:   String,
  pub name:       String,
  pub table_name: String,
  pub marker:     i64,
  pub created_at: String,
  pub purged_at:  Option<String>,
}

impl RawModel {
  pub const COLUMNS: &'static str =
    "model_id, name, table_name, marker, created_at, purged_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      model_id:   row.get(0)?,
      name:       row.get(1)?,
      table_name: row.get(2)?,
      marker:     row.get(3)?,
      created_at: row.get(4)?,
      purged_at:  row.get(5)?,
    })
  }

  pub fn into_model(self) -> Result<ModelDeclaration> {
    Ok(ModelDeclaration {
      model_id:   decode_uuid(&self.model_id)?,
      name:       self.name,
      table_name: self.table_name,
      marker:     decode_marker(self.marker)?,
      created_at: decode_dt(&self.created_at)?,
      purged_at:  self.purged_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw values read directly from a `shapeshift_fields` row.
pub struct RawField {
  pub field_id:   String,
  pub name:       String,
  pub data_type:  String,
  pub created_at: String,
}

impl RawField {
  pub const COLUMNS: &'static str = "field_id, name, data_type, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      field_id:   row.get(0)?,
      name:       row.get(1)?,
      data_type:  row.get(2)?,
      created_at: row.get(3)?,
    })
  }

  pub fn into_field(self) -> Result<FieldDeclaration> {
    Ok(FieldDeclaration {
      field_id:   decode_uuid(&self.field_id)?,
      name:       self.name,
      data_type:  DataType::from_name(&self.data_type)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// An attachment row joined with its field row.
pub struct RawAttachedField {
  pub field:        RawField,
  pub model_id:     String,
  pub required:     bool,
  pub is_unique:    bool,
  pub max_length:   Option<u32>,
  pub default_json: Option<String>,
  pub position:     u32,
  pub modified_at:  String,
}

impl RawAttachedField {
  /// Select list for `shapeshift_attachments a JOIN shapeshift_fields f`.
  pub const COLUMNS: &'static str = "f.field_id, f.name, f.data_type, f.created_at,
     a.model_id, a.required, a.is_unique, a.max_length, a.default_json,
     a.position, a.modified_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      field:        RawField::from_row(row)?,
      model_id:     row.get(4)?,
      required:     row.get(5)?,
      is_unique:    row.get(6)?,
      max_length:   row.get(7)?,
      default_json: row.get(8)?,
      position:     row.get(9)?,
      modified_at:  row.get(10)?,
    })
  }

  pub fn into_attached(self) -> Result<AttachedField> {
    let field = self.field.into_field()?;
    let attachment = FieldAttachment {
      model_id:    decode_uuid(&self.model_id)?,
      field_id:    field.field_id,
      constraints: Constraints {
        required:   self.required,
        unique:     self.is_unique,
        max_length: self.max_length,
        default:    decode_default(self.default_json.as_deref())?,
      },
      position:    self.position,
      modified_at: decode_dt(&self.modified_at)?,
    };
    Ok(AttachedField { field, attachment })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn literals_are_escaped() {
    assert_eq!(sql_literal(&Value::from("it's")), "'it''s'");
    assert_eq!(sql_literal(&Value::Integer(-3)), "-3");
    assert_eq!(sql_literal(&Value::Float(2.0)), "2.0");
    assert_eq!(sql_literal(&Value::Float(f64::NAN)), "NULL");
    assert_eq!(sql_literal(&Value::Boolean(true)), "1");
  }

  #[test]
  fn values_decode_by_declared_type() {
    assert_eq!(
      decode_value(DataType::Boolean, SqlValue::Integer(1)).unwrap(),
      Value::Boolean(true)
    );
    assert_eq!(
      decode_value(DataType::Float, SqlValue::Integer(2)).unwrap(),
      Value::Float(2.0)
    );
    assert!(decode_value(DataType::Integer, SqlValue::Text("x".into())).is_err());

    let now = Utc::now();
    let stored = encode_value(&Value::Date(now));
    let back = decode_value(DataType::Date, stored).unwrap();
    assert_eq!(back, Value::Date(now));
  }
}
