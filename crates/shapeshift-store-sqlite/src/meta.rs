//! Synchronous metadata queries, run on the connection thread inside a
//! transaction opened by [`crate::SqliteStore`].

use rusqlite::{Connection, OptionalExtension as _};
use shapeshift_core::{
  declaration::{AttachedField, FieldDeclaration, ModelDeclaration, ModelSchema},
  Error as CoreError,
};
use uuid::Uuid;

use crate::{
  Result,
  encode::{RawAttachedField, RawField, RawModel, decode_marker, encode_uuid},
};

// ─── Models ──────────────────────────────────────────────────────────────────

pub fn get_model(conn: &Connection, model_id: Uuid) -> Result<Option<ModelDeclaration>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM shapeshift_models WHERE model_id = ?1", RawModel::COLUMNS),
      rusqlite::params![encode_uuid(model_id)],
      RawModel::from_row,
    )
    .optional()?;
  raw.map(RawModel::into_model).transpose()
}

pub fn get_model_by_name(conn: &Connection, name: &str) -> Result<Option<ModelDeclaration>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {} FROM shapeshift_models WHERE name = ?1 AND purged_at IS NULL",
        RawModel::COLUMNS
      ),
      rusqlite::params![name],
      RawModel::from_row,
    )
    .optional()?;
  raw.map(RawModel::into_model).transpose()
}

pub fn list_models(conn: &Connection, include_purged: bool) -> Result<Vec<ModelDeclaration>> {
  let filter = if include_purged { "" } else { "WHERE purged_at IS NULL" };
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM shapeshift_models {filter} ORDER BY created_at, name",
    RawModel::COLUMNS
  ))?;
  let raws = stmt
    .query_map([], RawModel::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawModel::into_model).collect()
}

/// The model, which must exist and not be purged.
pub fn live_model(conn: &Connection, model_id: Uuid) -> Result<ModelDeclaration> {
  let model = get_model(conn, model_id)?.ok_or(CoreError::ModelNotFound(model_id))?;
  if model.is_purged() {
    return Err(CoreError::ModelPurged(model_id).into());
  }
  Ok(model)
}

pub fn marker(conn: &Connection, model_id: Uuid) -> Result<u64> {
  let raw: Option<i64> = conn
    .query_row(
      "SELECT marker FROM shapeshift_models WHERE model_id = ?1",
      rusqlite::params![encode_uuid(model_id)],
      |r| r.get(0),
    )
    .optional()?;
  decode_marker(raw.ok_or(CoreError::ModelNotFound(model_id))?)
}

/// Advance the marker by one and return the new value.
pub fn bump_marker(conn: &Connection, model_id: Uuid) -> Result<u64> {
  let raw: i64 = conn.query_row(
    "UPDATE shapeshift_models SET marker = marker + 1 WHERE model_id = ?1
     RETURNING marker",
    rusqlite::params![encode_uuid(model_id)],
    |r| r.get(0),
  )?;
  decode_marker(raw)
}

// ─── Attachments ─────────────────────────────────────────────────────────────

pub fn attached_fields(conn: &Connection, model_id: Uuid) -> Result<Vec<AttachedField>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {}
     FROM shapeshift_attachments a
     JOIN shapeshift_fields f ON f.field_id = a.field_id
     WHERE a.model_id = ?1
     ORDER BY a.position",
    RawAttachedField::COLUMNS
  ))?;
  let raws = stmt
    .query_map(rusqlite::params![encode_uuid(model_id)], RawAttachedField::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawAttachedField::into_attached).collect()
}

pub fn load_schema(conn: &Connection, model_id: Uuid) -> Result<ModelSchema> {
  let model = get_model(conn, model_id)?.ok_or(CoreError::ModelNotFound(model_id))?;
  let fields = attached_fields(conn, model_id)?;
  Ok(ModelSchema { model, fields })
}

/// Number of models the field is attached to.
pub fn attachment_count(conn: &Connection, field_id: Uuid) -> Result<u64> {
  let n: i64 = conn.query_row(
    "SELECT COUNT(*) FROM shapeshift_attachments WHERE field_id = ?1",
    rusqlite::params![encode_uuid(field_id)],
    |r| r.get(0),
  )?;
  Ok(n.max(0) as u64)
}

// ─── Fields ──────────────────────────────────────────────────────────────────

pub fn get_field(conn: &Connection, field_id: Uuid) -> Result<Option<FieldDeclaration>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM shapeshift_fields WHERE field_id = ?1", RawField::COLUMNS),
      rusqlite::params![encode_uuid(field_id)],
      RawField::from_row,
    )
    .optional()?;
  raw.map(RawField::into_field).transpose()
}

pub fn list_fields(conn: &Connection) -> Result<Vec<FieldDeclaration>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {} FROM shapeshift_fields ORDER BY created_at, name",
    RawField::COLUMNS
  ))?;
  let raws = stmt
    .query_map([], RawField::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawField::into_field).collect()
}
