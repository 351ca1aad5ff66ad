//! Reading and writing records of generated types.
//!
//! Every access first compares the type's marker with the model's marker in
//! the same transaction, so a record is never written to, or read from, a
//! table whose shape has moved on.

use std::{collections::BTreeMap, sync::Arc};

use rusqlite::{Connection, OptionalExtension as _, types::Value as SqlValue};
use shapeshift_core::{
  Error as CoreError,
  factory::{GeneratedType, Record},
  naming::{ROW_ID_COLUMN, quote_ident},
};

use crate::{
  Error, Result,
  encode::{decode_value, encode_value},
  error::is_constraint_violation,
  meta,
};

/// Fail with `OutdatedModel` unless `ty` matches the live model's marker.
fn check_marker(conn: &Connection, ty: &GeneratedType) -> Result<()> {
  let model = meta::live_model(conn, ty.model_id())?;
  if model.marker != ty.marker() {
    return Err(
      CoreError::OutdatedModel {
        model_id: ty.model_id(),
        held:     ty.marker(),
        current:  model.marker,
      }
      .into(),
    );
  }
  Ok(())
}

pub fn insert(conn: &Connection, record: Record) -> Result<Record> {
  let ty = Arc::clone(record.generated_type());
  check_marker(conn, &ty)?;

  let table = quote_ident(ty.table_name());
  let (columns, values): (Vec<String>, Vec<SqlValue>) = record
    .values()
    .map(|(accessor, value)| (quote_ident(&accessor.name), encode_value(value)))
    .unzip();

  let sql = if columns.is_empty() {
    format!("INSERT INTO {table} DEFAULT VALUES")
  } else {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
      "INSERT INTO {table} ({}) VALUES ({})",
      columns.join(", "),
      placeholders.join(", ")
    )
  };

  match conn.execute(&sql, rusqlite::params_from_iter(values)) {
    Ok(_) => {}
    Err(e) if is_constraint_violation(&e) => return Err(constraint_to_validation(&ty, e)),
    Err(e) => return Err(e.into()),
  }

  let id = conn.last_insert_rowid();
  tracing::debug!(table = ty.table_name(), id, "inserted record");
  Ok(record.with_id(id))
}

/// Report a rejected row write against the field it names, when it names
/// one (SQLite says e.g. `UNIQUE constraint failed: dyn_car.plate`).
fn constraint_to_validation(ty: &GeneratedType, e: rusqlite::Error) -> Error {
  let message = e.to_string();
  let field = ty
    .accessors()
    .iter()
    .find(|a| message.contains(&format!("{}.{}", ty.table_name(), a.name)))
    .map(|a| a.name.clone());

  match field {
    Some(field) => CoreError::Validation { field, reason: message }.into(),
    None => e.into(),
  }
}

fn select_sql(ty: &GeneratedType) -> String {
  let mut columns = vec![quote_ident(ROW_ID_COLUMN)];
  columns.extend(ty.accessors().iter().map(|a| quote_ident(&a.name)));
  format!("SELECT {} FROM {}", columns.join(", "), quote_ident(ty.table_name()))
}

fn read_row(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<(i64, Vec<SqlValue>)> {
  let id = row.get(0)?;
  let values = (1..=width).map(|i| row.get(i)).collect::<rusqlite::Result<_>>()?;
  Ok((id, values))
}

fn into_record(ty: &Arc<GeneratedType>, id: i64, raw: Vec<SqlValue>) -> Result<Record> {
  let mut values = BTreeMap::new();
  for (accessor, value) in ty.accessors().iter().zip(raw) {
    values.insert(accessor.name.clone(), decode_value(accessor.data_type, value)?);
  }
  Ok(Record::from_row(Arc::clone(ty), id, values)?)
}

pub fn get(conn: &Connection, ty: &Arc<GeneratedType>, row_id: i64) -> Result<Option<Record>> {
  check_marker(conn, ty)?;
  let width = ty.accessors().len();
  let raw = conn
    .query_row(
      &format!("{} WHERE {} = ?1", select_sql(ty), quote_ident(ROW_ID_COLUMN)),
      rusqlite::params![row_id],
      |row| read_row(row, width),
    )
    .optional()?;
  raw.map(|(id, values)| into_record(ty, id, values)).transpose()
}

pub fn list(
  conn: &Connection,
  ty: &Arc<GeneratedType>,
  limit: Option<usize>,
  offset: Option<usize>,
) -> Result<Vec<Record>> {
  check_marker(conn, ty)?;
  let width = ty.accessors().len();
  let limit_val = limit.map_or(-1, |l| l as i64);
  let offset_val = offset.unwrap_or(0) as i64;

  let mut stmt = conn.prepare(&format!(
    "{} ORDER BY {} LIMIT ?1 OFFSET ?2",
    select_sql(ty),
    quote_ident(ROW_ID_COLUMN)
  ))?;
  let raws = stmt
    .query_map(rusqlite::params![limit_val, offset_val], |row| read_row(row, width))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  raws
    .into_iter()
    .map(|(id, values)| into_record(ty, id, values))
    .collect()
}

pub fn count(conn: &Connection, model_id: uuid::Uuid) -> Result<u64> {
  let model = meta::live_model(conn, model_id)?;
  let n: i64 = conn.query_row(
    &format!("SELECT COUNT(*) FROM {}", quote_ident(&model.table_name)),
    [],
    |r| r.get(0),
  )?;
  Ok(n.max(0) as u64)
}
