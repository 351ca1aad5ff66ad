//! The structural mutator: every function here runs inside one `BEGIN
//! IMMEDIATE` transaction, applies its DDL and bumps the model's marker
//! before returning. Any error drops the transaction, rolling back both.

use chrono::Utc;
use rusqlite::Transaction;
use shapeshift_core::{
  Error as CoreError,
  data_type::DataType,
  declaration::{AttachedField, Constraints, FieldAttachment, FieldDeclaration, ModelDeclaration},
  policy,
};
use uuid::Uuid;

use crate::{
  Result, ddl,
  encode::{encode_default, encode_dt, encode_uuid},
  meta,
};

// ─── Tables ──────────────────────────────────────────────────────────────────

pub fn create_model(
  tx: &Transaction<'_>,
  name: &str,
  table_name: &str,
) -> Result<ModelDeclaration> {
  if meta::get_model_by_name(tx, name)?.is_some() {
    return Err(CoreError::ModelExists(name.to_owned()).into());
  }
  if ddl::table_exists(tx, table_name)? {
    return Err(
      CoreError::StorageConflict(format!("table {table_name:?} already exists")).into(),
    );
  }

  let model_id = Uuid::new_v4();
  tx.execute(
    "INSERT INTO shapeshift_models (model_id, name, table_name, marker, created_at)
     VALUES (?1, ?2, ?3, 0, ?4)",
    rusqlite::params![encode_uuid(model_id), name, table_name, encode_dt(Utc::now())],
  )?;
  tx.execute_batch(&ddl::create_table_sql(table_name, &[]))?;
  meta::bump_marker(tx, model_id)?;

  meta::live_model(tx, model_id)
}

pub fn drop_table(tx: &Transaction<'_>, model_id: Uuid) -> Result<ModelDeclaration> {
  let model = meta::live_model(tx, model_id)?;

  tx.execute_batch(&format!(
    "DROP TABLE IF EXISTS {}",
    shapeshift_core::naming::quote_ident(&model.table_name)
  ))?;
  tx.execute(
    "DELETE FROM shapeshift_attachments WHERE model_id = ?1",
    rusqlite::params![encode_uuid(model_id)],
  )?;
  tx.execute(
    "UPDATE shapeshift_models SET purged_at = ?2 WHERE model_id = ?1",
    rusqlite::params![encode_uuid(model_id), encode_dt(Utc::now())],
  )?;
  meta::bump_marker(tx, model_id)?;

  meta::get_model(tx, model_id)?.ok_or(CoreError::ModelNotFound(model_id).into())
}

// ─── Columns ─────────────────────────────────────────────────────────────────

pub fn add_column(
  tx: &Transaction<'_>,
  model_id: Uuid,
  field_id: Uuid,
  constraints: Constraints,
) -> Result<AttachedField> {
  let model = meta::live_model(tx, model_id)?;
  let field = meta::get_field(tx, field_id)?.ok_or(CoreError::FieldNotFound(field_id))?;
  let constraints = policy::normalize_constraints(field.data_type, constraints)?;

  let before = meta::attached_fields(tx, model_id)?;
  if before.iter().any(|f| f.field.field_id == field_id) {
    return Err(CoreError::AlreadyAttached { model_id, field_id }.into());
  }
  if before.iter().any(|f| f.name() == field.name) {
    return Err(
      CoreError::StorageConflict(format!(
        "model {:?} already has a column named {:?}",
        model.name, field.name
      ))
      .into(),
    );
  }

  let stats = ddl::column_stats(tx, &model.table_name, None)?;
  policy::check_add_column(&constraints, &stats)?;

  let position = before.iter().map(|f| f.attachment.position + 1).max().unwrap_or(0);
  let attached = AttachedField {
    attachment: FieldAttachment {
      model_id,
      field_id,
      constraints,
      position,
      modified_at: Utc::now(),
    },
    field,
  };
  insert_attachment(tx, &attached.attachment)?;

  let mut after = before.clone();
  after.push(attached.clone());
  ddl::rebuild_table(tx, &model.table_name, &before, &after, None)?;
  meta::bump_marker(tx, model_id)?;

  Ok(attached)
}

pub fn alter_column(
  tx: &Transaction<'_>,
  model_id: Uuid,
  field_id: Uuid,
  constraints: Constraints,
) -> Result<AttachedField> {
  let model = meta::live_model(tx, model_id)?;
  let before = meta::attached_fields(tx, model_id)?;
  let current = before
    .iter()
    .find(|f| f.field.field_id == field_id)
    .ok_or(CoreError::NotAttached { model_id, field_id })?;

  let constraints = policy::normalize_constraints(current.data_type(), constraints)?;
  let stats = ddl::column_stats(tx, &model.table_name, Some(current.name()))?;
  let plan = policy::check_alter_column(current.constraints(), &constraints, &stats)?;

  let mut altered = current.clone();
  altered.attachment.constraints = constraints;
  altered.attachment.modified_at = Utc::now();
  update_attachment(tx, &altered.attachment)?;

  let after: Vec<AttachedField> = before
    .iter()
    .map(|f| if f.field.field_id == field_id { altered.clone() } else { f.clone() })
    .collect();
  let backfill = plan.backfill.as_ref().map(|v| (field_id, v));
  ddl::rebuild_table(tx, &model.table_name, &before, &after, backfill)?;
  meta::bump_marker(tx, model_id)?;

  Ok(altered)
}

pub fn drop_column(tx: &Transaction<'_>, model_id: Uuid, field_id: Uuid) -> Result<u64> {
  let model = meta::live_model(tx, model_id)?;
  let before = meta::attached_fields(tx, model_id)?;
  if !before.iter().any(|f| f.field.field_id == field_id) {
    return Err(CoreError::NotAttached { model_id, field_id }.into());
  }

  tx.execute(
    "DELETE FROM shapeshift_attachments WHERE model_id = ?1 AND field_id = ?2",
    rusqlite::params![encode_uuid(model_id), encode_uuid(field_id)],
  )?;
  let after: Vec<AttachedField> = before
    .iter()
    .filter(|f| f.field.field_id != field_id)
    .cloned()
    .collect();
  ddl::rebuild_table(tx, &model.table_name, &before, &after, None)?;

  meta::bump_marker(tx, model_id)
}

fn insert_attachment(tx: &Transaction<'_>, a: &FieldAttachment) -> Result<()> {
  tx.execute(
    "INSERT INTO shapeshift_attachments (
       model_id, field_id, required, is_unique, max_length, default_json,
       position, modified_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    rusqlite::params![
      encode_uuid(a.model_id),
      encode_uuid(a.field_id),
      a.constraints.required,
      a.constraints.unique,
      a.constraints.max_length,
      encode_default(a.constraints.default.as_ref())?,
      a.position,
      encode_dt(a.modified_at),
    ],
  )?;
  Ok(())
}

fn update_attachment(tx: &Transaction<'_>, a: &FieldAttachment) -> Result<()> {
  tx.execute(
    "UPDATE shapeshift_attachments
     SET required = ?3, is_unique = ?4, max_length = ?5, default_json = ?6,
         modified_at = ?7
     WHERE model_id = ?1 AND field_id = ?2",
    rusqlite::params![
      encode_uuid(a.model_id),
      encode_uuid(a.field_id),
      a.constraints.required,
      a.constraints.unique,
      a.constraints.max_length,
      encode_default(a.constraints.default.as_ref())?,
      encode_dt(a.modified_at),
    ],
  )?;
  Ok(())
}

// ─── Field declarations ──────────────────────────────────────────────────────

pub fn create_field(
  tx: &Transaction<'_>,
  name: &str,
  data_type: DataType,
) -> Result<FieldDeclaration> {
  let field = FieldDeclaration {
    field_id: Uuid::new_v4(),
    name: name.to_owned(),
    data_type,
    created_at: Utc::now(),
  };
  tx.execute(
    "INSERT INTO shapeshift_fields (field_id, name, data_type, created_at)
     VALUES (?1, ?2, ?3, ?4)",
    rusqlite::params![
      encode_uuid(field.field_id),
      field.name,
      data_type.as_str(),
      encode_dt(field.created_at),
    ],
  )?;
  Ok(field)
}

/// Existing rows are never migrated, so the type is fixed once attached.
pub fn retype_field(
  tx: &Transaction<'_>,
  field_id: Uuid,
  data_type: DataType,
) -> Result<FieldDeclaration> {
  let mut field = meta::get_field(tx, field_id)?.ok_or(CoreError::FieldNotFound(field_id))?;
  let attached = meta::attachment_count(tx, field_id)?;
  if attached > 0 && field.data_type != data_type {
    return Err(
      CoreError::Constraint(format!(
        "field {:?} is attached to {attached} model(s); its data type cannot change",
        field.name
      ))
      .into(),
    );
  }

  tx.execute(
    "UPDATE shapeshift_fields SET data_type = ?2 WHERE field_id = ?1",
    rusqlite::params![encode_uuid(field_id), data_type.as_str()],
  )?;
  field.data_type = data_type;
  Ok(field)
}

pub fn delete_field(tx: &Transaction<'_>, field_id: Uuid) -> Result<()> {
  if meta::get_field(tx, field_id)?.is_none() {
    return Err(CoreError::FieldNotFound(field_id).into());
  }
  if meta::attachment_count(tx, field_id)? > 0 {
    return Err(CoreError::FieldInUse(field_id).into());
  }
  tx.execute(
    "DELETE FROM shapeshift_fields WHERE field_id = ?1",
    rusqlite::params![encode_uuid(field_id)],
  )?;
  Ok(())
}
