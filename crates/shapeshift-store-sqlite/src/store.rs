//! [`SqliteStore`], the SQLite implementation of [`SchemaStore`].

use std::{path::Path, sync::Arc};

use rusqlite::{Transaction, TransactionBehavior};
use uuid::Uuid;

use shapeshift_core::{
  Error as CoreError,
  data_type::DataType,
  declaration::{
    AttachedField, Constraints, FieldDeclaration, ModelDeclaration, ModelSchema,
    NewField,
  },
  factory::{GeneratedType, Record},
  store::SchemaStore,
};

use crate::{Result, meta, mutator, rows, schema::SCHEMA};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Shapeshift schema store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` in a `BEGIN IMMEDIATE` transaction, committing only if it
  /// succeeds. Taking the write lock up front serializes writers, including
  /// other processes sharing the database file.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match f(&tx) {
          Ok(out) => {
            tx.commit()?;
            Ok(Ok(out))
          }
          // Dropping `tx` rolls back.
          Err(e) => Ok(Err(e)),
        }
      })
      .await?
  }

  /// Run `f` in a read transaction so multi-statement reads see one
  /// snapshot.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Transaction<'_>) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        Ok(f(&tx))
      })
      .await?
  }
}

// ─── SchemaStore impl ────────────────────────────────────────────────────────

impl SchemaStore for SqliteStore {
  type Error = crate::Error;

  // ── Models ────────────────────────────────────────────────────────────────

  async fn create_model(&self, name: String, table_name: String) -> Result<ModelDeclaration> {
    self
      .write(move |tx| mutator::create_model(tx, &name, &table_name))
      .await
  }

  async fn get_model(&self, model_id: Uuid) -> Result<Option<ModelDeclaration>> {
    self.read(move |tx| meta::get_model(tx, model_id)).await
  }

  async fn get_model_by_name(&self, name: String) -> Result<Option<ModelDeclaration>> {
    self.read(move |tx| meta::get_model_by_name(tx, &name)).await
  }

  async fn list_models(&self, include_purged: bool) -> Result<Vec<ModelDeclaration>> {
    self.read(move |tx| meta::list_models(tx, include_purged)).await
  }

  async fn model_marker(&self, model_id: Uuid) -> Result<u64> {
    self.read(move |tx| meta::marker(tx, model_id)).await
  }

  async fn load_schema(&self, model_id: Uuid) -> Result<ModelSchema> {
    self.read(move |tx| meta::load_schema(tx, model_id)).await
  }

  async fn list_attachments(&self, model_id: Uuid) -> Result<Vec<AttachedField>> {
    self
      .read(move |tx| {
        meta::get_model(tx, model_id)?
          .ok_or(CoreError::ModelNotFound(model_id))?;
        meta::attached_fields(tx, model_id)
      })
      .await
  }

  // ── Fields ────────────────────────────────────────────────────────────────

  async fn create_field(&self, input: NewField) -> Result<FieldDeclaration> {
    self
      .write(move |tx| mutator::create_field(tx, &input.name, input.data_type))
      .await
  }

  async fn get_field(&self, field_id: Uuid) -> Result<Option<FieldDeclaration>> {
    self.read(move |tx| meta::get_field(tx, field_id)).await
  }

  async fn list_fields(&self) -> Result<Vec<FieldDeclaration>> {
    self.read(|tx| meta::list_fields(tx)).await
  }

  async fn retype_field(&self, field_id: Uuid, data_type: DataType) -> Result<FieldDeclaration> {
    self
      .write(move |tx| mutator::retype_field(tx, field_id, data_type))
      .await
  }

  async fn delete_field(&self, field_id: Uuid) -> Result<()> {
    self.write(move |tx| mutator::delete_field(tx, field_id)).await
  }

  // ── Structural changes ────────────────────────────────────────────────────

  async fn add_column(
    &self,
    model_id:    Uuid,
    field_id:    Uuid,
    constraints: Constraints,
  ) -> Result<AttachedField> {
    self
      .write(move |tx| mutator::add_column(tx, model_id, field_id, constraints))
      .await
  }

  async fn alter_column(
    &self,
    model_id:    Uuid,
    field_id:    Uuid,
    constraints: Constraints,
  ) -> Result<AttachedField> {
    self
      .write(move |tx| mutator::alter_column(tx, model_id, field_id, constraints))
      .await
  }

  async fn drop_column(&self, model_id: Uuid, field_id: Uuid) -> Result<u64> {
    self
      .write(move |tx| mutator::drop_column(tx, model_id, field_id))
      .await
  }

  async fn drop_table(&self, model_id: Uuid) -> Result<ModelDeclaration> {
    self.write(move |tx| mutator::drop_table(tx, model_id)).await
  }

  // ── Rows ──────────────────────────────────────────────────────────────────

  async fn insert_row(&self, record: Record) -> Result<Record> {
    self.write(move |tx| rows::insert(tx, record)).await
  }

  async fn get_row(&self, ty: Arc<GeneratedType>, row_id: i64) -> Result<Option<Record>> {
    self.read(move |tx| rows::get(tx, &ty, row_id)).await
  }

  async fn list_rows(
    &self,
    ty:     Arc<GeneratedType>,
    limit:  Option<usize>,
    offset: Option<usize>,
  ) -> Result<Vec<Record>> {
    self.read(move |tx| rows::list(tx, &ty, limit, offset)).await
  }

  async fn count_rows(&self, model_id: Uuid) -> Result<u64> {
    self.read(move |tx| rows::count(tx, model_id)).await
  }
}
