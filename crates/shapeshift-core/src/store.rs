//! The `SchemaStore` trait: metadata persistence plus the structural
//! mutator.
//!
//! Metadata and storage structure live behind one trait because every
//! structural change must commit together with its marker bump. Backends
//! (e.g. `shapeshift-store-sqlite`) run each structural method as a single
//! transaction; the [`crate::catalog::Catalog`] adds per-model serialization
//! on top.

use std::{future::Future, sync::Arc};

use uuid::Uuid;

use crate::{
  data_type::DataType,
  declaration::{
    AttachedField, Constraints, FieldDeclaration, ModelDeclaration, ModelSchema,
    NewField,
  },
  factory::{GeneratedType, Record},
};

/// Abstraction over a schema store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait SchemaStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Models ────────────────────────────────────────────────────────────

  /// Insert a model declaration and create its empty table in one
  /// transaction. The returned declaration has marker 1.
  ///
  /// Fails with `ModelExists` if a live model already uses `name`, and with
  /// `StorageConflict` if `table_name` already exists in storage.
  fn create_model(
    &self,
    name: String,
    table_name: String,
  ) -> impl Future<Output = Result<ModelDeclaration, Self::Error>> + Send + '_;

  /// Retrieve a model (live or purged) by id. Returns `None` if not found.
  fn get_model(
    &self,
    model_id: Uuid,
  ) -> impl Future<Output = Result<Option<ModelDeclaration>, Self::Error>> + Send + '_;

  /// Retrieve the live model called `name`.
  fn get_model_by_name(
    &self,
    name: String,
  ) -> impl Future<Output = Result<Option<ModelDeclaration>, Self::Error>> + Send + '_;

  fn list_models(
    &self,
    include_purged: bool,
  ) -> impl Future<Output = Result<Vec<ModelDeclaration>, Self::Error>> + Send + '_;

  /// The authoritative modification marker for a model.
  fn model_marker(
    &self,
    model_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// The declaration and its attached fields, read in one snapshot.
  fn load_schema(
    &self,
    model_id: Uuid,
  ) -> impl Future<Output = Result<ModelSchema, Self::Error>> + Send + '_;

  /// The model's field attachments, in column order. Fails with
  /// `ModelNotFound` for an unknown model.
  fn list_attachments(
    &self,
    model_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AttachedField>, Self::Error>> + Send + '_;

  // ── Fields ────────────────────────────────────────────────────────────

  fn create_field(
    &self,
    input: NewField,
  ) -> impl Future<Output = Result<FieldDeclaration, Self::Error>> + Send + '_;

  fn get_field(
    &self,
    field_id: Uuid,
  ) -> impl Future<Output = Result<Option<FieldDeclaration>, Self::Error>> + Send + '_;

  fn list_fields(
    &self,
  ) -> impl Future<Output = Result<Vec<FieldDeclaration>, Self::Error>> + Send + '_;

  /// Change a field's data type. Only allowed while it is attached nowhere.
  fn retype_field(
    &self,
    field_id: Uuid,
    data_type: DataType,
  ) -> impl Future<Output = Result<FieldDeclaration, Self::Error>> + Send + '_;

  /// Delete a field declaration. Only allowed while it is attached nowhere.
  fn delete_field(
    &self,
    field_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Structural changes ────────────────────────────────────────────────

  /// Attach a field as a new column and bump the marker.
  fn add_column(
    &self,
    model_id: Uuid,
    field_id: Uuid,
    constraints: Constraints,
  ) -> impl Future<Output = Result<AttachedField, Self::Error>> + Send + '_;

  /// Change an attachment's constraints in place and bump the marker.
  fn alter_column(
    &self,
    model_id: Uuid,
    field_id: Uuid,
    constraints: Constraints,
  ) -> impl Future<Output = Result<AttachedField, Self::Error>> + Send + '_;

  /// Detach a field, dropping its column and data, and bump the marker.
  /// Returns the new marker.
  fn drop_column(
    &self,
    model_id: Uuid,
    field_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Drop the model's table and attachments, mark the declaration purged and
  /// bump the marker.
  fn drop_table(
    &self,
    model_id: Uuid,
  ) -> impl Future<Output = Result<ModelDeclaration, Self::Error>> + Send + '_;

  // ── Rows ──────────────────────────────────────────────────────────────

  /// Insert a record. The record's type marker is compared with the model's
  /// marker inside the write transaction; a mismatch fails with
  /// `OutdatedModel`.
  fn insert_row(
    &self,
    record: Record,
  ) -> impl Future<Output = Result<Record, Self::Error>> + Send + '_;

  fn get_row(
    &self,
    ty: Arc<GeneratedType>,
    row_id: i64,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;

  fn list_rows(
    &self,
    ty: Arc<GeneratedType>,
    limit: Option<usize>,
    offset: Option<usize>,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + '_;

  fn count_rows(
    &self,
    model_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;
}
