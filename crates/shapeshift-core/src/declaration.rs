//! Persisted schema declarations: models, fields, and the attachments that
//! join them.
//!
//! Declarations are plain data. Everything that enforces their invariants
//! lives in [`crate::policy`] and in the store implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::data_type::{DataType, Value};

// ─── Models ──────────────────────────────────────────────────────────────────

/// One dynamic record type and its storage table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDeclaration {
  pub model_id:   Uuid,
  /// Unique among live models; the source of the table and type names.
  pub name:       String,
  pub table_name: String,
  /// Advanced by exactly one per committed structural change.
  pub marker:     u64,
  pub created_at: DateTime<Utc>,
  /// Set when the model's table was dropped. The declaration itself is kept.
  pub purged_at:  Option<DateTime<Utc>>,
}

impl ModelDeclaration {
  pub fn is_purged(&self) -> bool { self.purged_at.is_some() }
}

/// Input to [`crate::store::SchemaStore::create_model`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewModel {
  pub name:       String,
  /// Explicit storage table name. When `None` it is derived from `name` by
  /// the catalog's naming scheme.
  pub table_name: Option<String>,
}

impl NewModel {
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), table_name: None }
  }

  pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
    self.table_name = Some(table_name.into());
    self
  }
}

// ─── Fields ──────────────────────────────────────────────────────────────────

/// A reusable field definition, independent of any model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
  pub field_id:   Uuid,
  /// Column and accessor name wherever the field is attached.
  pub name:       String,
  pub data_type:  DataType,
  pub created_at: DateTime<Utc>,
}

/// Input to [`crate::store::SchemaStore::create_field`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewField {
  pub name:      String,
  pub data_type: DataType,
}

impl NewField {
  pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
    Self { name: name.into(), data_type }
  }
}

// ─── Attachments ─────────────────────────────────────────────────────────────

/// Per-attachment constraints. The same field may carry different constraints
/// on different models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
  /// NOT NULL.
  #[serde(default)]
  pub required:   bool,
  #[serde(default)]
  pub unique:     bool,
  /// Mandatory for `character` fields, rejected for every other type.
  #[serde(default)]
  pub max_length: Option<u32>,
  /// Applied when a record omits the field, and used to backfill existing
  /// rows when a column becomes required.
  #[serde(default)]
  pub default:    Option<Value>,
}

impl Constraints {
  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }

  pub fn optional(mut self) -> Self {
    self.required = false;
    self
  }

  pub fn unique(mut self) -> Self {
    self.unique = true;
    self
  }

  pub fn max_length(mut self, n: u32) -> Self {
    self.max_length = Some(n);
    self
  }

  pub fn default_value(mut self, value: impl Into<Value>) -> Self {
    self.default = Some(value.into());
    self
  }
}

/// "Field X is a column of model Y with these constraints."
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldAttachment {
  pub model_id:    Uuid,
  pub field_id:    Uuid,
  pub constraints: Constraints,
  /// Attachment order within the model; columns and accessors follow it.
  pub position:    u32,
  pub modified_at: DateTime<Utc>,
}

/// An attachment joined with its field declaration: everything needed to
/// describe one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachedField {
  pub field:      FieldDeclaration,
  pub attachment: FieldAttachment,
}

impl AttachedField {
  pub fn name(&self) -> &str { &self.field.name }

  pub fn data_type(&self) -> DataType { self.field.data_type }

  pub fn constraints(&self) -> &Constraints { &self.attachment.constraints }
}

/// A model declaration together with its resolved fields, read in one
/// consistent snapshot so `fields` always matches `model.marker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSchema {
  pub model:  ModelDeclaration,
  pub fields: Vec<AttachedField>,
}
