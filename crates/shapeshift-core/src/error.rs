//! Error types for `shapeshift-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// A structural change would violate a safety invariant.
  #[error("constraint error: {0}")]
  Constraint(String),

  /// A derived table or column name collides with something we do not own.
  #[error("storage conflict: {0}")]
  StorageConflict(String),

  /// A write went through a generated type built for an older marker.
  #[error(
    "model {model_id} is outdated: held marker {held}, current marker {current}"
  )]
  OutdatedModel {
    model_id: Uuid,
    held:     u64,
    current:  u64,
  },

  #[error("model not found: {0}")]
  ModelNotFound(Uuid),

  #[error("no model named {0:?}")]
  ModelNameNotFound(String),

  #[error("a model named {0:?} already exists")]
  ModelExists(String),

  #[error("model {0} has been purged")]
  ModelPurged(Uuid),

  #[error("field not found: {0}")]
  FieldNotFound(Uuid),

  #[error("field {field_id} is already attached to model {model_id}")]
  AlreadyAttached { model_id: Uuid, field_id: Uuid },

  #[error("field {field_id} is not attached to model {model_id}")]
  NotAttached { model_id: Uuid, field_id: Uuid },

  #[error("field {0} is still attached to at least one model")]
  FieldInUse(Uuid),

  #[error("invalid name {0:?}: expected a lowercase identifier")]
  InvalidName(String),

  #[error("unknown data type: {0:?}")]
  UnknownDataType(String),

  #[error("invalid value for {field:?}: {reason}")]
  Validation { field: String, reason: String },

  #[error("no field named {0:?} on this type")]
  UnknownField(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A storage-engine failure, propagated after the transaction rolled back.
  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
    Self::Validation { field: field.to_owned(), reason: reason.into() }
  }

  /// True for the errors a caller can recover from by re-fetching the type.
  pub fn is_outdated(&self) -> bool { matches!(self, Self::OutdatedModel { .. }) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
