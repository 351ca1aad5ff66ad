//! Error type for `shapeshift-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] shapeshift_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored value could not be read back as its declared type.
  #[error("decode error: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Whether `e` is SQLite refusing a write because of a table constraint.
pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _) if f.code == ErrorCode::ConstraintViolation
  )
}

impl From<Error> for shapeshift_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      Error::Sqlite(ref db) if is_constraint_violation(db) => {
        shapeshift_core::Error::Constraint(db.to_string())
      }
      Error::Database(tokio_rusqlite::Error::Rusqlite(ref db))
        if is_constraint_violation(db) =>
      {
        shapeshift_core::Error::Constraint(db.to_string())
      }
      other => shapeshift_core::Error::Storage(Box::new(other)),
    }
  }
}
