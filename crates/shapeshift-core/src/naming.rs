//! Identifier validation and name derivation.

use convert_case::{Case, Casing as _};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Column name of the implicit row identity. Fields may not use it.
pub const ROW_ID_COLUMN: &str = "id";

/// Longest accepted model, field, or table name.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// How model names map onto storage table names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingScheme {
  /// Prepended to the model name, keeping dynamic tables apart from the
  /// store's own metadata tables.
  pub table_prefix: String,
}

impl Default for NamingScheme {
  fn default() -> Self { Self { table_prefix: "dyn_".to_owned() } }
}

impl NamingScheme {
  pub fn new(table_prefix: impl Into<String>) -> Self {
    Self { table_prefix: table_prefix.into() }
  }

  /// `car` → `dyn_car` under the default prefix.
  pub fn table_name(&self, model_name: &str) -> String {
    format!("{}{}", self.table_prefix, model_name)
  }
}

/// Readable type name for a model: `sports_car` → `SportsCar`.
pub fn type_name(model_name: &str) -> String { model_name.to_case(Case::Pascal) }

/// Accept `[a-z][a-z0-9_]*`, at most [`MAX_IDENTIFIER_LEN`] characters.
pub fn validate_identifier(name: &str) -> Result<()> {
  let mut chars = name.chars();
  let head_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
  let tail_ok =
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

  if head_ok && tail_ok && name.len() <= MAX_IDENTIFIER_LEN {
    Ok(())
  } else {
    Err(Error::InvalidName(name.to_owned()))
  }
}

/// Field names follow identifier rules and may not shadow the row id.
pub fn validate_field_name(name: &str) -> Result<()> {
  validate_identifier(name)?;
  if name == ROW_ID_COLUMN {
    return Err(Error::InvalidName(name.to_owned()));
  }
  Ok(())
}

/// Double-quote an identifier for use in SQL.
pub fn quote_ident(name: &str) -> String { format!("\"{}\"", name.replace('"', "\"\"")) }
