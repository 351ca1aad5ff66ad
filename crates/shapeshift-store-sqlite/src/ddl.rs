//! DDL for the dynamic tables.
//!
//! SQLite's `ALTER TABLE` cannot add NOT NULL or UNIQUE columns, nor change
//! a column's constraints, so every column change rebuilds the table: create
//! a replacement with the target columns, copy the surviving data across,
//! drop the original and rename the replacement into place. SQLite DDL is
//! transactional, so a failed rebuild rolls back with everything else.

use rusqlite::{Connection, OptionalExtension as _, Transaction};
use shapeshift_core::{
  data_type::{DataType, Value},
  declaration::AttachedField,
  naming::{ROW_ID_COLUMN, quote_ident},
  policy::ColumnStats,
};
use uuid::Uuid;

use crate::{Result, encode::sql_literal};

/// Storage type for a field.
pub fn column_type(data_type: DataType, max_length: Option<u32>) -> String {
  match data_type {
    DataType::Character => format!("VARCHAR({})", max_length.unwrap_or(255)),
    DataType::Text => "TEXT".to_owned(),
    DataType::Integer => "INTEGER".to_owned(),
    DataType::Float => "REAL".to_owned(),
    DataType::Boolean => "BOOLEAN".to_owned(),
    DataType::Date => "TIMESTAMP".to_owned(),
  }
}

/// Full column definition, constraints inline.
pub fn column_def(field: &AttachedField) -> String {
  let name = quote_ident(field.name());
  let c = field.constraints();
  let mut def = format!("{name} {}", column_type(field.data_type(), c.max_length));

  if c.required {
    def.push_str(" NOT NULL");
  }
  if c.unique {
    def.push_str(" UNIQUE");
  }
  if let Some(default) = &c.default {
    def.push_str(" DEFAULT ");
    def.push_str(&sql_literal(default));
  }
  if let Some(max) = c.max_length {
    def.push_str(&format!(" CHECK (length({name}) <= {max})"));
  }
  if field.data_type() == DataType::Boolean {
    def.push_str(&format!(" CHECK ({name} IN (0, 1))"));
  }
  def
}

pub fn create_table_sql(table: &str, fields: &[AttachedField]) -> String {
  let mut columns =
    vec![format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident(ROW_ID_COLUMN))];
  columns.extend(fields.iter().map(column_def));
  format!("CREATE TABLE {} (\n  {}\n)", quote_ident(table), columns.join(",\n  "))
}

/// Whether any table, view or index named `name` exists (case-insensitively,
/// as SQLite resolves names).
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
  Ok(
    conn
      .query_row(
        "SELECT 1 FROM sqlite_master WHERE lower(name) = lower(?1)",
        rusqlite::params![name],
        |_| Ok(true),
      )
      .optional()?
      .unwrap_or(false),
  )
}

/// Row count of `table` and, if `column` is given, the longest text value in
/// it.
pub fn column_stats(conn: &Connection, table: &str, column: Option<&str>) -> Result<ColumnStats> {
  let table = quote_ident(table);
  let row_count: i64 =
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;

  let longest_text = match column {
    Some(col) => {
      let col = quote_ident(col);
      let longest: Option<i64> = conn.query_row(
        &format!("SELECT MAX(length({col})) FROM {table} WHERE typeof({col}) = 'text'"),
        [],
        |r| r.get(0),
      )?;
      longest.map(|n| n.max(0) as u64)
    }
    None => None,
  };

  Ok(ColumnStats { row_count: row_count.max(0) as u64, longest_text })
}

/// A name for the replacement table that no existing table, view or index
/// uses. Identifier rules let another model claim `{table}__rebuild`.
fn staging_name(conn: &Connection, table: &str) -> Result<String> {
  let base = format!("{table}__rebuild");
  let mut candidate = base.clone();
  let mut n = 1_u32;
  while table_exists(conn, &candidate)? {
    candidate = format!("{base}_{n}");
    n += 1;
  }
  Ok(candidate)
}

/// The AUTOINCREMENT high-water mark of `table`, if any row was ever
/// inserted.
fn sequence(conn: &Connection, table: &str) -> Result<Option<i64>> {
  Ok(
    conn
      .query_row(
        "SELECT seq FROM sqlite_sequence WHERE name = ?1",
        rusqlite::params![table],
        |r| r.get(0),
      )
      .optional()?,
  )
}

/// Replace `table` with one whose columns are `after`.
///
/// Columns present in both `before` and `after` (matched by field id) keep
/// their data; new columns take their default; removed columns are lost.
/// If `backfill` names a field, NULLs in that column are replaced with the
/// given value during the copy. The AUTOINCREMENT counter is carried over,
/// so ids of deleted rows are never handed out again.
pub fn rebuild_table(
  tx: &Transaction<'_>,
  table: &str,
  before: &[AttachedField],
  after: &[AttachedField],
  backfill: Option<(Uuid, &Value)>,
) -> Result<()> {
  let high_water = sequence(tx, table)?;
  let staging = staging_name(tx, table)?;
  tx.execute_batch(&create_table_sql(&staging, after))?;

  let kept: Vec<&AttachedField> = after
    .iter()
    .filter(|f| before.iter().any(|b| b.field.field_id == f.field.field_id))
    .collect();

  let mut targets = vec![quote_ident(ROW_ID_COLUMN)];
  let mut sources = vec![quote_ident(ROW_ID_COLUMN)];
  for field in kept {
    let col = quote_ident(field.name());
    let source = match backfill {
      Some((id, value)) if id == field.field.field_id => {
        format!("COALESCE({col}, {})", sql_literal(value))
      }
      _ => col.clone(),
    };
    targets.push(col);
    sources.push(source);
  }

  tx.execute_batch(&format!(
    "INSERT INTO {staging_q} ({targets}) SELECT {sources} FROM {table_q};
     DROP TABLE {table_q};
     ALTER TABLE {staging_q} RENAME TO {table_q};",
    staging_q = quote_ident(&staging),
    table_q = quote_ident(table),
    targets = targets.join(", "),
    sources = sources.join(", "),
  ))?;

  if let Some(seq) = high_water {
    let copied = sequence(tx, table)?.unwrap_or(0);
    tx.execute(
      "DELETE FROM sqlite_sequence WHERE name = ?1",
      rusqlite::params![table],
    )?;
    tx.execute(
      "INSERT INTO sqlite_sequence (name, seq) VALUES (?1, ?2)",
      rusqlite::params![table, seq.max(copied)],
    )?;
  }

  tracing::debug!(table, columns = after.len(), "rebuilt dynamic table");
  Ok(())
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use shapeshift_core::declaration::{Constraints, FieldAttachment, FieldDeclaration};

  use super::*;

  fn field(name: &str, data_type: DataType, constraints: Constraints) -> AttachedField {
    let field_id = Uuid::new_v4();
    AttachedField {
      field:      FieldDeclaration {
        field_id,
        name: name.into(),
        data_type,
        created_at: Utc::now(),
      },
      attachment: FieldAttachment {
        model_id: Uuid::new_v4(),
        field_id,
        constraints,
        position: 0,
        modified_at: Utc::now(),
      },
    }
  }

  #[test]
  fn column_definitions_carry_constraints() {
    let color = field(
      "color",
      DataType::Character,
      Constraints::default().required().unique().max_length(16),
    );
    assert_eq!(
      column_def(&color),
      "\"color\" VARCHAR(16) NOT NULL UNIQUE CHECK (length(\"color\") <= 16)"
    );

    let doors = field("doors", DataType::Integer, Constraints::default().default_value(4_i64));
    assert_eq!(column_def(&doors), "\"doors\" INTEGER DEFAULT 4");
  }

  #[test]
  fn create_table_has_identity_column() {
    let sql = create_table_sql("dyn_car", &[]);
    assert_eq!(
      sql,
      "CREATE TABLE \"dyn_car\" (\n  \"id\" INTEGER PRIMARY KEY AUTOINCREMENT\n)"
    );
  }

  #[test]
  fn rebuild_keeps_data_and_backfills() {
    let mut conn = Connection::open_in_memory().unwrap();
    let name = field("name", DataType::Text, Constraints::default());
    conn.execute_batch(&create_table_sql("t", std::slice::from_ref(&name))).unwrap();
    conn
      .execute_batch("INSERT INTO t (name) VALUES ('a'), (NULL);")
      .unwrap();

    let mut required = name.clone();
    required.attachment.constraints = Constraints::default().required().default_value("?");
    let extra = field("n", DataType::Integer, Constraints::default().default_value(0_i64));

    let tx = conn.transaction().unwrap();
    rebuild_table(
      &tx,
      "t",
      &[name.clone()],
      &[required.clone(), extra],
      Some((name.field.field_id, &Value::from("?"))),
    )
    .unwrap();
    tx.commit().unwrap();

    let rows: Vec<(i64, String, i64)> = conn
      .prepare("SELECT id, name, n FROM t ORDER BY id")
      .unwrap()
      .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
      .unwrap()
      .collect::<rusqlite::Result<_>>()
      .unwrap();
    assert_eq!(rows, vec![(1, "a".into(), 0), (2, "?".into(), 0)]);
    assert!(table_exists(&conn, "T").unwrap());
    assert!(!table_exists(&conn, "t__rebuild").unwrap());
  }

  #[test]
  fn rebuild_avoids_taken_staging_name() {
    let mut conn = Connection::open_in_memory().unwrap();
    let name = field("name", DataType::Text, Constraints::default());
    conn.execute_batch(&create_table_sql("t", std::slice::from_ref(&name))).unwrap();
    conn.execute_batch(&create_table_sql("t__rebuild", &[])).unwrap();
    conn.execute_batch("INSERT INTO t (name) VALUES ('a');").unwrap();

    let tx = conn.transaction().unwrap();
    assert_eq!(staging_name(&tx, "t").unwrap(), "t__rebuild_1");
    rebuild_table(&tx, "t", std::slice::from_ref(&name), &[], None).unwrap();
    tx.commit().unwrap();

    assert!(table_exists(&conn, "t__rebuild").unwrap());
    assert!(!table_exists(&conn, "t__rebuild_1").unwrap());
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
    assert_eq!(n, 1);
  }

  #[test]
  fn rebuild_keeps_autoincrement_high_water() {
    let mut conn = Connection::open_in_memory().unwrap();
    let name = field("name", DataType::Text, Constraints::default());
    conn.execute_batch(&create_table_sql("t", std::slice::from_ref(&name))).unwrap();
    conn
      .execute_batch("INSERT INTO t (name) VALUES ('a'), ('b'), ('c'); DELETE FROM t WHERE id >= 2;")
      .unwrap();

    let tx = conn.transaction().unwrap();
    rebuild_table(&tx, "t", std::slice::from_ref(&name), std::slice::from_ref(&name), None)
      .unwrap();
    tx.commit().unwrap();

    conn.execute_batch("INSERT INTO t (name) VALUES ('d');").unwrap();
    let id: i64 = conn
      .query_row("SELECT id FROM t WHERE name = 'd'", [], |r| r.get(0))
      .unwrap();
    assert_eq!(id, 4);
    assert_eq!(sequence(&conn, "t").unwrap(), Some(4));
  }
}
