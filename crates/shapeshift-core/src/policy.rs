//! Which structural changes are safe to apply.
//!
//! These checks are pure: the store measures the table (inside the same
//! transaction that will apply the change) and hands the measurements in as
//! a [`ColumnStats`].

use crate::{
  Error, Result,
  data_type::{DataType, Value},
  declaration::Constraints,
};

/// Facts about a table and one of its columns, gathered by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnStats {
  pub row_count:    u64,
  /// Longest existing value in the column, in characters. `None` when the
  /// column does not exist yet or holds no text.
  pub longest_text: Option<u64>,
}

impl ColumnStats {
  pub fn empty() -> Self { Self::default() }

  pub fn is_empty(&self) -> bool { self.row_count == 0 }
}

/// How the store must carry existing rows across an altered column.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterPlan {
  /// Replace NULLs with this value while copying rows.
  pub backfill: Option<Value>,
}

/// Validate `constraints` against the field's data type and normalise them.
///
/// A `Null` default is treated as no default; integer defaults on float
/// fields are widened.
pub fn normalize_constraints(
  data_type: DataType,
  constraints: Constraints,
) -> Result<Constraints> {
  let mut c = constraints;

  match (data_type.requires_max_length(), c.max_length) {
    (true, None) => {
      return Err(Error::Constraint(format!(
        "{data_type} fields require max_length"
      )));
    }
    (true, Some(0)) => {
      return Err(Error::Constraint("max_length must be at least 1".into()));
    }
    (false, Some(_)) => {
      return Err(Error::Constraint(format!(
        "max_length does not apply to {data_type} fields"
      )));
    }
    _ => {}
  }

  c.default = match c.default.take() {
    None | Some(Value::Null) => None,
    Some(v) => {
      let v = data_type
        .conform(v)
        .map_err(|reason| Error::Constraint(format!("invalid default: {reason}")))?;
      if let (Some(max), Some(len)) = (c.max_length, v.char_len())
        && len > max as usize
      {
        return Err(Error::Constraint(format!(
          "default is {len} characters, longer than max_length {max}"
        )));
      }
      Some(v)
    }
  };

  Ok(c)
}

/// Adding a required column without a default would leave existing rows
/// without a value.
pub fn check_add_column(constraints: &Constraints, stats: &ColumnStats) -> Result<()> {
  if constraints.required && constraints.default.is_none() && !stats.is_empty() {
    return Err(Error::Constraint(format!(
      "cannot add a required column without a default to a table with {} row(s)",
      stats.row_count
    )));
  }
  Ok(())
}

/// Decide whether `old` may become `new` given the current table contents.
///
/// Loosening, uniqueness changes and `max_length` increases always pass;
/// uniqueness over duplicate data is left to the storage engine to refuse.
pub fn check_alter_column(
  old: &Constraints,
  new: &Constraints,
  stats: &ColumnStats,
) -> Result<AlterPlan> {
  let mut plan = AlterPlan { backfill: None };

  if !old.required && new.required && !stats.is_empty() {
    match &new.default {
      Some(default) => plan.backfill = Some(default.clone()),
      None => {
        return Err(Error::Constraint(format!(
          "cannot make the column required without a default: the table has {} \
           row(s)",
          stats.row_count
        )));
      }
    }
  }

  if let (Some(old_max), Some(new_max)) = (old.max_length, new.max_length)
    && new_max < old_max
    && let Some(longest) = stats.longest_text
    && longest > u64::from(new_max)
  {
    return Err(Error::Constraint(format!(
      "cannot shrink max_length to {new_max}: an existing value has {longest} \
       characters"
    )));
  }

  Ok(plan)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rows(n: u64) -> ColumnStats { ColumnStats { row_count: n, longest_text: None } }

  #[test]
  fn character_requires_max_length() {
    let err = normalize_constraints(DataType::Character, Constraints::default());
    assert!(matches!(err, Err(Error::Constraint(_))));

    let ok =
      normalize_constraints(DataType::Character, Constraints::default().max_length(16));
    assert_eq!(ok.unwrap().max_length, Some(16));
  }

  #[test]
  fn max_length_rejected_for_other_types() {
    let err =
      normalize_constraints(DataType::Integer, Constraints::default().max_length(4));
    assert!(matches!(err, Err(Error::Constraint(_))));
  }

  #[test]
  fn defaults_are_checked_and_normalised() {
    let c = normalize_constraints(
      DataType::Float,
      Constraints::default().default_value(2_i64),
    )
    .unwrap();
    assert_eq!(c.default, Some(Value::Float(2.0)));

    let c = normalize_constraints(
      DataType::Text,
      Constraints::default().default_value(Value::Null),
    )
    .unwrap();
    assert_eq!(c.default, None);

    let err = normalize_constraints(
      DataType::Character,
      Constraints::default().max_length(3).default_value("toolong"),
    );
    assert!(matches!(err, Err(Error::Constraint(_))));

    let err = normalize_constraints(
      DataType::Boolean,
      Constraints::default().default_value("yes"),
    );
    assert!(matches!(err, Err(Error::Constraint(_))));
  }

  #[test]
  fn required_add_needs_default_on_populated_table() {
    let required = Constraints::default().required();
    assert!(check_add_column(&required, &rows(0)).is_ok());
    assert!(matches!(
      check_add_column(&required, &rows(3)),
      Err(Error::Constraint(_))
    ));
    let with_default = required.default_value(1_i64);
    assert!(check_add_column(&with_default, &rows(3)).is_ok());
  }

  #[test]
  fn tightening_required() {
    let old = Constraints::default();
    let new = Constraints::default().required();

    assert_eq!(check_alter_column(&old, &new, &rows(0)).unwrap().backfill, None);
    assert!(matches!(
      check_alter_column(&old, &new, &rows(1)),
      Err(Error::Constraint(_))
    ));

    let new = new.default_value("n/a");
    let plan = check_alter_column(&old, &new, &rows(1)).unwrap();
    assert_eq!(plan.backfill, Some(Value::from("n/a")));
  }

  #[test]
  fn loosening_always_passes() {
    let old = Constraints::default().required().unique();
    let new = Constraints::default();
    assert!(check_alter_column(&old, &new, &rows(10)).is_ok());
  }

  #[test]
  fn shrinking_max_length_checks_existing_values() {
    let old = Constraints::default().max_length(32);
    let new = Constraints::default().max_length(8);

    let short = ColumnStats { row_count: 2, longest_text: Some(5) };
    assert!(check_alter_column(&old, &new, &short).is_ok());

    let long = ColumnStats { row_count: 2, longest_text: Some(20) };
    assert!(matches!(
      check_alter_column(&old, &new, &long),
      Err(Error::Constraint(_))
    ));
  }
}
