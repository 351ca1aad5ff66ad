//! The type factory: turns a model schema into a [`GeneratedType`].
//!
//! A generated type is the runtime stand-in for a struct definition. It knows
//! its storage table, the marker it was built for, and one [`Accessor`] per
//! attached field carrying that attachment's constraints. Records of the type
//! are built through [`RecordBuilder`], which enforces those constraints
//! before anything reaches storage.

use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  data_type::{DataType, Value},
  declaration::{Constraints, ModelSchema},
  naming,
};

// ─── Generated type ──────────────────────────────────────────────────────────

/// A typed accessor for one field of a generated type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accessor {
  pub field_id:    Uuid,
  pub name:        String,
  pub data_type:   DataType,
  pub constraints: Constraints,
}

impl Accessor {
  /// Check one value against this accessor, returning it in canonical form.
  pub fn check(&self, value: Value) -> Result<Value> {
    let value = self
      .data_type
      .conform(value)
      .map_err(|reason| Error::validation(&self.name, reason))?;

    if value.is_null() && self.constraints.required {
      return Err(Error::validation(&self.name, "a value is required"));
    }

    if let (Some(max), Some(len)) = (self.constraints.max_length, value.char_len())
      && len > max as usize
    {
      return Err(Error::validation(
        &self.name,
        format!("{len} characters exceeds max_length {max}"),
      ));
    }

    Ok(value)
  }
}

/// The synthesized type for one model at one marker value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedType {
  model_id:   Uuid,
  marker:     u64,
  type_name:  String,
  table_name: String,
  accessors:  Vec<Accessor>,
}

impl GeneratedType {
  pub fn model_id(&self) -> Uuid { self.model_id }

  pub fn marker(&self) -> u64 { self.marker }

  pub fn type_name(&self) -> &str { &self.type_name }

  pub fn table_name(&self) -> &str { &self.table_name }

  /// Accessors in attachment order.
  pub fn accessors(&self) -> &[Accessor] { &self.accessors }

  pub fn accessor(&self, name: &str) -> Option<&Accessor> {
    self.accessors.iter().find(|a| a.name == name)
  }

  pub fn has_accessor(&self, name: &str) -> bool { self.accessor(name).is_some() }

  /// Start building a record of this type.
  pub fn record(self: &Arc<Self>) -> RecordBuilder {
    RecordBuilder { ty: Arc::clone(self), values: BTreeMap::new(), error: None }
  }
}

/// Synthesize a type from a consistent schema snapshot.
///
/// Pure: the same schema always yields an equal (though not identical)
/// type. Sharing one instance per marker is the cache's job.
pub fn synthesize(schema: &ModelSchema) -> GeneratedType {
  let mut fields: Vec<_> = schema.fields.iter().collect();
  fields.sort_by_key(|f| f.attachment.position);

  GeneratedType {
    model_id:   schema.model.model_id,
    marker:     schema.model.marker,
    type_name:  naming::type_name(&schema.model.name),
    table_name: schema.model.table_name.clone(),
    accessors:  fields
      .into_iter()
      .map(|f| Accessor {
        field_id:    f.field.field_id,
        name:        f.field.name.clone(),
        data_type:   f.field.data_type,
        constraints: f.attachment.constraints.clone(),
      })
      .collect(),
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Collects field values for a new record; validation happens in
/// [`RecordBuilder::build`].
#[derive(Debug)]
pub struct RecordBuilder {
  ty:     Arc<GeneratedType>,
  values: BTreeMap<String, Value>,
  error:  Option<Error>,
}

impl RecordBuilder {
  pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
    if self.error.is_none() {
      if self.ty.has_accessor(name) {
        self.values.insert(name.to_owned(), value.into());
      } else {
        self.error = Some(Error::UnknownField(name.to_owned()));
      }
    }
    self
  }

  /// Apply defaults, then check every accessor.
  pub fn build(self) -> Result<Record> {
    if let Some(e) = self.error {
      return Err(e);
    }
    Record::validated(self.ty, None, self.values, Defaults::Apply)
  }
}

/// Whether absent values take the accessor's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Defaults {
  Apply,
  /// Stored rows report what is in storage, NULLs included.
  Skip,
}

/// An instance of a [`GeneratedType`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
  ty:     Arc<GeneratedType>,
  id:     Option<i64>,
  values: BTreeMap<String, Value>,
}

impl Record {
  fn validated(
    ty: Arc<GeneratedType>,
    id: Option<i64>,
    mut values: BTreeMap<String, Value>,
    defaults: Defaults,
  ) -> Result<Self> {
    let mut checked = BTreeMap::new();
    for accessor in ty.accessors() {
      let raw = match (values.remove(&accessor.name), defaults) {
        (Some(v), _) if !v.is_null() => v,
        (_, Defaults::Apply) => accessor.constraints.default.clone().unwrap_or(Value::Null),
        (_, Defaults::Skip) => Value::Null,
      };
      checked.insert(accessor.name.clone(), accessor.check(raw)?);
    }
    if let Some(name) = values.into_keys().next() {
      return Err(Error::UnknownField(name));
    }
    Ok(Self { ty, id, values: checked })
  }

  /// Rebuild a record read back from storage. Values are still checked so a
  /// row that no longer fits the type is reported rather than returned, but
  /// defaults are not applied: a stored NULL reads back as `Null`.
  pub fn from_row(
    ty: Arc<GeneratedType>,
    id: i64,
    values: BTreeMap<String, Value>,
  ) -> Result<Self> {
    Self::validated(ty, Some(id), values, Defaults::Skip)
  }

  pub fn generated_type(&self) -> &Arc<GeneratedType> { &self.ty }

  /// Row id, once the record has been saved.
  pub fn id(&self) -> Option<i64> { self.id }

  pub fn with_id(mut self, id: i64) -> Self {
    self.id = Some(id);
    self
  }

  pub fn get(&self, name: &str) -> Option<&Value> { self.values.get(name) }

  /// Values in accessor order.
  pub fn values(&self) -> impl Iterator<Item = (&Accessor, &Value)> {
    self
      .ty
      .accessors()
      .iter()
      .filter_map(|a| self.values.get(&a.name).map(|v| (a, v)))
  }

  /// Replace one value, re-checking it against its accessor.
  pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
    let accessor = self
      .ty
      .accessor(name)
      .ok_or_else(|| Error::UnknownField(name.to_owned()))?;
    let value = accessor.check(value.into())?;
    self.values.insert(name.to_owned(), value);
    Ok(())
  }

  /// JSON object of the record's values, with its id if it has one.
  pub fn to_json(&self) -> Result<serde_json::Value> {
    let mut map = serde_json::Map::new();
    if let Some(id) = self.id {
      map.insert(naming::ROW_ID_COLUMN.to_owned(), id.into());
    }
    for (accessor, value) in self.values() {
      let json = match value {
        Value::Null => serde_json::Value::Null,
        Value::Text(s) => s.clone().into(),
        Value::Integer(i) => (*i).into(),
        Value::Float(f) => serde_json::to_value(f)?,
        Value::Boolean(b) => (*b).into(),
        Value::Date(d) => d.to_rfc3339().into(),
      };
      map.insert(accessor.name.clone(), json);
    }
    Ok(serde_json::Value::Object(map))
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::declaration::{
    AttachedField, FieldAttachment, FieldDeclaration, ModelDeclaration,
  };

  fn schema(fields: Vec<(&str, DataType, Constraints)>) -> ModelSchema {
    let model_id = Uuid::new_v4();
    ModelSchema {
      model:  ModelDeclaration {
        model_id,
        name:       "sports_car".into(),
        table_name: "dyn_sports_car".into(),
        marker:     4,
        created_at: Utc::now(),
        purged_at:  None,
      },
      fields: fields
        .into_iter()
        .enumerate()
        .rev()
        .map(|(i, (name, data_type, constraints))| AttachedField {
          field:      FieldDeclaration {
            field_id: Uuid::new_v4(),
            name: name.into(),
            data_type,
            created_at: Utc::now(),
          },
          attachment: FieldAttachment {
            model_id,
            field_id: Uuid::new_v4(),
            constraints,
            position: i as u32,
            modified_at: Utc::now(),
          },
        })
        .collect(),
    }
  }

  fn car_type() -> Arc<GeneratedType> {
    Arc::new(synthesize(&schema(vec![
      ("color", DataType::Character, Constraints::default().required().max_length(16)),
      ("doors", DataType::Integer, Constraints::default().default_value(4_i64)),
      ("weight", DataType::Float, Constraints::default()),
    ])))
  }

  #[test]
  fn synthesize_names_and_orders_accessors() {
    let ty = car_type();
    assert_eq!(ty.type_name(), "SportsCar");
    assert_eq!(ty.table_name(), "dyn_sports_car");
    assert_eq!(ty.marker(), 4);
    let names: Vec<_> = ty.accessors().iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["color", "doors", "weight"]);
  }

  #[test]
  fn synthesize_is_pure() {
    let s = schema(vec![("name", DataType::Text, Constraints::default())]);
    assert_eq!(synthesize(&s), synthesize(&s));
  }

  #[test]
  fn build_applies_defaults_and_checks() {
    let ty = car_type();
    let rec = ty.record().set("color", "red").set("weight", 900_i64).build().unwrap();
    assert_eq!(rec.get("color"), Some(&Value::from("red")));
    assert_eq!(rec.get("doors"), Some(&Value::Integer(4)));
    assert_eq!(rec.get("weight"), Some(&Value::Float(900.0)));
    assert_eq!(rec.id(), None);
  }

  #[test]
  fn from_row_keeps_stored_nulls() {
    let ty = car_type();
    let values = BTreeMap::from([
      ("color".to_owned(), Value::from("red")),
      ("doors".to_owned(), Value::Null),
    ]);
    let rec = Record::from_row(ty, 3, values).unwrap();
    assert_eq!(rec.id(), Some(3));
    assert_eq!(rec.get("doors"), Some(&Value::Null));
    assert_eq!(rec.get("weight"), Some(&Value::Null));
  }

  #[test]
  fn build_rejects_missing_required() {
    let err = car_type().record().build().unwrap_err();
    assert!(matches!(err, Error::Validation { ref field, .. } if field == "color"));
  }

  #[test]
  fn build_rejects_overlong_text() {
    let err = car_type()
      .record()
      .set("color", "a".repeat(17))
      .build()
      .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert!(car_type().record().set("color", "a".repeat(16)).build().is_ok());
  }

  #[test]
  fn build_rejects_wrong_type_and_unknown_field() {
    let err = car_type().record().set("color", 7_i64).build().unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));

    let err = car_type()
      .record()
      .set("color", "red")
      .set("wings", 2_i64)
      .build()
      .unwrap_err();
    assert!(matches!(err, Error::UnknownField(ref f) if f == "wings"));
  }

  #[test]
  fn set_rechecks_value() {
    let mut rec = car_type().record().set("color", "red").build().unwrap();
    assert!(rec.set("color", Value::Null).is_err());
    rec.set("color", "blue").unwrap();
    assert_eq!(rec.get("color").and_then(Value::as_str), Some("blue"));
  }

  #[test]
  fn to_json_includes_id() {
    let rec = car_type()
      .record()
      .set("color", "red")
      .build()
      .unwrap()
      .with_id(7);
    let json = rec.to_json().unwrap();
    assert_eq!(json["id"], 7);
    assert_eq!(json["color"], "red");
    assert_eq!(json["doors"], 4);
    assert!(json["weight"].is_null());
  }
}
