//! Subcommands and their execution against a [`Catalog`].

use std::io::Write;

use anyhow::{Context as _, anyhow, bail};
use clap::{Args, Subcommand};
use shapeshift_core::{
  catalog::{Catalog, DynamicModel},
  data_type::{DataType, Value},
  declaration::{Constraints, FieldDeclaration, ModelDeclaration, NewModel},
  store::SchemaStore,
};
use uuid::Uuid;

// ─── Command tree ─────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Create, inspect and destroy models.
  #[command(subcommand)]
  Model(ModelCommand),

  /// Manage field declarations.
  #[command(subcommand)]
  Field(FieldCommand),

  /// Attach a field to a model as a new column.
  Attach(AttachArgs),

  /// Change the constraints of an attached field.
  Update(AttachArgs),

  /// Detach a field from a model, dropping its column.
  Detach {
    model: String,
    /// Field name or id.
    field: String,
  },

  /// Inspect generated types.
  #[command(subcommand)]
  Type(TypeCommand),

  /// Insert and list records.
  #[command(subcommand)]
  Record(RecordCommand),
}

#[derive(Subcommand, Debug)]
pub enum ModelCommand {
  Create {
    name:  String,
    /// Storage table name; derived from the name when omitted.
    #[arg(long)]
    table: Option<String>,
  },
  List {
    /// Include destroyed models.
    #[arg(long)]
    all: bool,
  },
  /// Show a model's declaration and attached fields.
  Show { name: String },
  /// Drop the model's table. The declaration is kept, marked purged.
  Destroy { name: String },
}

#[derive(Subcommand, Debug)]
pub enum FieldCommand {
  Create {
    name:      String,
    #[arg(value_parser = parse_data_type)]
    data_type: DataType,
  },
  List,
  /// Change the data type of a field that is attached nowhere.
  Retype {
    field:     String,
    #[arg(value_parser = parse_data_type)]
    data_type: DataType,
  },
  Delete { field: String },
  /// List the supported data types.
  Types,
}

#[derive(Subcommand, Debug)]
pub enum TypeCommand {
  /// Print the model's current generated type as JSON.
  Show { model: String },
}

#[derive(Subcommand, Debug)]
pub enum RecordCommand {
  /// Insert a record from `field=value` pairs.
  Insert {
    model:  String,
    #[arg(value_parser = parse_assignment)]
    values: Vec<(String, String)>,
  },
  /// Print records as JSON lines.
  List {
    model:  String,
    #[arg(long)]
    limit:  Option<usize>,
    #[arg(long)]
    offset: Option<usize>,
  },
  Count { model: String },
}

#[derive(Args, Debug)]
pub struct AttachArgs {
  pub model: String,
  /// Field name or id.
  pub field: String,
  #[command(flatten)]
  pub constraints: ConstraintArgs,
}

#[derive(Args, Debug, Default)]
pub struct ConstraintArgs {
  /// Reject NULL values.
  #[arg(long)]
  pub required:   bool,
  #[arg(long)]
  pub unique:     bool,
  /// Maximum length in characters (character fields only).
  #[arg(long)]
  pub max_length: Option<u32>,
  /// Default value, parsed according to the field's data type.
  #[arg(long)]
  pub default:    Option<String>,
}

impl ConstraintArgs {
  fn into_constraints(self, data_type: DataType) -> anyhow::Result<Constraints> {
    let mut c = Constraints::default();
    if self.required {
      c = c.required();
    }
    if self.unique {
      c = c.unique();
    }
    if let Some(n) = self.max_length {
      c = c.max_length(n);
    }
    if let Some(raw) = self.default {
      let value = data_type
        .parse_value(&raw)
        .map_err(|e| anyhow!("invalid --default: {e}"))?;
      c = c.default_value(value);
    }
    Ok(c)
  }
}

fn parse_data_type(s: &str) -> Result<DataType, String> {
  DataType::from_name(s).map_err(|e| e.to_string())
}

fn parse_assignment(s: &str) -> Result<(String, String), String> {
  s.split_once('=')
    .map(|(k, v)| (k.trim().to_owned(), v.to_owned()))
    .filter(|(k, _)| !k.is_empty())
    .ok_or_else(|| format!("expected field=value, got {s:?}"))
}

// ─── Execution ────────────────────────────────────────────────────────────────

pub async fn run<S, W>(catalog: &Catalog<S>, command: Command, out: &mut W) -> anyhow::Result<()>
where
  S: SchemaStore,
  W: Write,
{
  match command {
    Command::Model(cmd) => run_model(catalog, cmd, out).await,
    Command::Field(cmd) => run_field(catalog, cmd, out).await,

    Command::Attach(args) => {
      let model = catalog.model_by_name(&args.model).await?;
      let field = resolve_field(catalog, &args.field).await?;
      let constraints = args.constraints.into_constraints(field.data_type)?;
      let attached = model
        .add_field(&field, constraints)
        .await
        .with_context(|| format!("attaching {} to {}", field.name, model.name()))?;
      writeln!(
        out,
        "attached {} to {} at position {}",
        field.name,
        model.name(),
        attached.attachment.position
      )?;
      Ok(())
    }

    Command::Update(args) => {
      let model = catalog.model_by_name(&args.model).await?;
      let field = resolve_field(catalog, &args.field).await?;
      let constraints = args.constraints.into_constraints(field.data_type)?;
      model
        .update_field(&field, constraints)
        .await
        .with_context(|| format!("updating {} on {}", field.name, model.name()))?;
      writeln!(out, "updated {} on {}", field.name, model.name())?;
      Ok(())
    }

    Command::Detach { model, field } => {
      let model = catalog.model_by_name(&model).await?;
      let field = resolve_field(catalog, &field).await?;
      model
        .remove_field(&field)
        .await
        .with_context(|| format!("detaching {} from {}", field.name, model.name()))?;
      writeln!(out, "detached {} from {}", field.name, model.name())?;
      Ok(())
    }

    Command::Type(TypeCommand::Show { model }) => {
      let model = catalog.model_by_name(&model).await?;
      let ty = model.as_type().await?;
      writeln!(out, "{}", serde_json::to_string_pretty(ty.as_ref())?)?;
      Ok(())
    }

    Command::Record(cmd) => run_record(catalog, cmd, out).await,
  }
}

async fn run_model<S: SchemaStore, W: Write>(
  catalog: &Catalog<S>,
  cmd: ModelCommand,
  out: &mut W,
) -> anyhow::Result<()> {
  match cmd {
    ModelCommand::Create { name, table } => {
      let mut input = NewModel::new(name);
      if let Some(table) = table {
        input = input.with_table_name(table);
      }
      let model = catalog.create_model(input).await?;
      let decl = model.declaration().await?;
      writeln!(out, "{}  {}  table={}", decl.model_id, decl.name, decl.table_name)?;
    }
    ModelCommand::List { all } => {
      for decl in catalog.list_models(all).await? {
        write_model(out, &decl)?;
      }
    }
    ModelCommand::Show { name } => {
      let model = catalog.model_by_name(&name).await?;
      write_model(out, &model.declaration().await?)?;
      for f in model.get_fields().await? {
        let c = f.constraints();
        let mut flags = Vec::new();
        if c.required {
          flags.push("required".to_owned());
        }
        if c.unique {
          flags.push("unique".to_owned());
        }
        if let Some(n) = c.max_length {
          flags.push(format!("max_length={n}"));
        }
        if let Some(d) = &c.default {
          flags.push(format!("default={d}"));
        }
        writeln!(out, "  {:<20} {:<10} {}", f.name(), f.data_type(), flags.join(" "))?;
      }
      writeln!(out, "  rows: {}", model.count().await?)?;
    }
    ModelCommand::Destroy { name } => {
      let model = catalog.model_by_name(&name).await?;
      let decl = model.destroy().await?;
      writeln!(out, "destroyed {} (table {} dropped)", decl.name, decl.table_name)?;
    }
  }
  Ok(())
}

async fn run_field<S: SchemaStore, W: Write>(
  catalog: &Catalog<S>,
  cmd: FieldCommand,
  out: &mut W,
) -> anyhow::Result<()> {
  match cmd {
    FieldCommand::Create { name, data_type } => {
      let field = catalog.create_field(&name, data_type).await?;
      writeln!(out, "{}  {}  {}", field.field_id, field.name, field.data_type)?;
    }
    FieldCommand::List => {
      for field in catalog.list_fields().await? {
        writeln!(out, "{}  {:<20} {}", field.field_id, field.name, field.data_type)?;
      }
    }
    FieldCommand::Retype { field, data_type } => {
      let field = resolve_field(catalog, &field).await?;
      let field = catalog.retype_field(field.field_id, data_type).await?;
      writeln!(out, "{} is now {}", field.name, field.data_type)?;
    }
    FieldCommand::Delete { field } => {
      let field = resolve_field(catalog, &field).await?;
      catalog.delete_field(field.field_id).await?;
      writeln!(out, "deleted {}", field.name)?;
    }
    FieldCommand::Types => {
      for data_type in Catalog::<S>::supported_data_types() {
        writeln!(out, "{data_type}")?;
      }
    }
  }
  Ok(())
}

async fn run_record<S: SchemaStore, W: Write>(
  catalog: &Catalog<S>,
  cmd: RecordCommand,
  out: &mut W,
) -> anyhow::Result<()> {
  match cmd {
    RecordCommand::Insert { model, values } => {
      let model = catalog.model_by_name(&model).await?;
      let saved = insert(&model, values).await?;
      writeln!(out, "{}", saved.to_json()?)?;
    }
    RecordCommand::List { model, limit, offset } => {
      let model = catalog.model_by_name(&model).await?;
      for record in model.all(limit, offset).await? {
        writeln!(out, "{}", record.to_json()?)?;
      }
    }
    RecordCommand::Count { model } => {
      let model = catalog.model_by_name(&model).await?;
      writeln!(out, "{}", model.count().await?)?;
    }
  }
  Ok(())
}

async fn insert<S: SchemaStore>(
  model: &DynamicModel<S>,
  values: Vec<(String, String)>,
) -> anyhow::Result<shapeshift_core::factory::Record> {
  let ty = model.as_type().await?;
  let mut builder = ty.record();
  for (name, raw) in values {
    let accessor = ty
      .accessor(&name)
      .ok_or_else(|| anyhow!("{} has no field {name:?}", ty.type_name()))?;
    let value = if raw.is_empty() {
      Value::Null
    } else {
      accessor
        .data_type
        .parse_value(&raw)
        .map_err(|e| anyhow!("{name}: {e}"))?
    };
    builder = builder.set(&name, value);
  }
  let record = builder.build()?;
  Ok(model.save(record).await?)
}

/// Find a field by id, or by name when the name is unambiguous.
async fn resolve_field<S: SchemaStore>(
  catalog: &Catalog<S>,
  key: &str,
) -> anyhow::Result<FieldDeclaration> {
  if let Ok(id) = key.parse::<Uuid>() {
    return Ok(catalog.field(id).await?);
  }
  let mut matches: Vec<_> = catalog
    .list_fields()
    .await?
    .into_iter()
    .filter(|f| f.name == key)
    .collect();
  match matches.len() {
    0 => bail!("no field named {key:?}"),
    1 => Ok(matches.remove(0)),
    n => bail!("{n} fields are named {key:?}; use the field id"),
  }
}

fn write_model<W: Write>(out: &mut W, decl: &ModelDeclaration) -> anyhow::Result<()> {
  let state = if decl.is_purged() { "purged" } else { "live" };
  writeln!(
    out,
    "{}  {:<20} table={:<24} marker={:<4} {state}",
    decl.model_id, decl.name, decl.table_name, decl.marker
  )?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use shapeshift_store_sqlite::SqliteStore;

  use super::*;

  async fn catalog() -> Catalog<SqliteStore> {
    Catalog::new(Arc::new(SqliteStore::open_in_memory().await.unwrap()))
  }

  async fn exec(catalog: &Catalog<SqliteStore>, command: Command) -> anyhow::Result<String> {
    let mut out = Vec::new();
    run(catalog, command, &mut out).await?;
    Ok(String::from_utf8(out)?)
  }

  fn attach(model: &str, field: &str, constraints: ConstraintArgs) -> Command {
    Command::Attach(AttachArgs {
      model: model.into(),
      field: field.into(),
      constraints,
    })
  }

  #[test]
  fn parses_assignments() {
    assert_eq!(parse_assignment("color=red").unwrap(), ("color".into(), "red".into()));
    assert_eq!(parse_assignment("note=a=b").unwrap(), ("note".into(), "a=b".into()));
    assert!(parse_assignment("color").is_err());
    assert!(parse_assignment("=red").is_err());
  }

  #[test]
  fn constraint_flags_parse_defaults_by_type() {
    let args = ConstraintArgs {
      required: true,
      default: Some("4".into()),
      ..Default::default()
    };
    let c = args.into_constraints(DataType::Integer).unwrap();
    assert!(c.required);
    assert_eq!(c.default, Some(Value::Integer(4)));

    let args = ConstraintArgs { default: Some("four".into()), ..Default::default() };
    assert!(args.into_constraints(DataType::Integer).is_err());
  }

  #[tokio::test]
  async fn define_and_use_a_model() {
    let c = catalog().await;
    exec(&c, Command::Model(ModelCommand::Create { name: "car".into(), table: None }))
      .await
      .unwrap();
    exec(
      &c,
      Command::Field(FieldCommand::Create {
        name:      "color".into(),
        data_type: DataType::Character,
      }),
    )
    .await
    .unwrap();
    exec(
      &c,
      attach("car", "color", ConstraintArgs {
        required: true,
        max_length: Some(16),
        ..Default::default()
      }),
    )
    .await
    .unwrap();

    let out = exec(
      &c,
      Command::Record(RecordCommand::Insert {
        model:  "car".into(),
        values: vec![("color".into(), "red".into())],
      }),
    )
    .await
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(json["id"], 1);
    assert_eq!(json["color"], "red");

    let out = exec(&c, Command::Model(ModelCommand::Show { name: "car".into() }))
      .await
      .unwrap();
    assert!(out.contains("max_length=16"));
    assert!(out.contains("rows: 1"));

    let out = exec(&c, Command::Type(TypeCommand::Show { model: "car".into() }))
      .await
      .unwrap();
    assert!(out.contains("\"type_name\": \"Car\""));
  }

  #[tokio::test]
  async fn insert_rejects_unknown_fields() {
    let c = catalog().await;
    exec(&c, Command::Model(ModelCommand::Create { name: "car".into(), table: None }))
      .await
      .unwrap();
    let err = exec(
      &c,
      Command::Record(RecordCommand::Insert {
        model:  "car".into(),
        values: vec![("wings".into(), "2".into())],
      }),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("wings"));
  }

  #[tokio::test]
  async fn ambiguous_field_names_need_an_id() {
    let c = catalog().await;
    c.create_field("name", DataType::Text).await.unwrap();
    c.create_field("name", DataType::Character).await.unwrap();

    let err = resolve_field(&c, "name").await.unwrap_err();
    assert!(err.to_string().contains("use the field id"));
    assert!(resolve_field(&c, "missing").await.is_err());
  }
}
