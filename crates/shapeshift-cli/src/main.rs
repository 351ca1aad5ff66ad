//! `shapeshift`: operator CLI for a Shapeshift SQLite store.
//!
//! # Usage
//!
//! ```
//! shapeshift model create car
//! shapeshift field create color character
//! shapeshift attach car color --required --max-length 16
//! shapeshift record insert car color=red
//! shapeshift record list car
//! ```
//!
//! Settings come from `shapeshift.toml` (or `--config`), then `SHAPESHIFT_*`
//! environment variables, then `--database`.

mod commands;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use serde::Deserialize;
use shapeshift_core::{catalog::Catalog, naming::NamingScheme};
use shapeshift_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "shapeshift", version, about = "Manage runtime-defined data models")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, value_name = "FILE", default_value = "shapeshift.toml")]
  config: PathBuf,

  /// SQLite database file; overrides `database_path` from the config.
  #[arg(short, long, value_name = "PATH")]
  database: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from the config file and environment.
#[derive(Deserialize, Debug, Clone)]
struct CliConfig {
  #[serde(default = "default_database_path")]
  database_path: PathBuf,
  /// Prefix for derived table names.
  #[serde(default = "default_table_prefix")]
  table_prefix:  String,
}

fn default_database_path() -> PathBuf { PathBuf::from("shapeshift.db") }

fn default_table_prefix() -> String { NamingScheme::default().table_prefix }

fn load_config(cli: &Cli) -> anyhow::Result<CliConfig> {
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("SHAPESHIFT"))
    .set_override_option(
      "database_path",
      cli
        .database
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned()),
    )
    .context("invalid --database override")?
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise CliConfig")
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so command output stays pipeable.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = load_config(&cli)?;

  let db_path = expand_tilde(&cfg.database_path);
  let store = SqliteStore::open(&db_path)
    .await
    .with_context(|| format!("failed to open store at {db_path:?}"))?;
  tracing::debug!(path = ?db_path, prefix = %cfg.table_prefix, "opened store");

  let catalog =
    Catalog::new(Arc::new(store)).with_naming(NamingScheme::new(cfg.table_prefix));

  let mut stdout = std::io::stdout().lock();
  commands::run(&catalog, cli.command, &mut stdout).await
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
