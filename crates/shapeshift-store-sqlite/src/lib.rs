//! SQLite backend for Shapeshift.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Metadata and the dynamic tables share
//! one database, so every structural change and its marker bump commit in a
//! single SQLite transaction.

mod ddl;
mod encode;
mod meta;
mod mutator;
mod rows;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
