//! Core types and engine for Shapeshift dynamic models.
//!
//! A dynamic model is a record type declared at runtime: a name plus a set of
//! typed fields with per-model constraints. This crate turns those
//! declarations into live [`factory::GeneratedType`]s, caches them per
//! modification marker, and detects when a held type has gone stale.
//!
//! Storage lives behind the [`store::SchemaStore`] trait; this crate has no
//! database dependency of its own.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod cache;
pub mod catalog;
pub mod data_type;
pub mod declaration;
pub mod error;
pub mod factory;
pub mod naming;
pub mod policy;
pub mod registry;
pub mod staleness;
pub mod store;

pub use error::{Error, Result};
