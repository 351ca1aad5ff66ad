//! Host type registries.
//!
//! A host that keeps its own table of known types (for reflection,
//! serialisation, admin screens, ...) implements [`TypeRegistry`] and hands
//! it to the [`crate::cache::TypeCache`], which reports every replacement.

use std::{
  collections::HashMap,
  sync::{Arc, RwLock},
};

use crate::factory::GeneratedType;

/// Receives add/remove notifications for generated types.
///
/// Calls are made while the cache holds the affected model's synthesis lock,
/// so for one model they arrive in order: `deregister(old)` then
/// `register(new)`.
pub trait TypeRegistry: Send + Sync {
  fn register(&self, ty: &Arc<GeneratedType>);

  fn deregister(&self, ty: &Arc<GeneratedType>);
}

/// Ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRegistry;

impl TypeRegistry for NoopRegistry {
  fn register(&self, _ty: &Arc<GeneratedType>) {}

  fn deregister(&self, _ty: &Arc<GeneratedType>) {}
}

/// Keeps the live types by type name.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
  types: RwLock<HashMap<String, Arc<GeneratedType>>>,
}

impl InMemoryRegistry {
  pub fn new() -> Self { Self::default() }

  pub fn get(&self, type_name: &str) -> Option<Arc<GeneratedType>> {
    self
      .types
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .get(type_name)
      .cloned()
  }

  pub fn len(&self) -> usize {
    self
      .types
      .read()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl TypeRegistry for InMemoryRegistry {
  fn register(&self, ty: &Arc<GeneratedType>) {
    self
      .types
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner())
      .insert(ty.type_name().to_owned(), Arc::clone(ty));
  }

  fn deregister(&self, ty: &Arc<GeneratedType>) {
    let mut types = self
      .types
      .write()
      .unwrap_or_else(|poisoned| poisoned.into_inner());
    // Only drop the entry if it is still this exact type.
    if types.get(ty.type_name()).is_some_and(|held| Arc::ptr_eq(held, ty)) {
      types.remove(ty.type_name());
    }
  }
}
