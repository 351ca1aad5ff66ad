//! [`TypeCache`]: one canonical generated type per model and marker.
//!
//! The cache is pull-based: every lookup reads the authoritative marker from
//! the store and compares it with the cached type's marker. A mismatch means
//! the declaration changed, and the type is synthesized again.
//!
//! Misses are serialized per model. The first caller to see a new marker
//! synthesizes; concurrent callers wait on that model's lock and then find
//! the fresh entry, so each marker is synthesized at most once.

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  Error, Result,
  factory::{self, GeneratedType},
  registry::{NoopRegistry, TypeRegistry},
  store::SchemaStore,
};

/// Counters describing cache behaviour since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
  pub hits:      u64,
  pub misses:    u64,
  pub syntheses: u64,
  pub entries:   usize,
}

/// Process-wide map from model id to its current generated type.
pub struct TypeCache {
  entries:   DashMap<Uuid, Arc<GeneratedType>>,
  /// Per-model synthesis locks.
  locks:     DashMap<Uuid, Arc<Mutex<()>>>,
  registry:  Arc<dyn TypeRegistry>,
  hits:      AtomicU64,
  misses:    AtomicU64,
  syntheses: AtomicU64,
}

impl Default for TypeCache {
  fn default() -> Self { Self::new() }
}

impl TypeCache {
  pub fn new() -> Self { Self::with_registry(Arc::new(NoopRegistry)) }

  /// A cache that reports every replacement to `registry`.
  pub fn with_registry(registry: Arc<dyn TypeRegistry>) -> Self {
    Self {
      entries: DashMap::new(),
      locks: DashMap::new(),
      registry,
      hits: AtomicU64::new(0),
      misses: AtomicU64::new(0),
      syntheses: AtomicU64::new(0),
    }
  }

  /// The current type for `model_id`, synthesizing it if the marker moved.
  pub async fn current_type<S: SchemaStore>(
    &self,
    store: &S,
    model_id: Uuid,
  ) -> Result<Arc<GeneratedType>> {
    let marker = store.model_marker(model_id).await.map_err(Into::into)?;
    if let Some(ty) = self.lookup(model_id, marker) {
      self.hits.fetch_add(1, Ordering::Relaxed);
      tracing::debug!(%model_id, marker, "type cache hit");
      return Ok(ty);
    }

    let lock = self.lock_for(model_id);
    let _guard = lock.lock().await;

    // Another caller may have synthesized this marker while we waited.
    if let Some(ty) = self.lookup(model_id, marker) {
      self.hits.fetch_add(1, Ordering::Relaxed);
      tracing::debug!(%model_id, marker, "type cache hit after wait");
      return Ok(ty);
    }
    self.misses.fetch_add(1, Ordering::Relaxed);

    // The snapshot may be newer than `marker` if a change landed in between;
    // its own marker is the one the type is built for.
    let schema = store.load_schema(model_id).await.map_err(Into::into)?;
    if schema.model.is_purged() {
      return Err(Error::ModelPurged(model_id));
    }
    if let Some(ty) = self.lookup(model_id, schema.model.marker) {
      self.hits.fetch_add(1, Ordering::Relaxed);
      return Ok(ty);
    }

    let ty = Arc::new(factory::synthesize(&schema));
    self.syntheses.fetch_add(1, Ordering::Relaxed);
    tracing::info!(
      %model_id,
      marker = ty.marker(),
      type_name = ty.type_name(),
      fields = ty.accessors().len(),
      "synthesized generated type"
    );

    Ok(self.install(ty))
  }

  /// The cached type for `model_id`, without consulting the store.
  pub fn cached(&self, model_id: Uuid) -> Option<Arc<GeneratedType>> {
    self.entries.get(&model_id).map(|ty| Arc::clone(ty.value()))
  }

  /// Drop the entry for `model_id` and deregister it from the host registry.
  pub fn evict(&self, model_id: Uuid) -> Option<Arc<GeneratedType>> {
    let removed = self.entries.remove(&model_id).map(|(_, ty)| ty);
    self.locks.remove(&model_id);
    if let Some(ty) = &removed {
      self.registry.deregister(ty);
      tracing::debug!(%model_id, marker = ty.marker(), "evicted generated type");
    }
    removed
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      hits:      self.hits.load(Ordering::Relaxed),
      misses:    self.misses.load(Ordering::Relaxed),
      syntheses: self.syntheses.load(Ordering::Relaxed),
      entries:   self.entries.len(),
    }
  }

  fn lookup(&self, model_id: Uuid, marker: u64) -> Option<Arc<GeneratedType>> {
    self
      .entries
      .get(&model_id)
      .filter(|ty| ty.marker() == marker)
      .map(|ty| Arc::clone(ty.value()))
  }

  fn lock_for(&self, model_id: Uuid) -> Arc<Mutex<()>> {
    Arc::clone(self.locks.entry(model_id).or_default().value())
  }

  /// Store `ty` unless a type with an equal or newer marker is already
  /// cached, and notify the registry. Returns whichever type is now cached.
  fn install(&self, ty: Arc<GeneratedType>) -> Arc<GeneratedType> {
    let previous = match self.entries.entry(ty.model_id()) {
      Entry::Occupied(mut entry) => {
        if entry.get().marker() >= ty.marker() {
          return Arc::clone(entry.get());
        }
        Some(entry.insert(Arc::clone(&ty)))
      }
      Entry::Vacant(entry) => {
        entry.insert(Arc::clone(&ty));
        None
      }
    };

    if let Some(old) = previous {
      self.registry.deregister(&old);
    }
    self.registry.register(&ty);
    ty
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::{
    declaration::{ModelDeclaration, ModelSchema},
    registry::InMemoryRegistry,
  };

  fn ty(model_id: Uuid, marker: u64) -> Arc<GeneratedType> {
    Arc::new(factory::synthesize(&ModelSchema {
      model:  ModelDeclaration {
        model_id,
        name: "car".into(),
        table_name: "dyn_car".into(),
        marker,
        created_at: Utc::now(),
        purged_at: None,
      },
      fields: vec![],
    }))
  }

  #[test]
  fn install_replaces_older_and_notifies_registry() {
    let registry = Arc::new(InMemoryRegistry::new());
    let cache = TypeCache::with_registry(registry.clone());
    let id = Uuid::new_v4();

    let t1 = cache.install(ty(id, 1));
    assert!(Arc::ptr_eq(&registry.get("Car").unwrap(), &t1));

    let t2 = cache.install(ty(id, 2));
    assert!(Arc::ptr_eq(&cache.cached(id).unwrap(), &t2));
    assert!(Arc::ptr_eq(&registry.get("Car").unwrap(), &t2));
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn install_never_goes_backwards() {
    let cache = TypeCache::new();
    let id = Uuid::new_v4();

    let t3 = cache.install(ty(id, 3));
    let kept = cache.install(ty(id, 2));
    assert!(Arc::ptr_eq(&kept, &t3));
    assert_eq!(cache.cached(id).unwrap().marker(), 3);
  }

  #[test]
  fn evict_deregisters() {
    let registry = Arc::new(InMemoryRegistry::new());
    let cache = TypeCache::with_registry(registry.clone());
    let id = Uuid::new_v4();

    cache.install(ty(id, 1));
    assert!(cache.evict(id).is_some());
    assert!(cache.cached(id).is_none());
    assert!(registry.is_empty());
    assert!(cache.evict(id).is_none());
  }
}
