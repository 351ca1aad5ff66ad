//! The application-facing surface: [`Catalog`] and [`DynamicModel`].
//!
//! A catalog bundles a [`SchemaStore`], a shared [`TypeCache`] and a naming
//! scheme. Structural changes made through a [`DynamicModel`] are serialized
//! per model before they reach the store.

use std::{future::Future, sync::Arc};

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
  Error, Result,
  cache::TypeCache,
  data_type::DataType,
  declaration::{
    AttachedField, Constraints, FieldDeclaration, ModelDeclaration, NewField,
    NewModel,
  },
  factory::{GeneratedType, Record},
  naming::{self, NamingScheme},
  staleness::{self, Stamped},
  store::SchemaStore,
};

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Entry point for defining and using dynamic models.
///
/// Cloning is cheap; clones share the store, the cache and the per-model
/// write locks.
pub struct Catalog<S> {
  store:       Arc<S>,
  cache:       Arc<TypeCache>,
  naming:      NamingScheme,
  write_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl<S> Clone for Catalog<S> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      cache:       Arc::clone(&self.cache),
      naming:      self.naming.clone(),
      write_locks: Arc::clone(&self.write_locks),
    }
  }
}

impl<S> std::fmt::Debug for Catalog<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Catalog")
      .field("naming", &self.naming)
      .field("cache", &self.cache.stats())
      .finish_non_exhaustive()
  }
}

impl<S: SchemaStore> Catalog<S> {
  pub fn new(store: Arc<S>) -> Self { Self::with_cache(store, Arc::new(TypeCache::new())) }

  /// Use an existing (typically process-wide) cache.
  pub fn with_cache(store: Arc<S>, cache: Arc<TypeCache>) -> Self {
    Self {
      store,
      cache,
      naming: NamingScheme::default(),
      write_locks: Arc::new(DashMap::new()),
    }
  }

  pub fn with_naming(mut self, naming: NamingScheme) -> Self {
    self.naming = naming;
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn cache(&self) -> &Arc<TypeCache> { &self.cache }

  pub fn naming(&self) -> &NamingScheme { &self.naming }

  /// The closed set of data types a field may declare.
  pub fn supported_data_types() -> Vec<DataType> { DataType::all() }

  // ── Models ────────────────────────────────────────────────────────────

  /// Register a new dynamic model and create its empty table.
  pub async fn create_model(&self, input: NewModel) -> Result<DynamicModel<S>> {
    naming::validate_identifier(&input.name)?;
    let table_name = input
      .table_name
      .unwrap_or_else(|| self.naming.table_name(&input.name));
    naming::validate_identifier(&table_name)?;

    let model = self
      .store
      .create_model(input.name, table_name)
      .await
      .map_err(Into::into)?;

    tracing::info!(
      model_id = %model.model_id,
      name = %model.name,
      table = %model.table_name,
      "created dynamic model"
    );
    Ok(self.bind(&model))
  }

  pub async fn model(&self, model_id: Uuid) -> Result<DynamicModel<S>> {
    let model = self
      .store
      .get_model(model_id)
      .await
      .map_err(Into::into)?
      .ok_or(Error::ModelNotFound(model_id))?;
    Ok(self.bind(&model))
  }

  /// Look up a live model by name.
  pub async fn model_by_name(&self, name: &str) -> Result<DynamicModel<S>> {
    let model = self
      .store
      .get_model_by_name(name.to_owned())
      .await
      .map_err(Into::into)?
      .ok_or_else(|| Error::ModelNameNotFound(name.to_owned()))?;
    Ok(self.bind(&model))
  }

  pub async fn list_models(&self, include_purged: bool) -> Result<Vec<ModelDeclaration>> {
    self.store.list_models(include_purged).await.map_err(Into::into)
  }

  fn bind(&self, model: &ModelDeclaration) -> DynamicModel<S> {
    DynamicModel {
      catalog:  self.clone(),
      model_id: model.model_id,
      name:     model.name.clone(),
    }
  }

  /// Number of models holding a write-lock entry. Entries are created on
  /// the first structural change and dropped when the model is destroyed.
  pub fn write_lock_count(&self) -> usize { self.write_locks.len() }

  fn write_lock(&self, model_id: Uuid) -> Arc<Mutex<()>> {
    Arc::clone(self.write_locks.entry(model_id).or_default().value())
  }

  // ── Fields ────────────────────────────────────────────────────────────

  pub async fn create_field(
    &self,
    name: &str,
    data_type: DataType,
  ) -> Result<FieldDeclaration> {
    naming::validate_field_name(name)?;
    let field = self
      .store
      .create_field(NewField::new(name, data_type))
      .await
      .map_err(Into::into)?;
    tracing::info!(field_id = %field.field_id, name, %data_type, "created field");
    Ok(field)
  }

  pub async fn field(&self, field_id: Uuid) -> Result<FieldDeclaration> {
    self
      .store
      .get_field(field_id)
      .await
      .map_err(Into::into)?
      .ok_or(Error::FieldNotFound(field_id))
  }

  pub async fn list_fields(&self) -> Result<Vec<FieldDeclaration>> {
    self.store.list_fields().await.map_err(Into::into)
  }

  /// Change a field's data type. Fails with `Constraint` once the field is
  /// attached anywhere, since existing rows are never migrated.
  pub async fn retype_field(
    &self,
    field_id: Uuid,
    data_type: DataType,
  ) -> Result<FieldDeclaration> {
    self
      .store
      .retype_field(field_id, data_type)
      .await
      .map_err(Into::into)
  }

  pub async fn delete_field(&self, field_id: Uuid) -> Result<()> {
    self.store.delete_field(field_id).await.map_err(Into::into)
  }
}

// ─── DynamicModel ────────────────────────────────────────────────────────────

/// A handle on one model declaration.
///
/// The handle holds only the model's identity; every call reads current
/// metadata through the store, so a handle never goes stale itself.
pub struct DynamicModel<S> {
  catalog:  Catalog<S>,
  model_id: Uuid,
  name:     String,
}

impl<S> Clone for DynamicModel<S> {
  fn clone(&self) -> Self {
    Self {
      catalog:  self.catalog.clone(),
      model_id: self.model_id,
      name:     self.name.clone(),
    }
  }
}

impl<S> std::fmt::Debug for DynamicModel<S> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DynamicModel")
      .field("model_id", &self.model_id)
      .field("name", &self.name)
      .finish_non_exhaustive()
  }
}

impl<S: SchemaStore> DynamicModel<S> {
  pub fn id(&self) -> Uuid { self.model_id }

  /// The name the handle was bound with.
  pub fn name(&self) -> &str { &self.name }

  /// Re-read the declaration, including its current marker.
  pub async fn declaration(&self) -> Result<ModelDeclaration> {
    self
      .catalog
      .store
      .get_model(self.model_id)
      .await
      .map_err(Into::into)?
      .ok_or(Error::ModelNotFound(self.model_id))
  }

  /// The canonical generated type for the model's current marker.
  pub async fn as_type(&self) -> Result<Arc<GeneratedType>> {
    self
      .catalog
      .cache
      .current_type(self.catalog.store.as_ref(), self.model_id)
      .await
  }

  /// The model's attached fields in column order.
  pub async fn get_fields(&self) -> Result<Vec<AttachedField>> {
    let mut fields = self
      .catalog
      .store
      .list_attachments(self.model_id)
      .await
      .map_err(Into::into)?;
    fields.sort_by_key(|f| f.attachment.position);
    Ok(fields)
  }

  /// Attach `field` as a new column.
  pub async fn add_field(
    &self,
    field: &FieldDeclaration,
    constraints: Constraints,
  ) -> Result<AttachedField> {
    let field_id = field.field_id;
    self
      .structural("add_field", &field.name, |store| {
        store.add_column(self.model_id, field_id, constraints)
      })
      .await
  }

  /// Change the constraints of an attached field.
  pub async fn update_field(
    &self,
    field: &FieldDeclaration,
    constraints: Constraints,
  ) -> Result<AttachedField> {
    let field_id = field.field_id;
    self
      .structural("update_field", &field.name, |store| {
        store.alter_column(self.model_id, field_id, constraints)
      })
      .await
  }

  /// Detach `field`, dropping its column and the data in it.
  pub async fn remove_field(&self, field: &FieldDeclaration) -> Result<()> {
    let field_id = field.field_id;
    self
      .structural("remove_field", &field.name, |store| {
        store.drop_column(self.model_id, field_id)
      })
      .await
      .map(|_| ())
  }

  /// Whether `held` was built for this model's current marker.
  pub async fn is_current(&self, held: &impl Stamped) -> Result<bool> {
    staleness::is_current(self.catalog.store.as_ref(), self.model_id, held).await
  }

  /// Drop the model's table and forget its generated type. The declaration
  /// is kept, marked purged.
  pub async fn destroy(&self) -> Result<ModelDeclaration> {
    let purged = self
      .structural("destroy", &self.name, |store| store.drop_table(self.model_id))
      .await?;
    self.catalog.cache.evict(self.model_id);
    self.catalog.write_locks.remove(&self.model_id);
    Ok(purged)
  }

  // ── Records ───────────────────────────────────────────────────────────

  /// Insert a record built from a generated type of this model.
  ///
  /// A record built from a superseded type is rejected with
  /// [`Error::OutdatedModel`]; re-fetch with [`Self::as_type`] and rebuild.
  pub async fn save(&self, record: Record) -> Result<Record> {
    staleness::ensure_current(self.catalog.store.as_ref(), self.model_id, &record).await?;
    self.catalog.store.insert_row(record).await.map_err(Into::into)
  }

  /// Read one row through the current type.
  pub async fn get(&self, row_id: i64) -> Result<Option<Record>> {
    let ty = self.as_type().await?;
    self.catalog.store.get_row(ty, row_id).await.map_err(Into::into)
  }

  /// Read rows through the current type, in row id order.
  pub async fn all(
    &self,
    limit: Option<usize>,
    offset: Option<usize>,
  ) -> Result<Vec<Record>> {
    let ty = self.as_type().await?;
    self
      .catalog
      .store
      .list_rows(ty, limit, offset)
      .await
      .map_err(Into::into)
  }

  pub async fn count(&self) -> Result<u64> {
    self.catalog.store.count_rows(self.model_id).await.map_err(Into::into)
  }

  /// Run one store-level structural change under this model's write lock.
  async fn structural<'a, T, F, Fut>(
    &'a self,
    op: &'static str,
    subject: &str,
    f: F,
  ) -> Result<T>
  where
    F: FnOnce(&'a S) -> Fut,
    Fut: Future<Output = Result<T, S::Error>>,
  {
    let lock = self.catalog.write_lock(self.model_id);
    let _guard = lock.lock().await;

    match f(self.catalog.store.as_ref()).await {
      Ok(out) => {
        tracing::info!(model = %self.name, op, subject, "structural change committed");
        Ok(out)
      }
      Err(e) => {
        let e: Error = e.into();
        tracing::warn!(model = %self.name, op, subject, error = %e, "structural change failed");
        Err(e)
      }
    }
  }
}
