//! Staleness checks for held generated types and records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  factory::{GeneratedType, Record},
  store::SchemaStore,
};

/// Anything that remembers which model and marker it was built for.
pub trait Stamped {
  fn stamp(&self) -> SchemaStamp;
}

/// A (model, marker) pair detached from any type, e.g. one a client sent
/// back after reading it earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaStamp {
  pub model_id: Uuid,
  pub marker:   u64,
}

impl Stamped for SchemaStamp {
  fn stamp(&self) -> SchemaStamp { *self }
}

impl Stamped for GeneratedType {
  fn stamp(&self) -> SchemaStamp {
    SchemaStamp { model_id: self.model_id(), marker: self.marker() }
  }
}

impl Stamped for Record {
  fn stamp(&self) -> SchemaStamp { self.generated_type().stamp() }
}

impl<T: Stamped + ?Sized> Stamped for Arc<T> {
  fn stamp(&self) -> SchemaStamp { (**self).stamp() }
}

impl<T: Stamped + ?Sized> Stamped for &T {
  fn stamp(&self) -> SchemaStamp { (**self).stamp() }
}

/// Compare a stamp with a freshly read marker.
pub fn matches(model_id: Uuid, current_marker: u64, held: &impl Stamped) -> bool {
  let stamp = held.stamp();
  stamp.model_id == model_id && stamp.marker == current_marker
}

/// Whether `held` still matches the authoritative marker of `model_id`.
pub async fn is_current<S: SchemaStore>(
  store: &S,
  model_id: Uuid,
  held: &impl Stamped,
) -> Result<bool> {
  let current = store.model_marker(model_id).await.map_err(Into::into)?;
  Ok(matches(model_id, current, held))
}

/// Like [`is_current`], but fails with [`Error::OutdatedModel`] instead of
/// returning `false`.
pub async fn ensure_current<S: SchemaStore>(
  store: &S,
  model_id: Uuid,
  held: &impl Stamped,
) -> Result<()> {
  let current = store.model_marker(model_id).await.map_err(Into::into)?;
  if matches(model_id, current, held) {
    Ok(())
  } else {
    let stamp = held.stamp();
    tracing::warn!(
      %model_id,
      held = stamp.marker,
      current,
      "rejecting use of outdated generated type"
    );
    Err(Error::OutdatedModel { model_id, held: stamp.marker, current })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn matches_requires_same_model_and_marker() {
    let model_id = Uuid::new_v4();
    let stamp = SchemaStamp { model_id, marker: 3 };

    assert!(matches(model_id, 3, &stamp));
    assert!(!matches(model_id, 4, &stamp));
    assert!(!matches(Uuid::new_v4(), 3, &stamp));
    assert!(matches(model_id, 3, &Arc::new(stamp)));
  }
}
