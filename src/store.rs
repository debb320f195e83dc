// 🗃️ Offering Store - in-memory CRUD over immutable offering records
//
// Clones share one backing list. Updates replace the stored value with a new
// Offering built from a patch; amount and timestamp can never change.

use crate::entities::{Offering, OfferingPatch};
use crate::error::{ExorcistError, StoreError};
use std::sync::{Arc, PoisonError, RwLock};

#[derive(Clone, Default)]
pub struct OfferingStore {
    offerings: Arc<RwLock<Vec<Offering>>>,
}

impl OfferingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All offerings in creation order
    pub fn get_all(&self) -> Vec<Offering> {
        self.offerings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Offering> {
        self.offerings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|o| o.id() == id)
            .cloned()
    }

    /// Everything except `id`, the history a new offering is judged against
    pub fn history_excluding(&self, id: &str) -> Vec<Offering> {
        self.offerings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|o| o.id() != id)
            .cloned()
            .collect()
    }

    pub fn create(&self, offering: Offering) -> Result<Offering, StoreError> {
        let mut offerings = self.offerings.write().unwrap_or_else(PoisonError::into_inner);
        if offerings.iter().any(|o| o.id() == offering.id()) {
            return Err(StoreError::Duplicate(offering.id().to_string()));
        }
        offerings.push(offering.clone());
        Ok(offering)
    }

    /// Apply a patch and return (previous, updated)
    pub fn update(&self, id: &str, patch: &OfferingPatch) -> Result<(Offering, Offering), ExorcistError> {
        if let Some(field) = patch.immutable_violation() {
            return Err(StoreError::ImmutableField(field).into());
        }

        let mut offerings = self.offerings.write().unwrap_or_else(PoisonError::into_inner);
        let slot = offerings
            .iter_mut()
            .find(|o| o.id() == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let updated = slot.apply(patch)?;
        let previous = std::mem::replace(slot, updated.clone());
        Ok((previous, updated))
    }

    pub fn delete(&self, id: &str) -> Result<Offering, StoreError> {
        let mut offerings = self.offerings.write().unwrap_or_else(PoisonError::into_inner);
        let index = offerings
            .iter()
            .position(|o| o.id() == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(offerings.remove(index))
    }

    pub fn count(&self) -> usize {
        self.offerings.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Drop every offering, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut offerings = self.offerings.write().unwrap_or_else(PoisonError::into_inner);
        let removed = offerings.len();
        offerings.clear();
        removed
    }
}
