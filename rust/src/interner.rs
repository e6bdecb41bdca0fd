//! Affiliation interning for the rotation pool.
//!
//! Maps affiliations to dense integer slots so per-affiliation queues can live
//! in a `Vec` and be iterated in first-seen order.

use rustc_hash::FxHashMap;

use crate::models::Affiliation;

/// Interned affiliation slot (u32 for compact storage and fast hashing).
pub type AffiliationSlot = u32;

/// Map from affiliations to their slots.
#[derive(Debug, Clone)]
pub struct AffiliationInterner {
    to_slot: FxHashMap<Affiliation, AffiliationSlot>,
}

impl AffiliationInterner {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_slot: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
        }
    }

    /// Intern an affiliation, returning its slot.
    /// If already interned, returns the existing slot.
    pub fn intern(&mut self, affiliation: &Affiliation) -> AffiliationSlot {
        if let Some(&slot) = self.to_slot.get(affiliation) {
            return slot;
        }
        let slot = self.to_slot.len() as AffiliationSlot;
        self.to_slot.insert(affiliation.clone(), slot);
        slot
    }

    #[inline]
    pub fn get(&self, affiliation: &Affiliation) -> Option<AffiliationSlot> {
        self.to_slot.get(affiliation).copied()
    }
}
