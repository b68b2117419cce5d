// 📚 Canonical Registry - In-memory snapshot of known payers
//
// Loaded once at the start of a resolution run. Changes made to the store
// while a run is in progress are not seen until the next run.
//
// Iteration order is ascending payer_id. The matching engine relies on it:
// when several payers score above threshold, the first one in this order wins.

use crate::entities::{CanonicalPayer, RawDetailRecord};
use std::collections::{BTreeMap, HashMap};

/// A canonical payer plus the state it is associated with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub payer: CanonicalPayer,

    /// State of the record that seeded or first referenced this payer
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    /// Create new empty registry
    pub fn new() -> Self {
        Registry {
            entries: BTreeMap::new(),
        }
    }

    /// Build a snapshot from store contents
    ///
    /// `states` maps payer_id to its associated state; payers missing from
    /// it have no recorded state.
    pub fn load(payers: Vec<CanonicalPayer>, states: &HashMap<String, String>) -> Self {
        let mut registry = Registry::new();
        for payer in payers {
            let state = states.get(&payer.payer_id).cloned();
            registry.insert_entry(payer, state);
        }
        registry
    }

    pub fn lookup(&self, payer_id: &str) -> Option<&CanonicalPayer> {
        self.entries.get(payer_id).map(|e| &e.payer)
    }

    /// Associated state of a payer, if it has one
    pub fn state_of(&self, payer_id: &str) -> Option<&str> {
        self.entries.get(payer_id).and_then(|e| e.state.as_deref())
    }

    /// Insert a payer if its id is unknown; existing payers are left untouched
    ///
    /// Returns true when the payer was inserted.
    pub fn upsert(&mut self, payer: CanonicalPayer) -> bool {
        self.insert_entry(payer, None)
    }

    /// Insert a payer seeded by a record, remembering the record's state
    pub fn upsert_from_record(&mut self, record: &RawDetailRecord) -> bool {
        if !self.upsert(CanonicalPayer::from_record(record)) {
            return false;
        }
        if let Some(entry) = self.entries.get_mut(&record.payer_id) {
            entry.state = record.state.clone();
        }
        true
    }

    fn insert_entry(&mut self, payer: CanonicalPayer, state: Option<String>) -> bool {
        if self.entries.contains_key(&payer.payer_id) {
            return false;
        }
        self.entries
            .insert(payer.payer_id.clone(), RegistryEntry { payer, state });
        true
    }

    /// (payer_id, payer_name) pairs in ascending payer_id order
    pub fn all_entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .values()
            .map(|e| (e.payer.payer_id.as_str(), e.payer.payer_name.as_str()))
    }

    /// Full entries in ascending payer_id order
    pub fn entries(&self) -> impl Iterator<Item = &RegistryEntry> + '_ {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
