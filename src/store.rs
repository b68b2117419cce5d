//! Store seam
//!
//! The resolution core reads records and payers through `PayerStore` and
//! hands back writes one batch at a time. `db::SqliteStore` is the durable
//! implementation.

use crate::db::Event;
use crate::entities::{CanonicalPayer, PayerGroup, RawDetailRecord};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Writes accumulated while resolving one batch of records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWrites {
    /// Zero-based batch number within the run
    pub batch: usize,

    /// Run the batch belongs to (for the audit trail)
    pub run_id: String,

    /// Canonical payers created by `New` outcomes
    pub new_payers: Vec<CanonicalPayer>,

    /// (detail_id, payer_id) rewrites from `Matched` outcomes
    pub assignments: Vec<(i64, String)>,
}

impl BatchWrites {
    pub fn new(run_id: &str, batch: usize) -> Self {
        BatchWrites {
            batch,
            run_id: run_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.new_payers.is_empty() && self.assignments.is_empty()
    }
}

/// One page of a listing plus the size of the whole listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
}

impl<T> Page<T> {
    /// Cut a page out of a fully materialized listing
    pub fn slice(all: Vec<T>, offset: usize, limit: usize) -> Self {
        let total = all.len();
        let items = all.into_iter().skip(offset).take(limit).collect();
        Page {
            items,
            total,
            offset,
            limit,
        }
    }
}

pub trait PayerStore {
    /// Raw records ordered by detail_id
    fn fetch_details(&self, offset: usize, limit: usize) -> Result<Vec<RawDetailRecord>>;

    fn count_details(&self) -> Result<usize>;

    /// All canonical payers ordered by payer_id
    fn fetch_canonical_payers(&self) -> Result<Vec<CanonicalPayer>>;

    /// All groups in insertion order
    fn fetch_groups(&self) -> Result<Vec<PayerGroup>>;

    /// payer_id → state of the earliest record referencing that payer
    fn payer_states(&self) -> Result<HashMap<String, String>>;

    /// Apply one batch atomically: all of it or none of it
    fn commit_batch(&mut self, writes: &BatchWrites) -> Result<()>;

    /// Operator override after an ambiguous outcome
    fn assign_detail_payer(&mut self, detail_id: i64, payer_id: &str) -> Result<()>;

    fn set_pretty_name(&mut self, payer_id: &str, pretty_name: &str) -> Result<()>;

    /// Move a payer to a group, creating a placeholder group if needed
    ///
    /// Returns true when the group had to be created.
    fn set_payer_group(&mut self, payer_id: &str, group_id: &str) -> Result<bool>;

    /// Append to the audit trail
    fn record_event(&mut self, event: &Event) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_slice() {
        let page = Page::slice((1..=7).collect::<Vec<_>>(), 5, 3);
        assert_eq!(page.items, vec![6, 7]);
        assert_eq!(page.total, 7);

        let past_end = Page::slice(vec![1, 2], 10, 3);
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 2);
    }

    #[test]
    fn test_batch_writes_empty() {
        let mut writes = BatchWrites::new("run", 0);
        assert!(writes.is_empty());
        writes.assignments.push((1, "86027".to_string()));
        assert!(!writes.is_empty());
    }
}
