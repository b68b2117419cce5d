// 🔄 Resolution Run - Page records through the engine, commit in batches
//
// 1. Snapshot the registry from the store
// 2. Fetch `batch_size` records, resolve them, commit their writes in one
//    store transaction
// 3. Repeat until the store runs out of records
//
// Commit failure policy: the failed batch is rolled back and the run aborts
// with `CommitFailure`. Batches committed before it stay committed.
//
// Cancellation is checked between batches only; a batch is never left
// half-applied.

use crate::config::ResolverConfig;
use crate::entities::CanonicalPayer;
use crate::error::{ResolverError, Result};
use crate::matching::{MatchOutcome, MatchingEngine, Resolution};
use crate::registry::Registry;
use crate::store::{BatchWrites, PayerStore};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared cancellation request, honored at the next batch boundary
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub dry_run: bool,

    /// Records that received an outcome
    pub processed: usize,
    pub matched: usize,
    pub created: usize,

    /// Malformed records (no outcome)
    pub skipped: usize,

    /// Records flagged for manual review, in processing order
    pub ambiguous: Vec<Resolution>,

    pub batches_committed: usize,
    pub cancelled: bool,
}

pub struct ResolutionRun<'a, S: PayerStore> {
    store: &'a mut S,
    engine: MatchingEngine,
    batch_size: usize,
    dry_run: bool,
    cancel: CancelFlag,
}

impl<'a, S: PayerStore> ResolutionRun<'a, S> {
    pub fn new(store: &'a mut S, config: &ResolverConfig) -> Self {
        ResolutionRun {
            store,
            engine: MatchingEngine::from_config(config),
            batch_size: config.batch_size.max(1),
            dry_run: false,
            cancel: CancelFlag::new(),
        }
    }

    /// Classify everything but write nothing
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn execute(mut self) -> Result<RunReport> {
        let mut report = RunReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            dry_run: self.dry_run,
            ..Default::default()
        };

        let payers = self.store.fetch_canonical_payers()?;
        let states = self.store.payer_states()?;
        let mut registry = Registry::load(payers, &states);

        info!(
            "Run {} starting: {} canonical payers, batch size {}{}",
            report.run_id,
            registry.len(),
            self.batch_size,
            if self.dry_run { " (dry run)" } else { "" }
        );

        let mut offset = 0;
        let mut batch = 0;

        loop {
            if self.cancel.is_cancelled() {
                info!("Run {} cancelled before batch {}", report.run_id, batch);
                report.cancelled = true;
                break;
            }

            let records = self.store.fetch_details(offset, self.batch_size)?;
            if records.is_empty() {
                break;
            }
            offset += records.len();

            let mut writes = BatchWrites::new(&report.run_id, batch);
            for record in &records {
                let Some(outcome) = self.engine.resolve_one(record, &mut registry) else {
                    report.skipped += 1;
                    continue;
                };
                report.processed += 1;

                match outcome {
                    MatchOutcome::Matched { payer_id } => {
                        report.matched += 1;
                        if payer_id != record.payer_id {
                            writes.assignments.push((record.detail_id, payer_id));
                        }
                    }
                    MatchOutcome::New => {
                        report.created += 1;
                        writes.new_payers.push(CanonicalPayer::from_record(record));
                    }
                    ambiguous @ MatchOutcome::Ambiguous { .. } => {
                        report.ambiguous.push(Resolution {
                            record: record.clone(),
                            outcome: ambiguous,
                        });
                    }
                }
            }

            if !self.dry_run && !writes.is_empty() {
                if let Err(e) = self.store.commit_batch(&writes) {
                    warn!(
                        "Run {}: batch {} rolled back, aborting: {}",
                        report.run_id, batch, e
                    );
                    return Err(ResolverError::CommitFailure {
                        batch,
                        source: Box::new(e),
                    });
                }
                report.batches_committed += 1;
                info!(
                    "Committed batch {} ({} records processed so far)",
                    batch, offset
                );
            }

            batch += 1;
        }

        info!(
            "Run {} finished: {} matched, {} new, {} ambiguous, {} skipped",
            report.run_id,
            report.matched,
            report.created,
            report.ambiguous.len(),
            report.skipped
        );

        Ok(report)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Event, SqliteStore};
    use crate::entities::{PayerGroup, RawDetailRecord, UNKNOWN_GROUP_ID};
    use std::collections::HashMap;

    /// Delegates to SQLite, but can fail or request cancellation on a given commit
    struct FlakyStore {
        inner: SqliteStore,
        commits: usize,
        fail_on_commit: Option<usize>,
        cancel_on_commit: Option<(usize, CancelFlag)>,
    }

    impl FlakyStore {
        fn new(inner: SqliteStore) -> Self {
            FlakyStore {
                inner,
                commits: 0,
                fail_on_commit: None,
                cancel_on_commit: None,
            }
        }
    }

    impl PayerStore for FlakyStore {
        fn fetch_details(&self, offset: usize, limit: usize) -> Result<Vec<RawDetailRecord>> {
            self.inner.fetch_details(offset, limit)
        }
        fn count_details(&self) -> Result<usize> {
            self.inner.count_details()
        }
        fn fetch_canonical_payers(&self) -> Result<Vec<CanonicalPayer>> {
            self.inner.fetch_canonical_payers()
        }
        fn fetch_groups(&self) -> Result<Vec<PayerGroup>> {
            self.inner.fetch_groups()
        }
        fn payer_states(&self) -> Result<HashMap<String, String>> {
            self.inner.payer_states()
        }
        fn commit_batch(&mut self, writes: &BatchWrites) -> Result<()> {
            let n = self.commits;
            self.commits += 1;
            if self.fail_on_commit == Some(n) {
                return Err(ResolverError::Config("disk full".to_string()));
            }
            if let Some((at, flag)) = &self.cancel_on_commit {
                if *at == n {
                    flag.cancel();
                }
            }
            self.inner.commit_batch(writes)
        }
        fn assign_detail_payer(&mut self, detail_id: i64, payer_id: &str) -> Result<()> {
            self.inner.assign_detail_payer(detail_id, payer_id)
        }
        fn set_pretty_name(&mut self, payer_id: &str, pretty_name: &str) -> Result<()> {
            self.inner.set_pretty_name(payer_id, pretty_name)
        }
        fn set_payer_group(&mut self, payer_id: &str, group_id: &str) -> Result<bool> {
            self.inner.set_payer_group(payer_id, group_id)
        }
        fn record_event(&mut self, event: &Event) -> Result<()> {
            self.inner.record_event(event)
        }
    }

    fn create_test_detail(payer_id: &str, name: &str, state: Option<&str>) -> RawDetailRecord {
        RawDetailRecord::new(0, payer_id, name, state, "Vyne")
    }

    /// Store with canonical Delta Dental of Arizona and four raw records
    fn seeded_store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .add_payer(&CanonicalPayer::new("86027", "Delta Dental of Arizona", UNKNOWN_GROUP_ID))
            .unwrap();
        store
            .import_details(&[
                create_test_detail("DD-AZ-1", "Delta Dental Arizona", Some("AZ")),
                create_test_detail("DD-AZ-2", "Delta Dent AZ", Some("AZ")),
                create_test_detail("ZEN01", "Zenith Health", Some("TX")),
                create_test_detail("ZEN02", "ZENITH HEALTH", Some("TX")),
            ])
            .unwrap();
        store
    }

    fn config(batch_size: usize) -> ResolverConfig {
        ResolverConfig {
            batch_size,
            ..ResolverConfig::default()
        }
    }

    fn payer_ids(store: &SqliteStore) -> Vec<String> {
        store
            .fetch_details(0, 100)
            .unwrap()
            .into_iter()
            .map(|d| d.payer_id)
            .collect()
    }

    #[test]
    fn test_run_persists_outcomes() {
        let mut store = seeded_store();

        let report = ResolutionRun::new(&mut store, &config(2)).execute().unwrap();

        assert_eq!(report.processed, 4);
        assert_eq!(report.matched, 2);
        assert_eq!(report.created, 1);
        assert_eq!(report.ambiguous.len(), 1);
        assert_eq!(report.ambiguous[0].record.payer_id, "DD-AZ-2");
        assert_eq!(report.batches_committed, 2);
        assert!(!report.cancelled);

        assert_eq!(payer_ids(&store), vec!["86027", "DD-AZ-2", "ZEN01", "ZEN01"]);
        let zenith = store.find_payer("ZEN01").unwrap().unwrap();
        assert_eq!(zenith.group_id, UNKNOWN_GROUP_ID);
        assert!(store.find_payer("DD-AZ-2").unwrap().is_none());
    }

    #[test]
    fn test_rerun_is_stable() {
        let mut store = seeded_store();
        ResolutionRun::new(&mut store, &config(3)).execute().unwrap();
        let after_first = payer_ids(&store);

        let report = ResolutionRun::new(&mut store, &config(3)).execute().unwrap();
        assert_eq!(report.created, 0);
        assert_eq!(report.matched, 3);
        assert_eq!(report.ambiguous.len(), 1);
        assert_eq!(report.batches_committed, 0);
        assert_eq!(payer_ids(&store), after_first);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let mut store = seeded_store();
        let before = payer_ids(&store);

        let report = ResolutionRun::new(&mut store, &config(2))
            .dry_run(true)
            .execute()
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.created, 1);
        assert_eq!(report.batches_committed, 0);
        assert_eq!(payer_ids(&store), before);
        assert!(store.find_payer("ZEN01").unwrap().is_none());
    }

    #[test]
    fn test_commit_failure_aborts_and_keeps_earlier_batches() {
        let mut store = FlakyStore::new(seeded_store());
        store.fail_on_commit = Some(1);

        let err = ResolutionRun::new(&mut store, &config(2)).execute().unwrap_err();
        assert!(matches!(err, ResolverError::CommitFailure { batch: 1, .. }));

        // batch 0 (DD-AZ-1 matched, DD-AZ-2 ambiguous) landed; batch 1 did not
        assert_eq!(payer_ids(&store.inner), vec!["86027", "DD-AZ-2", "ZEN01", "ZEN02"]);
        assert!(store.inner.find_payer("ZEN01").unwrap().is_none());
    }

    #[test]
    fn test_state_refused_same_name_does_not_block_later_batches() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .import_details(&[
                create_test_detail("DDAZ", "Delta Dental", Some("AZ")),
                create_test_detail("DDCA", "Delta Dental", Some("CA")),
                create_test_detail("ZEN", "Zenith Health", Some("TX")),
            ])
            .unwrap();

        let strict = ResolverConfig {
            require_state_match: true,
            batch_size: 1,
            ..ResolverConfig::default()
        };

        // DDCA cannot merge into DDAZ (states differ) and cannot be stored
        // under the same name in UNKNOWN, so it waits for an operator
        for _ in 0..2 {
            let report = ResolutionRun::new(&mut store, &strict).execute().unwrap();
            assert_eq!(report.ambiguous.len(), 1);
            assert_eq!(report.ambiguous[0].record.payer_id, "DDCA");
            assert_eq!(
                report.ambiguous[0].outcome,
                MatchOutcome::Ambiguous {
                    payer_id: "DDAZ".to_string(),
                    score: 100
                }
            );
        }

        assert!(store.find_payer("DDAZ").unwrap().is_some());
        assert!(store.find_payer("DDCA").unwrap().is_none());
        assert!(store.find_payer("ZEN").unwrap().is_some());
    }

    #[test]
    fn test_cancel_takes_effect_at_batch_boundary() {
        let flag = CancelFlag::new();
        let mut store = FlakyStore::new(seeded_store());
        store.cancel_on_commit = Some((0, flag.clone()));

        let report = ResolutionRun::new(&mut store, &config(2))
            .with_cancel(flag)
            .execute()
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.processed, 2);
        assert_eq!(report.batches_committed, 1);
        assert_eq!(payer_ids(&store.inner), vec!["86027", "DD-AZ-2", "ZEN01", "ZEN02"]);
    }

    #[test]
    fn test_already_cancelled_run_does_nothing() {
        let flag = CancelFlag::new();
        flag.cancel();
        let mut store = seeded_store();

        let report = ResolutionRun::new(&mut store, &config(2))
            .with_cancel(flag)
            .execute()
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.processed, 0);
    }

    #[test]
    fn test_malformed_rows_counted_as_skipped() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store
            .connection()
            .execute(
                "INSERT INTO payer_details (idempotency_hash, payer_id, payer_name, state, source)
                 VALUES ('h1', 'X1', '   ', NULL, 'Vyne')",
                [],
            )
            .unwrap();
        store
            .import_details(&[create_test_detail("AET01", "Aetna", None)])
            .unwrap();

        let report = ResolutionRun::new(&mut store, &config(10)).execute().unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 1);
        assert!(store.find_payer("X1").unwrap().is_none());
    }
}
