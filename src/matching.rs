// 🔍 Matching Engine - Classify raw detail records against the registry
//
// Per record, in this order:
// 1. Exact id: the record's payer_id is already canonical → Matched
// 2. Name scan over the registry in payer_id order; the FIRST candidate
//    crossing a threshold decides (not the best-scoring one):
//    - score > 85 → Matched (optionally only if the states agree)
//    - score > 70 → Ambiguous, for an operator to decide
// 3. Nothing crossed 70 → New: the record seeds a canonical payer, unless a
//    payer with the same name already sits in UNKNOWN (only possible when
//    the state rule refused it); that record goes to review instead
//
// Matched/New update the registry so later records in the same batch see
// payers created earlier in it. Ambiguous never changes anything.

use crate::config::ResolverConfig;
use crate::entities::{RawDetailRecord, UNKNOWN_GROUP_ID};
use crate::error::ResolverError;
use crate::registry::{Registry, RegistryEntry};
use crate::similarity::score;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ============================================================================
// MATCH OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// Record belongs to this canonical payer
    Matched { payer_id: String },

    /// Record might belong to this payer; needs manual review
    Ambiguous { payer_id: String, score: u8 },

    /// Record seeds a new canonical payer under its own id
    New,
}

/// A record together with the decision made about it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub record: RawDetailRecord,
    pub outcome: MatchOutcome,
}

impl Resolution {
    /// Payer id the record should carry once the decision is applied
    ///
    /// `None` for ambiguous records, which keep whatever they had.
    pub fn resolved_payer_id(&self) -> Option<&str> {
        match &self.outcome {
            MatchOutcome::Matched { payer_id } => Some(payer_id),
            MatchOutcome::New => Some(&self.record.payer_id),
            MatchOutcome::Ambiguous { .. } => None,
        }
    }
}

/// Which band a similarity score falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTier {
    AutoMatch,
    Review,
    NoMatch,
}

// ============================================================================
// MATCHING ENGINE
// ============================================================================

pub struct MatchingEngine {
    /// Scores above this auto-match (default: 85)
    pub auto_match_threshold: u8,

    /// Scores above this go to review (default: 70)
    pub review_threshold: u8,

    /// Require candidate state == record state (or no candidate state) to auto-match
    pub require_state_match: bool,
}

impl MatchingEngine {
    /// Create engine with default thresholds
    pub fn new() -> Self {
        Self::from_config(&ResolverConfig::default())
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        MatchingEngine {
            auto_match_threshold: config.auto_match_threshold,
            review_threshold: config.review_threshold,
            require_state_match: config.require_state_match,
        }
    }

    pub fn with_state_match(mut self, required: bool) -> Self {
        self.require_state_match = required;
        self
    }

    pub fn classify_score(&self, score: u8) -> ScoreTier {
        if score > self.auto_match_threshold {
            ScoreTier::AutoMatch
        } else if score > self.review_threshold {
            ScoreTier::Review
        } else {
            ScoreTier::NoMatch
        }
    }

    /// Decide a record's outcome without touching the registry
    pub fn match_record(&self, record: &RawDetailRecord, registry: &Registry) -> MatchOutcome {
        if registry.lookup(&record.payer_id).is_some() {
            return MatchOutcome::Matched {
                payer_id: record.payer_id.clone(),
            };
        }

        let name = record.payer_name.trim();
        for entry in registry.entries() {
            let candidate = &entry.payer;
            let s = score(name, &candidate.payer_name);

            match self.classify_score(s) {
                ScoreTier::AutoMatch => {
                    if self.state_allows(record, entry) {
                        return MatchOutcome::Matched {
                            payer_id: candidate.payer_id.clone(),
                        };
                    }
                    debug!(
                        "detail {}: '{}' scores {} against {} but states differ ({:?} vs {:?})",
                        record.detail_id,
                        name,
                        s,
                        candidate.payer_id,
                        record.state,
                        entry.state
                    );
                }
                ScoreTier::Review => {
                    return MatchOutcome::Ambiguous {
                        payer_id: candidate.payer_id.clone(),
                        score: s,
                    };
                }
                ScoreTier::NoMatch => {}
            }
        }

        // A payer created from this record would land in UNKNOWN next to a
        // same-named payer that the state rule refused; hand it to review.
        if let Some((payer_id, existing)) = name_collision(name, registry) {
            debug!(
                "detail {}: '{}' collides with {} in {}, flagging for review",
                record.detail_id, name, payer_id, UNKNOWN_GROUP_ID
            );
            return MatchOutcome::Ambiguous {
                payer_id: payer_id.to_string(),
                score: score(name, existing),
            };
        }

        MatchOutcome::New
    }

    /// Decide a record's outcome and apply it to the registry
    ///
    /// Returns `None` for malformed records, which are skipped.
    pub fn resolve_one(
        &self,
        record: &RawDetailRecord,
        registry: &mut Registry,
    ) -> Option<MatchOutcome> {
        if let Err(reason) = record.validate() {
            warn!(
                "Skipping record: {}",
                ResolverError::MalformedInput {
                    detail_id: record.detail_id,
                    reason,
                }
            );
            return None;
        }

        let outcome = self.match_record(record, registry);
        if outcome == MatchOutcome::New {
            registry.upsert_from_record(record);
        }

        debug!("detail {} ('{}') → {:?}", record.detail_id, record.payer_name, outcome);
        Some(outcome)
    }

    /// Resolve a sequence of records in order
    ///
    /// Malformed records produce no entry in the result.
    pub fn resolve(&self, records: &[RawDetailRecord], registry: &mut Registry) -> Vec<Resolution> {
        records
            .iter()
            .filter_map(|record| {
                self.resolve_one(record, registry).map(|outcome| Resolution {
                    record: record.clone(),
                    outcome,
                })
            })
            .collect()
    }

    fn state_allows(&self, record: &RawDetailRecord, candidate: &RegistryEntry) -> bool {
        if !self.require_state_match {
            return true;
        }
        match (record.state.as_deref(), candidate.state.as_deref()) {
            (_, None) => true,
            (Some(ours), Some(theirs)) => ours == theirs,
            (None, Some(_)) => false,
        }
    }
}

/// Payer in the UNKNOWN group whose name equals `name`, ignoring case
fn name_collision<'r>(name: &str, registry: &'r Registry) -> Option<(&'r str, &'r str)> {
    let lowered = name.to_lowercase();
    registry.all_entries().find(|(payer_id, payer_name)| {
        payer_name.trim().to_lowercase() == lowered
            && registry
                .lookup(payer_id)
                .is_some_and(|payer| payer.group_id == UNKNOWN_GROUP_ID)
    })
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
