// 🧑‍⚖️ Review - Operator commands and the listings they work from
//
// Commands (each leaves an audit event):
// - map_detail:          point an ambiguous record at a payer
// - update_pretty_name:  set or clear a payer's display name
// - assign_group:        move a payer to a group (placeholder group if new)
//
// Listings:
// - unmapped_page: records a dry-run resolution flags as ambiguous
// - payers_page:   canonical payers with their display names
// - group_tree:    inferred group hierarchy

use crate::config::ResolverConfig;
use crate::db::Event;
use crate::error::Result;
use crate::hierarchy::{GroupNode, HierarchyInferencer};
use crate::matching::MatchOutcome;
use crate::run::ResolutionRun;
use crate::store::{Page, PayerStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default actor for audit events
pub const OPERATOR: &str = "operator";

// ============================================================================
// LISTING SHAPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerListing {
    pub payer_id: String,
    pub payer_name: String,
    pub pretty_name: Option<String>,
    /// pretty_name if set, otherwise derived from payer_name
    pub display_name: String,
    pub group_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedRecord {
    pub detail_id: i64,
    pub payer_id: String,
    pub payer_name: String,
    pub state: Option<String>,
    pub source: String,
    /// Payer the record was close to
    pub candidate_payer_id: String,
    pub score: u8,
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Manual override: assign a detail record to an existing payer
pub fn map_detail<S: PayerStore>(
    store: &mut S,
    detail_id: i64,
    payer_id: &str,
    actor: &str,
) -> Result<()> {
    if let Err(e) = store.assign_detail_payer(detail_id, payer_id) {
        warn!("map_detail({}, {}) rejected: {}", detail_id, payer_id, e);
        return Err(e);
    }

    store.record_event(&Event::new(
        "detail_mapped",
        "payer_detail",
        &detail_id.to_string(),
        serde_json::json!({ "payer_id": payer_id }),
        actor,
    ))?;
    info!("Detail {} mapped to payer {}", detail_id, payer_id);
    Ok(())
}

/// Set a payer's display name; a blank name clears it
pub fn update_pretty_name<S: PayerStore>(
    store: &mut S,
    payer_id: &str,
    pretty_name: &str,
    actor: &str,
) -> Result<()> {
    if let Err(e) = store.set_pretty_name(payer_id, pretty_name) {
        warn!("update_pretty_name({}) rejected: {}", payer_id, e);
        return Err(e);
    }

    store.record_event(&Event::new(
        "pretty_name_updated",
        "payer",
        payer_id,
        serde_json::json!({ "pretty_name": pretty_name.trim() }),
        actor,
    ))?;
    Ok(())
}

/// Move a payer to a group; returns true if the group was created
pub fn assign_group<S: PayerStore>(
    store: &mut S,
    payer_id: &str,
    group_id: &str,
    actor: &str,
) -> Result<bool> {
    let created = match store.set_payer_group(payer_id, group_id) {
        Ok(created) => created,
        Err(e) => {
            warn!("assign_group({}, {}) rejected: {}", payer_id, group_id, e);
            return Err(e);
        }
    };

    if created {
        info!("Created placeholder group {}", group_id);
    }

    store.record_event(&Event::new(
        "group_assigned",
        "payer",
        payer_id,
        serde_json::json!({ "group_id": group_id, "group_created": created }),
        actor,
    ))?;
    Ok(created)
}

// ============================================================================
// LISTINGS
// ============================================================================

/// Records currently needing review, from a dry-run resolution
pub fn unmapped_page<S: PayerStore>(
    store: &mut S,
    config: &ResolverConfig,
    offset: usize,
    limit: usize,
) -> Result<Page<UnmappedRecord>> {
    let report = ResolutionRun::new(store, config).dry_run(true).execute()?;

    let unmapped: Vec<UnmappedRecord> = report
        .ambiguous
        .into_iter()
        .filter_map(|resolution| match resolution.outcome {
            MatchOutcome::Ambiguous { payer_id, score } => Some(UnmappedRecord {
                detail_id: resolution.record.detail_id,
                payer_id: resolution.record.payer_id,
                payer_name: resolution.record.payer_name,
                state: resolution.record.state,
                source: resolution.record.source,
                candidate_payer_id: payer_id,
                score,
            }),
            _ => None,
        })
        .collect();

    Ok(Page::slice(unmapped, offset, limit))
}

pub fn payers_page<S: PayerStore>(store: &S, offset: usize, limit: usize) -> Result<Page<PayerListing>> {
    let listings: Vec<PayerListing> = store
        .fetch_canonical_payers()?
        .into_iter()
        .map(|payer| PayerListing {
            display_name: payer.display_name(),
            payer_id: payer.payer_id,
            payer_name: payer.payer_name,
            pretty_name: payer.pretty_name,
            group_id: payer.group_id,
        })
        .collect();

    Ok(Page::slice(listings, offset, limit))
}

pub fn group_tree<S: PayerStore>(store: &S, config: &ResolverConfig) -> Result<Vec<GroupNode>> {
    let groups = store.fetch_groups()?;
    Ok(HierarchyInferencer::from_config(config).infer(&groups))
}

// ============================================================================
// TESTS
// ============================================================================
