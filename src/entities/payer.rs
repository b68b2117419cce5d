// 🦷 Canonical Payer - The deduplicated payer entity
//
// "payer_id is IDENTITY (never changes), names are VALUES (operators fix them)"
//
// Every raw detail record ends up pointing at one of these, either by an
// automatic match or by an operator override.

use super::detail::RawDetailRecord;
use super::group::UNKNOWN_GROUP_ID;
use crate::pretty_name::prettify;
use serde::{Deserialize, Serialize};

/// Placeholder payer for records an operator has parked
pub const UNMAPPED_PAYER_ID: &str = "UNMAPPED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPayer {
    /// Stable identity (unique key)
    pub payer_id: String,

    /// Canonical name
    pub payer_name: String,

    /// Operator-assigned display name; `None` means "derive one"
    pub pretty_name: Option<String>,

    /// Owning group
    pub group_id: String,
}

impl CanonicalPayer {
    pub fn new(payer_id: &str, payer_name: &str, group_id: &str) -> Self {
        CanonicalPayer {
            payer_id: payer_id.to_string(),
            payer_name: payer_name.to_string(),
            pretty_name: None,
            group_id: group_id.to_string(),
        }
    }

    /// Seed a new canonical payer from a record nothing else matched
    ///
    /// The record's own id and name become the canonical identity; the
    /// group stays UNKNOWN until an operator assigns one.
    pub fn from_record(record: &RawDetailRecord) -> Self {
        CanonicalPayer::new(&record.payer_id, record.payer_name.trim(), UNKNOWN_GROUP_ID)
    }

    /// Name to show operators
    ///
    /// An explicit pretty name always wins; otherwise one is derived.
    pub fn display_name(&self) -> String {
        match self.pretty_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => prettify(&self.payer_name),
        }
    }
}
