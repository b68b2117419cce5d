// 📄 Raw Detail Record - One payer observation from one source
//
// Problem solved:
// - "Delta Dental of AZ" from Vyne and "DELTA DENTAL ARIZONA" from Availity
//   arrive as separate rows with their own ids
// - Each row is kept as-is; resolution only rewrites payer_id

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// As-ingested payer observation
///
/// Rows are immutable except for `payer_id`, which a resolution decision
/// (automatic match or operator override) rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDetailRecord {
    /// Store-assigned identifier (0 until the row is persisted)
    #[serde(default)]
    pub detail_id: i64,

    /// Payer id as reported by the source
    pub payer_id: String,

    /// Payer name as reported by the source
    pub payer_name: String,

    /// Two-letter state code, if the source had one
    #[serde(default, deserialize_with = "deserialize_state")]
    pub state: Option<String>,

    /// Where the row came from (e.g. "Vyne", "Availity")
    #[serde(default)]
    pub source: String,
}

impl RawDetailRecord {
    pub fn new(
        detail_id: i64,
        payer_id: &str,
        payer_name: &str,
        state: Option<&str>,
        source: &str,
    ) -> Self {
        RawDetailRecord {
            detail_id,
            payer_id: payer_id.to_string(),
            payer_name: payer_name.to_string(),
            state: state.and_then(normalize_state),
            source: source.to_string(),
        }
    }

    /// Check the fields resolution depends on
    ///
    /// Returns the reason the record must be skipped, if any.
    pub fn validate(&self) -> Result<(), String> {
        if self.payer_name.trim().is_empty() {
            return Err("blank payer_name".to_string());
        }
        if self.payer_id.trim().is_empty() {
            return Err("blank payer_id".to_string());
        }
        Ok(())
    }

    /// Hash of the observed values, used to make imports idempotent
    ///
    /// The store-assigned `detail_id` is not part of the hash.
    pub fn compute_idempotency_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}\u{1f}{}\u{1f}{}\u{1f}{}",
            self.payer_id,
            self.payer_name,
            self.state.as_deref().unwrap_or(""),
            self.source
        ));
        format!("{:x}", hasher.finalize())
    }
}

/// Trim and upper-case a state code; blank means "no state"
pub fn normalize_state(state: &str) -> Option<String> {
    let trimmed = state.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

fn deserialize_state<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(normalize_state))
}

// ============================================================================
// TESTS
// ============================================================================
