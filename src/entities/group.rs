// 🏢 Payer Group - Organization that owns payers
//
// Groups are created implicitly: assigning a payer to an unknown group id
// creates a placeholder whose name is the id itself (numbered if another
// group already goes by that name).

use serde::{Deserialize, Serialize};

/// Group every new canonical payer starts in
pub const UNKNOWN_GROUP_ID: &str = "UNKNOWN";
pub const UNKNOWN_GROUP_NAME: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayerGroup {
    /// Stable identity (e.g. "DD")
    pub group_id: String,

    /// Display name, unique across groups (e.g. "Delta Dental")
    pub group_name: String,
}

impl PayerGroup {
    pub fn new(group_id: &str, group_name: &str) -> Self {
        PayerGroup {
            group_id: group_id.to_string(),
            group_name: group_name.to_string(),
        }
    }

    /// Placeholder group named after its own id
    pub fn placeholder(group_id: &str) -> Self {
        PayerGroup::new(group_id, group_id)
    }

    /// Placeholder for when its id is already another group's name
    ///
    /// `attempt` starts at 2: "Delta Dental #2", "Delta Dental #3", ...
    pub fn placeholder_numbered(group_id: &str, attempt: usize) -> Self {
        PayerGroup::new(group_id, &format!("{} #{}", group_id, attempt))
    }

    pub fn unknown() -> Self {
        PayerGroup::new(UNKNOWN_GROUP_ID, UNKNOWN_GROUP_NAME)
    }
}
