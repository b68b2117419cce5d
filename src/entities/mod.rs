// Entity Models
//
// Identity is the payer/group id; names and display names are values that
// operators may correct over time.
//
// - RawDetailRecord: one as-ingested observation of a payer
// - CanonicalPayer:  the deduplicated payer every record resolves to
// - PayerGroup:      the organization that owns payers

pub mod detail;
pub mod group;
pub mod payer;

pub use detail::RawDetailRecord;
pub use group::{PayerGroup, UNKNOWN_GROUP_ID, UNKNOWN_GROUP_NAME};
pub use payer::{CanonicalPayer, UNMAPPED_PAYER_ID};
