// Payer Resolution - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod hierarchy;      // Group hierarchy inference
pub mod matching;       // Matching engine
pub mod pretty_name;    // Display-name derivation
pub mod registry;       // Canonical registry snapshot
pub mod review;         // Operator commands + listings
pub mod run;            // Batched resolution runs
pub mod similarity;     // Name similarity scorer
pub mod store;

// Re-export commonly used types
pub use config::{AppConfig, ResolverConfig, ServerConfig};
pub use db::{
    Event, ImportSummary, SqliteStore,
    get_events_for_entity, insert_details, insert_event, load_csv, setup_database,
};
pub use entities::{
    CanonicalPayer, PayerGroup, RawDetailRecord,
    UNKNOWN_GROUP_ID, UNKNOWN_GROUP_NAME, UNMAPPED_PAYER_ID,
};
pub use error::{ResolverError, Result};
pub use hierarchy::{infer, GroupNode, HierarchyInferencer};
pub use matching::{MatchOutcome, MatchingEngine, Resolution, ScoreTier};
pub use pretty_name::prettify;
pub use registry::{Registry, RegistryEntry};
pub use review::{
    PayerListing, UnmappedRecord, OPERATOR,
    assign_group, group_tree, map_detail, payers_page, unmapped_page, update_pretty_name,
};
pub use run::{CancelFlag, ResolutionRun, RunReport};
pub use similarity::score;
pub use store::{BatchWrites, Page, PayerStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
