// 🏥 Payer Resolution - Command line
//
// Import raw payer records, resolve them against the canonical registry,
// and run the operator commands from a shell.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use payer_resolution::{
    assign_group, group_tree, load_csv, map_detail, payers_page, unmapped_page,
    update_pretty_name, AppConfig, GroupNode, ResolutionRun, SqliteStore, OPERATOR,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "payer-resolution", version, about = "Resolve raw payer records into canonical payers")]
struct Cli {
    /// SQLite database file (overrides the config file)
    #[arg(long, env = "PAYER_DB", global = true)]
    db: Option<PathBuf>,

    /// TOML config file
    #[arg(long, env = "PAYER_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the schema and sentinel rows
    Init,

    /// Load a CSV of raw payer records
    Import {
        csv: PathBuf,

        /// Source label for rows without one (defaults to the file stem)
        #[arg(long)]
        source: Option<String>,
    },

    /// Resolve every stored record against the registry
    Resolve {
        /// Compute outcomes without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Only auto-match candidates from the same state
        #[arg(long)]
        require_state: bool,
    },

    /// Records waiting for an operator decision
    Unmapped {
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Canonical payers with display names
    Payers {
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Print the inferred group hierarchy
    Groups,

    /// Map a detail record to a payer
    Map { detail_id: i64, payer_id: String },

    /// Set a payer's display name (empty string clears it)
    Pretty { payer_id: String, name: String },

    /// Move a payer into a group
    Group { payer_id: String, group_id: String },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let mut store = SqliteStore::open(&config.database_path)
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    match cli.command {
        Command::Init => {
            info!("Database ready at {}", config.database_path.display());
        }
        Command::Import { csv, source } => {
            let records = load_csv(&csv, source.as_deref())
                .with_context(|| format!("Failed to read {}", csv.display()))?;
            let summary = store.import_details(&records)?;
            print_json(&summary)?;
        }
        Command::Resolve { dry_run, require_state } => {
            let mut resolver = config.resolver.clone();
            resolver.require_state_match |= require_state;
            let report = ResolutionRun::new(&mut store, &resolver).dry_run(dry_run).execute()?;
            print_json(&report)?;
        }
        Command::Unmapped { offset, limit } => {
            print_json(&unmapped_page(&mut store, &config.resolver, offset, limit)?)?;
        }
        Command::Payers { offset, limit } => {
            print_json(&payers_page(&store, offset, limit)?)?;
        }
        Command::Groups => {
            for root in group_tree(&store, &config.resolver)? {
                print_node(&root, 0);
            }
        }
        Command::Map { detail_id, payer_id } => {
            map_detail(&mut store, detail_id, &payer_id, OPERATOR)?;
            println!("✓ Detail {} → {}", detail_id, payer_id);
        }
        Command::Pretty { payer_id, name } => {
            update_pretty_name(&mut store, &payer_id, &name, OPERATOR)?;
            println!("✓ Pretty name updated for {}", payer_id);
        }
        Command::Group { payer_id, group_id } => {
            let created = assign_group(&mut store, &payer_id, &group_id, OPERATOR)?;
            if created {
                println!("✓ Created group {}", group_id);
            }
            println!("✓ {} → {}", payer_id, group_id);
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_node(node: &GroupNode, depth: usize) {
    println!("{}{} ({})", "  ".repeat(depth), node.group_name, node.group_id);
    for child in &node.children {
        print_node(child, depth + 1);
    }
}
