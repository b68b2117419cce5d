//! Configuration
//!
//! Thresholds and batch sizing for resolution runs, plus where the store
//! lives and where the optional HTTP server listens. Everything has a
//! default; a TOML file only needs the keys it changes.

use crate::error::{ResolverError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Knobs of the matching engine and the batch runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Scores above this auto-match (default: 85)
    pub auto_match_threshold: u8,

    /// Scores above this, up to the auto-match threshold, go to review (default: 70)
    pub review_threshold: u8,

    /// Minimum similarity for one group to nest under another (default: 80)
    pub hierarchy_threshold: u8,

    /// Only auto-match when the candidate's state agrees with the record's
    pub require_state_match: bool,

    /// Records per committed batch (default: 100)
    pub batch_size: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            auto_match_threshold: 85,
            review_threshold: 70,
            hierarchy_threshold: 80,
            require_state_match: false,
            batch_size: 100,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.auto_match_threshold > 100 || self.hierarchy_threshold > 100 {
            return Err(ResolverError::Config(
                "thresholds must be within 0..=100".to_string(),
            ));
        }
        if self.review_threshold >= self.auto_match_threshold {
            return Err(ResolverError::Config(format!(
                "review_threshold ({}) must be below auto_match_threshold ({})",
                self.review_threshold, self.auto_match_threshold
            )));
        }
        if self.batch_size == 0 {
            return Err(ResolverError::Config("batch_size must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    pub resolver: ResolverConfig,
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("payers.db"),
            resolver: ResolverConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read and validate a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&text)
            .map_err(|e| ResolverError::Config(format!("{}: {}", path.display(), e)))?;
        config.resolver.validate()?;
        Ok(config)
    }

    /// Config file if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}
