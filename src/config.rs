//! Environment-derived configuration.
//!
//! The chunk size and staleness cutoff are explicit configuration with
//! documented defaults rather than constants buried in the write path.

use figment::providers::Env;
use figment::Figment;
use serde::Deserialize;

use crate::sync::{DEFAULT_CHUNK_SIZE, DEFAULT_STALE_AFTER_HOURS};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection string.
    pub database_url: String,

    /// Base log level for this crate's targets (`RUST_LOG` overrides).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Records per bulk-write chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Hours without a timestamp refresh before a course is considered no
    /// longer offered.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
}

impl Config {
    /// Extract configuration from the process environment.
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::new().merge(Env::raw()).extract()
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_stale_after_hours() -> u64 {
    DEFAULT_STALE_AFTER_HOURS
}
