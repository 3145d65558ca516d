//! Ledger configuration.

use crate::error::{Error, Result};
use crate::visibility::{VisibilityPolicy, HIDE_THRESHOLD, SHOW_THRESHOLD};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default number of random probes per gossip sample.
pub const DEFAULT_GOSSIP_ATTEMPTS: usize = 100;

/// Default number of operations per gossip sample.
pub const DEFAULT_GOSSIP_BATCH: usize = 10;

/// Ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Data directory for the RocksDB store
    pub data_dir: PathBuf,

    /// Score at which statements without a local vote are shown
    pub show_threshold: i64,

    /// Scores at or below this are hidden rather than suggested
    pub hide_threshold: i64,

    /// Random probes per gossip sample
    pub gossip_attempts: usize,

    /// Operations per gossip sample
    pub gossip_batch_size: usize,

    /// Only gossip operations at least this old
    pub gossip_min_age: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tagmesh-data"),
            show_threshold: SHOW_THRESHOLD,
            hide_threshold: HIDE_THRESHOLD,
            gossip_attempts: DEFAULT_GOSSIP_ATTEMPTS,
            gossip_batch_size: DEFAULT_GOSSIP_BATCH,
            gossip_min_age: Duration::ZERO,
        }
    }
}

impl LedgerConfig {
    /// Create config from `TAGMESH_*` environment variables, with defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let data_dir = lookup("TAGMESH_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let config = Self {
            data_dir,
            show_threshold: parse_var(&lookup, "TAGMESH_SHOW_THRESHOLD", defaults.show_threshold)?,
            hide_threshold: parse_var(&lookup, "TAGMESH_HIDE_THRESHOLD", defaults.hide_threshold)?,
            gossip_attempts: parse_var(&lookup, "TAGMESH_GOSSIP_ATTEMPTS", defaults.gossip_attempts)?,
            gossip_batch_size: parse_var(&lookup, "TAGMESH_GOSSIP_BATCH", defaults.gossip_batch_size)?,
            gossip_min_age: Duration::from_secs(parse_var(
                &lookup,
                "TAGMESH_GOSSIP_MIN_AGE_SECS",
                defaults.gossip_min_age.as_secs(),
            )?),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the thresholds leave room for a suggestion band.
    pub fn validate(&self) -> Result<()> {
        if self.hide_threshold >= self.show_threshold {
            return Err(Error::Config(format!(
                "hide threshold {} must be below show threshold {}",
                self.hide_threshold, self.show_threshold
            )));
        }
        Ok(())
    }

    /// The visibility policy these thresholds describe.
    pub fn policy(&self) -> VisibilityPolicy {
        VisibilityPolicy::new(self.show_threshold, self.hide_threshold)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid {}={:?}: {}", name, raw, e))),
    }
}
