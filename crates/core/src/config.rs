//! Recognized configuration keys (spec §6) and their validation.
//!
//! `ManagerConfig` is plain data, deserializable with `serde` from whatever
//! host format a caller prefers (JSON, TOML, environment variables); this
//! crate does not parse any particular format itself (out of scope, spec
//! §1). `ManagerConfig::validate` mirrors the teacher's habit of validating
//! after deserialization rather than leaning on serde alone.

use serde::{Deserialize, Serialize};

/// Configuration recognized by the transaction manager and durability
/// subsystem.
///
/// Field names match the dotted keys in spec §6 with underscores in place
/// of dots, so a caller translating from a `snapshot.dir = "..."` style
/// config file can do so mechanically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// `snapshot.dir` — filesystem path snapshots and log segments live
    /// under. Required; no default.
    pub snapshot_dir: String,
    /// `snapshot.interval.seconds` — periodic snapshot cadence.
    pub snapshot_interval_seconds: u64,
    /// `snapshot.retain.count` — how many old snapshots to keep.
    pub snapshot_retain_count: u32,
    /// `tx.timeout.default.seconds` — SHORT default timeout.
    pub tx_timeout_default_seconds: u64,
    /// `tx.timeout.max.seconds` — enforced ceiling on SHORT timeouts.
    pub tx_timeout_max_seconds: u64,
    /// `tx.long.timeout.seconds` — informational inactivity cap for LONG.
    pub tx_long_timeout_seconds: u64,
    /// `tx.cleanup.interval.seconds` — expiration sweep cadence.
    pub tx_cleanup_interval_seconds: u64,
    /// `tx.max.per.ms` — id density constant; must be stable across runs
    /// of the same log.
    pub tx_max_per_ms: u64,
}

/// A `ManagerConfig` failed validation.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `snapshot_dir` was empty.
    #[error("snapshot_dir must not be empty")]
    EmptySnapshotDir,
    /// The default SHORT timeout exceeds the configured max.
    #[error("tx_timeout_default_seconds ({default}) exceeds tx_timeout_max_seconds ({max})")]
    DefaultTimeoutExceedsMax {
        /// The configured default.
        default: u64,
        /// The configured ceiling.
        max: u64,
    },
    /// A duration field was zero where a positive value is required.
    #[error("{field} must be greater than zero")]
    MustBePositive {
        /// Name of the offending field.
        field: &'static str,
    },
}

impl ManagerConfig {
    /// Defaults matching the keys listed in spec §6, chosen for a
    /// single-node development deployment.
    pub fn with_snapshot_dir(snapshot_dir: impl Into<String>) -> Self {
        ManagerConfig {
            snapshot_dir: snapshot_dir.into(),
            snapshot_interval_seconds: 3600,
            snapshot_retain_count: 3,
            tx_timeout_default_seconds: 30,
            tx_timeout_max_seconds: 600,
            tx_long_timeout_seconds: 86_400,
            tx_cleanup_interval_seconds: 10,
            tx_max_per_ms: crate::ids::MAX_TX_PER_MS,
        }
    }

    /// Validate the configuration, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_dir.trim().is_empty() {
            return Err(ConfigError::EmptySnapshotDir);
        }
        if self.tx_timeout_default_seconds == 0 {
            return Err(ConfigError::MustBePositive {
                field: "tx_timeout_default_seconds",
            });
        }
        if self.tx_timeout_max_seconds == 0 {
            return Err(ConfigError::MustBePositive {
                field: "tx_timeout_max_seconds",
            });
        }
        if self.tx_cleanup_interval_seconds == 0 {
            return Err(ConfigError::MustBePositive {
                field: "tx_cleanup_interval_seconds",
            });
        }
        if self.tx_timeout_default_seconds > self.tx_timeout_max_seconds {
            return Err(ConfigError::DefaultTimeoutExceedsMax {
                default: self.tx_timeout_default_seconds,
                max: self.tx_timeout_max_seconds,
            });
        }
        Ok(())
    }
}
