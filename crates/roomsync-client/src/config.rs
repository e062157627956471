//! Sync engine configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Outbound batch cadence in milliseconds
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Per-axis drift threshold for the outbound dirty scan
    #[serde(default = "default_dirty_epsilon")]
    pub dirty_epsilon: f64,
    /// Broadcast event channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_update_interval_ms() -> u64 {
    50
}

fn default_dirty_epsilon() -> f64 {
    1e-4
}

fn default_event_capacity() -> usize {
    100
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            dirty_epsilon: default_dirty_epsilon(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Load configuration from a TOML file, falling back to defaults if the file
/// is missing or malformed
pub fn load_config(path: &Path) -> SyncConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                info!(path = %path.display(), "loaded sync configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid sync configuration, using defaults");
                SyncConfig::default()
            }
        },
        Err(_) => {
            info!(path = %path.display(), "no sync configuration found, using defaults");
            SyncConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.update_interval_ms, 50);
        assert!((config.dirty_epsilon - 1e-4).abs() < f64::EPSILON);
        assert_eq!(config.event_capacity, 100);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: SyncConfig = toml::from_str("update_interval_ms = 100").unwrap();
        assert_eq!(config.update_interval_ms, 100);
        assert!((config.dirty_epsilon - 1e-4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml"));
        assert_eq!(config.update_interval_ms, 50);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "update_interval_ms = 33\ndirty_epsilon = 0.001").unwrap();
        let config = load_config(&path);
        assert_eq!(config.update_interval_ms, 33);
        assert!((config.dirty_epsilon - 0.001).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.toml");
        std::fs::write(&path, "update_interval_ms = \"soon\"").unwrap();
        let config = load_config(&path);
        assert_eq!(config.update_interval_ms, 50);
    }
}
