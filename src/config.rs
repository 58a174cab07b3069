// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! TOML configuration for the leaderboard.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//!
//! ```toml
//! [skip_list]
//! max_level = 32
//! probability = 0.5
//!
//! [scoring]
//! max_delta = 1000
//!
//! [shards]
//! count = 4
//! replicas = 100
//!
//! [lock]
//! max_readers = 10000
//! acquire_timeout_ms = 250
//!
//! [log]
//! level = "info"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::lock::DEFAULT_MAX_READERS;
use crate::lock::MAX_READERS_LIMIT;
use crate::ring::DEFAULT_REPLICAS;
use crate::skip_list::LEVEL_CAP;
use crate::skip_list::SkipListOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Skip list level generation.
    pub skip_list: SkipListOptions,
    /// Score update limits.
    pub scoring: ScoringSection,
    /// Customer directory partitioning.
    pub shards: ShardSection,
    /// Reader-writer lock tuning.
    pub lock: LockSection,
    /// Logging.
    pub log: LogSection,
}

/// `[scoring]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    /// Largest accepted absolute score change per update, in whole points.
    pub max_delta: u32,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self { max_delta: 1000 }
    }
}

/// `[shards]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShardSection {
    /// Shards the customer directory starts with, ids `0..count`.
    pub count: u32,
    /// Virtual replicas per shard on the hash ring.
    pub replicas: u32,
}

impl Default for ShardSection {
    fn default() -> Self {
        Self {
            count: 4,
            replicas: DEFAULT_REPLICAS,
        }
    }
}

/// `[lock]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LockSection {
    /// Reader admission capacity.
    pub max_readers: usize,
    /// Give up on lock acquisition after this many milliseconds.
    /// Waits indefinitely when absent.
    pub acquire_timeout_ms: Option<u64>,
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            max_readers: DEFAULT_MAX_READERS,
            acquire_timeout_ms: None,
        }
    }
}

impl LockSection {
    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Filter used when `RUST_LOG` is unset (e.g. `"info"`, `"standings=debug"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LeaderboardConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: LeaderboardConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if !(1..=LEVEL_CAP).contains(&self.skip_list.max_level) {
            return invalid(format!(
                "skip_list.max_level must be in 1..={LEVEL_CAP}, got {}",
                self.skip_list.max_level
            ));
        }
        let p = self.skip_list.probability;
        if !(p > 0.0 && p < 1.0) {
            return invalid(format!("skip_list.probability must be in (0, 1), got {p}"));
        }
        if self.scoring.max_delta == 0 {
            return invalid("scoring.max_delta must be positive".to_string());
        }
        if self.shards.count == 0 {
            return invalid("shards.count must be at least 1".to_string());
        }
        if self.shards.replicas == 0 {
            return invalid("shards.replicas must be at least 1".to_string());
        }
        if !(1..=MAX_READERS_LIMIT).contains(&self.lock.max_readers) {
            return invalid(format!(
                "lock.max_readers must be in 1..={MAX_READERS_LIMIT}, got {}",
                self.lock.max_readers
            ));
        }
        if self.lock.acquire_timeout_ms == Some(0) {
            return invalid("lock.acquire_timeout_ms must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = LeaderboardConfig::from_toml_str("").unwrap();
        assert_eq!(config, LeaderboardConfig::default());
        assert_eq!(config.skip_list.max_level, 32);
        assert_eq!(config.scoring.max_delta, 1000);
        assert_eq!(config.shards.count, 4);
        assert_eq!(config.lock.acquire_timeout(), None);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn partial_sections_merge_with_defaults() {
        let config = LeaderboardConfig::from_toml_str(
            r#"
            [skip_list]
            seed = 42

            [lock]
            acquire_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.skip_list.seed, Some(42));
        assert_eq!(config.skip_list.probability, 0.5);
        assert_eq!(config.lock.max_readers, DEFAULT_MAX_READERS);
        assert_eq!(config.lock.acquire_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn rejects_bad_values() {
        for text in [
            "[skip_list]\nmax_level = 0",
            "[skip_list]\nmax_level = 65",
            "[skip_list]\nprobability = 1.0",
            "[scoring]\nmax_delta = 0",
            "[shards]\ncount = 0",
            "[shards]\nreplicas = 0",
            "[lock]\nmax_readers = 0",
            "[lock]\nacquire_timeout_ms = 0",
        ] {
            assert!(
                matches!(LeaderboardConfig::from_toml_str(text), Err(ConfigError::Invalid(_))),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            LeaderboardConfig::from_toml_str("[shards\ncount = 1"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_missing_file() {
        let result = LeaderboardConfig::load(Path::new("/nonexistent/standings.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
