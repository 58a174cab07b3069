// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! Error types for the ranking engine.

use std::time::Duration;

use crate::leaderboard::CustomerId;
use crate::leaderboard::ShardId;
use crate::score::Score;

/// Errors surfaced by [`crate::leaderboard::Leaderboard`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LeaderboardError {
    /// Customer ids are strictly positive.
    #[error("customer id must be positive, got {0}")]
    InvalidCustomer(CustomerId),

    /// A score change outside the accepted symmetric range.
    #[error("score delta {delta} outside [-{bound}, {bound}]")]
    DeltaOutOfRange {
        /// The rejected delta.
        delta: Score,
        /// The configured bound.
        bound: Score,
    },

    /// A rank window with `start < 1` or `start > end`.
    #[error("invalid rank range {start}..={end}")]
    InvalidRange {
        /// First requested rank.
        start: usize,
        /// Last requested rank.
        end: usize,
    },

    /// Bulk seeding would need deltas beyond the accepted range.
    #[error("cannot seed {count} customers: deltas are limited to {bound}")]
    SeedTooLarge {
        /// Requested population.
        count: u64,
        /// The configured delta bound.
        bound: Score,
    },

    /// The customer has no positive score and so holds no rank.
    #[error("customer {0} is not ranked")]
    NotRanked(CustomerId),

    /// Applying a delta would overflow the fixed-point score.
    #[error("score overflow for customer {0}")]
    ScoreOverflow(CustomerId),

    /// The ranking and the customer directory disagree about a customer.
    /// The update was abandoned without changing either.
    #[error("ranking out of sync with directory for customer {0}")]
    RankingOutOfSync(CustomerId),

    /// The ring must keep at least one shard to own customer records.
    #[error("cannot remove shard {0}: it is the last shard")]
    LastShard(ShardId),

    /// Lock acquisition did not complete.
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl LeaderboardError {
    /// True for errors caused by bad caller input.
    pub fn is_validation(&self) -> bool {
        return matches!(
            self,
            LeaderboardError::InvalidCustomer(_)
                | LeaderboardError::DeltaOutOfRange { .. }
                | LeaderboardError::InvalidRange { .. }
                | LeaderboardError::SeedTooLarge { .. }
        );
    }

    /// True when the requested customer is absent from the ranking.
    pub fn is_not_found(&self) -> bool {
        return matches!(self, LeaderboardError::NotRanked(_));
    }
}

/// Errors from [`crate::lock::PriorityRwLock`] acquisition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    /// The underlying semaphores were closed.
    #[error("lock closed")]
    Closed,

    /// The acquisition deadline passed before the lock was granted.
    #[error("lock acquisition timed out after {0:?}")]
    Timeout(Duration),
}

impl From<tokio::sync::AcquireError> for LockError {
    fn from(_: tokio::sync::AcquireError) -> LockError {
        return LockError::Closed;
    }
}

/// Error returned when a string is not a valid [`Score`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid score {input:?}: {reason}")]
pub struct ParseScoreError {
    pub input: String,
    pub reason: String,
}

/// Errors loading a [`crate::config::LeaderboardConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T, E = LeaderboardError> = std::result::Result<T, E>;
