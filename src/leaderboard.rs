// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! The leaderboard service.
//!
//! One global [`RankedSkipList`] orders every customer with a positive score
//! by `(score descending, customer id ascending)`. Customer records live in a
//! [`CustomerDirectory`] partitioned across shards by a consistent hash ring.
//! Both sit behind a single [`PriorityRwLock`]: updates take it exclusively,
//! queries share it.
//!
//! Customers with a score of zero or below stay in the directory but drop out
//! of the ranking until their score turns positive again.

use std::cmp::Ordering;
use std::time::Duration;

use rustc_hash::FxHashMap;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;

use crate::config::LeaderboardConfig;
use crate::error::ConfigError;
use crate::error::LeaderboardError;
use crate::error::Result;
use crate::lock::PriorityRwLock;
use crate::ring::HashRing;
use crate::score::Score;
use crate::skip_list::NaturalOrder;
use crate::skip_list::RankedSkipList;

/// Customer identity. Valid ids are strictly positive.
pub type CustomerId = i64;

/// Directory shard identity.
pub type ShardId = u32;

/// The key the ranking is ordered by.
///
/// Higher scores sort first; equal scores fall back to the lower customer
/// id, so no two customers ever share a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub score: Score,
    pub customer_id: CustomerId,
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .cmp(&self.score)
            .then_with(|| self.customer_id.cmp(&other.customer_id))
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One row of a leaderboard query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub customer_id: CustomerId,
    pub score: Score,
    /// 1-based position in the ranking.
    pub rank: usize,
}

impl LeaderboardEntry {
    fn new(key: &OrderKey, rank: usize) -> Self {
        LeaderboardEntry {
            customer_id: key.customer_id,
            score: key.score,
            rank,
        }
    }
}

/// Customer scores partitioned across shards.
///
/// Always holds at least one shard.
#[derive(Debug)]
pub struct CustomerDirectory {
    ring: HashRing<ShardId>,
    shards: FxHashMap<ShardId, FxHashMap<CustomerId, Score>>,
}

impl CustomerDirectory {
    /// A directory with shards `0..shard_count` (at least one).
    pub fn new(shard_count: u32, replicas: u32) -> Self {
        let mut directory = CustomerDirectory {
            ring: HashRing::new(replicas),
            shards: FxHashMap::default(),
        };
        for shard in 0..shard_count.max(1) {
            directory.ring.add(shard);
            directory.shards.insert(shard, FxHashMap::default());
        }
        directory
    }

    /// The shard that owns `customer_id`.
    pub fn owner(&self, customer_id: CustomerId) -> ShardId {
        match self.ring.get(customer_id.to_le_bytes()) {
            Some(shard) => *shard,
            None => unreachable!("customer directory has no shards"),
        }
    }

    /// Current score of a known customer.
    pub fn get(&self, customer_id: CustomerId) -> Option<Score> {
        self.shards
            .get(&self.owner(customer_id))
            .and_then(|shard| shard.get(&customer_id))
            .copied()
    }

    /// Record a score, creating the customer if needed.
    pub fn set(&mut self, customer_id: CustomerId, score: Score) {
        let owner = self.owner(customer_id);
        self.shards.entry(owner).or_default().insert(customer_id, score);
    }

    /// Number of known customers.
    pub fn len(&self) -> usize {
        self.shards.values().map(|shard| shard.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.values().all(|shard| shard.is_empty())
    }

    /// Customers stored on one shard.
    pub fn shard_len(&self, shard: ShardId) -> Option<usize> {
        self.shards.get(&shard).map(|customers| customers.len())
    }

    pub fn shards(&self) -> &[ShardId] {
        self.ring.shards()
    }

    /// Add a shard and move the customers it now owns onto it.
    /// Returns how many customers moved.
    pub fn add_shard(&mut self, shard: ShardId) -> usize {
        if self.ring.contains(&shard) {
            return 0;
        }
        self.ring.add(shard);
        self.shards.insert(shard, FxHashMap::default());

        let mut moving = Vec::new();
        for (&from, customers) in self.shards.iter_mut() {
            if from == shard {
                continue;
            }
            customers.retain(|&customer_id, &mut score| {
                if self.ring.get(customer_id.to_le_bytes()) == Some(&shard) {
                    moving.push((customer_id, score));
                    false
                } else {
                    true
                }
            });
        }

        let moved = moving.len();
        let target = self.shards.entry(shard).or_default();
        target.extend(moving);
        debug!(shard, moved, "added directory shard");
        moved
    }

    /// Remove a shard, rehoming its customers. The last shard cannot go.
    /// Returns how many customers moved.
    pub fn remove_shard(&mut self, shard: ShardId) -> Result<usize> {
        if !self.ring.contains(&shard) {
            return Ok(0);
        }
        if self.ring.len() == 1 {
            return Err(LeaderboardError::LastShard(shard));
        }

        self.ring.remove(&shard);
        let orphans = self.shards.remove(&shard).unwrap_or_default();
        let moved = orphans.len();
        for (customer_id, score) in orphans {
            self.set(customer_id, score);
        }
        debug!(shard, moved, "removed directory shard");
        Ok(moved)
    }
}

/// Everything guarded by the leaderboard lock.
#[derive(Debug)]
struct Standings {
    directory: CustomerDirectory,
    ranking: RankedSkipList<OrderKey, NaturalOrder>,
}

/// A live, concurrently queried customer ranking.
#[derive(Debug)]
pub struct Leaderboard {
    state: PriorityRwLock<Standings>,
    max_delta: Score,
    acquire_timeout: Option<Duration>,
}

impl Default for Leaderboard {
    fn default() -> Self {
        Self::build(&LeaderboardConfig::default())
    }
}

impl Leaderboard {
    /// Validate `config` and build an empty leaderboard from it.
    pub fn new(config: &LeaderboardConfig) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &LeaderboardConfig) -> Self {
        let standings = Standings {
            directory: CustomerDirectory::new(config.shards.count, config.shards.replicas),
            ranking: RankedSkipList::with_options(NaturalOrder, &config.skip_list),
        };
        Leaderboard {
            state: PriorityRwLock::with_max_readers(standings, config.lock.max_readers),
            max_delta: Score::from_int(i64::from(config.scoring.max_delta)),
            acquire_timeout: config.lock.acquire_timeout(),
        }
    }

    /// Largest accepted absolute score change.
    pub fn max_delta(&self) -> Score {
        self.max_delta
    }

    /// Apply `delta` to a customer's score and return the new score.
    ///
    /// The customer is created on first update. The ranking afterwards holds
    /// the customer iff the new score is positive.
    pub async fn update_score(&self, customer_id: CustomerId, delta: Score) -> Result<Score> {
        check_customer(customer_id)?;
        if delta.abs() > self.max_delta {
            return Err(LeaderboardError::DeltaOutOfRange {
                delta,
                bound: self.max_delta,
            });
        }

        let mut state = self.state.write_within(self.acquire_timeout).await?;
        let Standings { directory, ranking } = &mut *state;

        let old = directory.get(customer_id).unwrap_or(Score::ZERO);
        let new = old
            .checked_add(delta)
            .ok_or(LeaderboardError::ScoreOverflow(customer_id))?;

        let old_key = OrderKey {
            score: old,
            customer_id,
        };
        let new_key = OrderKey {
            score: new,
            customer_id,
        };
        if old.is_positive() && !ranking.remove(&old_key) {
            error!(customer_id, %old, "ranked customer missing from ranking");
            return Err(LeaderboardError::RankingOutOfSync(customer_id));
        }
        if new.is_positive() && !ranking.insert(new_key) {
            if old.is_positive() {
                ranking.insert(old_key);
            }
            error!(customer_id, %new, "ranking already holds the updated key");
            return Err(LeaderboardError::RankingOutOfSync(customer_id));
        }
        directory.set(customer_id, new);

        trace!(customer_id, %old, %new, "score updated");
        Ok(new)
    }

    /// Customers ranked `start..=end` (1-based), best first.
    ///
    /// Empty when `start` is past the ranked population.
    pub async fn range(&self, start: usize, end: usize) -> Result<Vec<LeaderboardEntry>> {
        if start < 1 || start > end {
            return Err(LeaderboardError::InvalidRange { start, end });
        }

        let state = self.state.read_within(self.acquire_timeout).await?;
        let entries = state
            .ranking
            .iter_from_rank(start)
            .take(end - start + 1)
            .enumerate()
            .map(|(offset, key)| LeaderboardEntry::new(key, start + offset))
            .collect();
        Ok(entries)
    }

    /// A contiguous window around a customer: up to `above` better-ranked
    /// customers, the customer, then up to `below` worse-ranked ones.
    ///
    /// The window is cut short at either end of the ranking.
    pub async fn neighbors(
        &self,
        customer_id: CustomerId,
        above: usize,
        below: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        check_customer(customer_id)?;

        let state = self.state.read_within(self.acquire_timeout).await?;
        let not_ranked = || LeaderboardError::NotRanked(customer_id);

        let score = state
            .directory
            .get(customer_id)
            .filter(|score| score.is_positive())
            .ok_or_else(not_ranked)?;
        let key = OrderKey { score, customer_id };
        let ranking = &state.ranking;
        let node = ranking.find(&key).ok_or_else(not_ranked)?;
        let rank = ranking.rank(&key).map_err(|_| not_ranked())?;

        let mut window = Vec::with_capacity(above.min(rank - 1) + 1 + below.min(ranking.len() - rank));

        let mut cursor = ranking.prev(node);
        let mut steps = 0;
        while steps < above {
            let Some(prev) = cursor else { break };
            if let Some(value) = ranking.get(prev) {
                window.push(LeaderboardEntry::new(value, rank - steps - 1));
            }
            cursor = ranking.prev(prev);
            steps += 1;
        }
        window.reverse();

        window.push(LeaderboardEntry::new(&key, rank));

        let mut cursor = ranking.next(node);
        let mut steps = 0;
        while steps < below {
            let Some(next) = cursor else { break };
            if let Some(value) = ranking.get(next) {
                window.push(LeaderboardEntry::new(value, rank + steps + 1));
            }
            cursor = ranking.next(next);
            steps += 1;
        }

        Ok(window)
    }

    /// 1-based rank of a customer.
    pub async fn rank(&self, customer_id: CustomerId) -> Result<usize> {
        check_customer(customer_id)?;

        let state = self.state.read_within(self.acquire_timeout).await?;
        let score = state
            .directory
            .get(customer_id)
            .filter(|score| score.is_positive())
            .ok_or(LeaderboardError::NotRanked(customer_id))?;
        state
            .ranking
            .rank(&OrderKey { score, customer_id })
            .map_err(|_| LeaderboardError::NotRanked(customer_id))
    }

    /// Current score of a customer, or None if it has never been updated.
    pub async fn score(&self, customer_id: CustomerId) -> Result<Option<Score>> {
        check_customer(customer_id)?;
        let state = self.state.read_within(self.acquire_timeout).await?;
        Ok(state.directory.get(customer_id))
    }

    /// Bulk-load customers `1..=count`, customer `i` gaining `i` points.
    pub async fn seed(&self, count: u64) -> Result<()> {
        let within_bound = i64::try_from(count)
            .map(|count| Score::from_int(count) <= self.max_delta)
            .unwrap_or(false);
        if !within_bound {
            return Err(LeaderboardError::SeedTooLarge {
                count,
                bound: self.max_delta,
            });
        }
        for i in 1..=count as i64 {
            self.update_score(i, Score::from_int(i)).await?;
        }
        info!(count, "seeded leaderboard");
        Ok(())
    }

    /// Customers currently holding a rank.
    pub async fn ranked_len(&self) -> Result<usize> {
        let state = self.state.read_within(self.acquire_timeout).await?;
        Ok(state.ranking.len())
    }

    /// Customers ever updated, ranked or not.
    pub async fn customer_count(&self) -> Result<usize> {
        let state = self.state.read_within(self.acquire_timeout).await?;
        Ok(state.directory.len())
    }

    /// Directory shards currently on the ring.
    pub async fn shards(&self) -> Result<Vec<ShardId>> {
        let state = self.state.read_within(self.acquire_timeout).await?;
        Ok(state.directory.shards().to_vec())
    }

    /// Add a directory shard. Returns how many customers migrated to it.
    pub async fn add_shard(&self, shard: ShardId) -> Result<usize> {
        let mut state = self.state.write_within(self.acquire_timeout).await?;
        Ok(state.directory.add_shard(shard))
    }

    /// Remove a directory shard. Returns how many customers migrated off it.
    pub async fn remove_shard(&self, shard: ShardId) -> Result<usize> {
        let mut state = self.state.write_within(self.acquire_timeout).await?;
        state.directory.remove_shard(shard)
    }
}

fn check_customer(customer_id: CustomerId) -> Result<()> {
    if customer_id <= 0 {
        return Err(LeaderboardError::InvalidCustomer(customer_id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: i64) -> Score {
        Score::from_int(n)
    }

    fn entry(customer_id: CustomerId, score: i64, rank: usize) -> LeaderboardEntry {
        LeaderboardEntry {
            customer_id,
            score: points(score),
            rank,
        }
    }

    #[test]
    fn order_key_sorts_high_scores_first() {
        let a = OrderKey { score: points(700), customer_id: 2 };
        let b = OrderKey { score: points(500), customer_id: 1 };
        let c = OrderKey { score: points(500), customer_id: 3 };
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.cmp(&a), Ordering::Equal);
    }

    #[tokio::test]
    async fn ties_break_by_customer_id() {
        let board = Leaderboard::default();
        assert_eq!(board.update_score(1, points(500)).await, Ok(points(500)));
        assert_eq!(board.update_score(2, points(700)).await, Ok(points(700)));
        assert_eq!(board.update_score(3, points(500)).await, Ok(points(500)));

        assert_eq!(
            board.range(1, 3).await.unwrap(),
            vec![entry(2, 700, 1), entry(1, 500, 2), entry(3, 500, 3)]
        );

        assert_eq!(board.update_score(1, points(-500)).await, Ok(Score::ZERO));
        assert_eq!(
            board.range(1, 2).await.unwrap(),
            vec![entry(2, 700, 1), entry(3, 500, 2)]
        );
        assert_eq!(board.score(1).await, Ok(Some(Score::ZERO)));
        assert_eq!(board.customer_count().await, Ok(3));
        assert_eq!(board.ranked_len().await, Ok(2));
    }

    #[tokio::test]
    async fn validation_errors() {
        let board = Leaderboard::default();
        let err = board.update_score(0, points(1)).await.unwrap_err();
        assert_eq!(err, LeaderboardError::InvalidCustomer(0));
        assert!(err.is_validation());

        let err = board.update_score(1, points(1001)).await.unwrap_err();
        assert!(matches!(err, LeaderboardError::DeltaOutOfRange { .. }));
        assert!(board.update_score(1, points(-1000)).await.is_ok());
        assert!(board.update_score(1, points(1000)).await.is_ok());

        assert!(matches!(
            board.range(0, 3).await,
            Err(LeaderboardError::InvalidRange { start: 0, end: 3 })
        ));
        assert!(matches!(
            board.range(4, 3).await,
            Err(LeaderboardError::InvalidRange { start: 4, end: 3 })
        ));
    }

    #[tokio::test]
    async fn range_past_population_is_empty() {
        let board = Leaderboard::default();
        board.seed(5).await.unwrap();
        assert_eq!(board.range(6, 10).await, Ok(vec![]));
        assert_eq!(
            board.range(4, 10).await.unwrap(),
            vec![entry(2, 2, 4), entry(1, 1, 5)]
        );
    }

    #[tokio::test]
    async fn neighbors_window() {
        let board = Leaderboard::default();
        board.seed(10).await.unwrap();

        // Customer 5 holds rank 6 (scores 10..1 descending).
        let window = board.neighbors(5, 2, 3).await.unwrap();
        assert_eq!(
            window,
            vec![
                entry(7, 7, 4),
                entry(6, 6, 5),
                entry(5, 5, 6),
                entry(4, 4, 7),
                entry(3, 3, 8),
                entry(2, 2, 9),
            ]
        );

        // Clipped at the top and bottom.
        let top = board.neighbors(10, 3, 1).await.unwrap();
        assert_eq!(top, vec![entry(10, 10, 1), entry(9, 9, 2)]);
        let bottom = board.neighbors(1, 1, 5).await.unwrap();
        assert_eq!(bottom, vec![entry(2, 2, 9), entry(1, 1, 10)]);
    }

    #[tokio::test]
    async fn neighbors_of_unranked_customer() {
        let board = Leaderboard::default();
        assert_eq!(
            board.neighbors(9, 1, 1).await,
            Err(LeaderboardError::NotRanked(9))
        );
        board.update_score(9, points(-5)).await.unwrap();
        let err = board.neighbors(9, 1, 1).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(board.rank(9).await, Err(LeaderboardError::NotRanked(9)));
    }

    #[tokio::test]
    async fn fractional_scores() {
        let board = Leaderboard::default();
        board.update_score(1, "0.25".parse().unwrap()).await.unwrap();
        board.update_score(2, "0.5".parse().unwrap()).await.unwrap();
        assert_eq!(board.rank(2).await, Ok(1));
        assert_eq!(board.rank(1).await, Ok(2));
        assert_eq!(
            board.update_score(1, "-0.25".parse().unwrap()).await,
            Ok(Score::ZERO)
        );
        assert_eq!(board.ranked_len().await, Ok(1));
    }

    #[tokio::test]
    async fn seed_respects_delta_bound() {
        let board = Leaderboard::default();
        assert!(matches!(
            board.seed(1001).await,
            Err(LeaderboardError::SeedTooLarge { count: 1001, .. })
        ));
        assert_eq!(board.customer_count().await, Ok(0));
        board.seed(1000).await.unwrap();
        assert_eq!(board.ranked_len().await, Ok(1000));
        assert_eq!(board.rank(1000).await, Ok(1));
        assert_eq!(board.rank(1).await, Ok(1000));
    }

    #[tokio::test]
    async fn resharding_keeps_every_customer() {
        let board = Leaderboard::default();
        board.seed(200).await.unwrap();
        assert_eq!(board.shards().await.unwrap(), vec![0, 1, 2, 3]);

        let moved_in = board.add_shard(4).await.unwrap();
        assert!(moved_in > 0);
        assert_eq!(board.add_shard(4).await, Ok(0));

        let moved_out = board.remove_shard(1).await.unwrap();
        assert!(moved_out > 0);
        assert_eq!(board.shards().await.unwrap(), vec![0, 2, 3, 4]);

        assert_eq!(board.customer_count().await, Ok(200));
        for id in 1..=200 {
            assert_eq!(board.score(id).await, Ok(Some(points(id))));
        }
        assert_eq!(board.neighbors(100, 1, 1).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn last_shard_stays() {
        let mut config = LeaderboardConfig::default();
        config.shards.count = 1;
        let board = Leaderboard::new(&config).unwrap();
        assert_eq!(board.remove_shard(0).await, Err(LeaderboardError::LastShard(0)));
        assert_eq!(board.remove_shard(7).await, Ok(0));
    }

    #[tokio::test]
    async fn missing_ranked_key_aborts_update() {
        let mut board = Leaderboard::default();
        // Directory says ranked, ranking has never seen the customer.
        board.state.get_mut().directory.set(4, points(30));

        let err = board.update_score(4, points(5)).await.unwrap_err();
        assert_eq!(err, LeaderboardError::RankingOutOfSync(4));
        assert_eq!(board.score(4).await, Ok(Some(points(30))));
        assert_eq!(board.ranked_len().await, Ok(0));
    }

    #[tokio::test]
    async fn duplicate_ranked_key_aborts_update() {
        let mut board = Leaderboard::default();
        board.update_score(6, points(10)).await.unwrap();
        // A stray key already sitting where the update would land.
        board.state.get_mut().ranking.insert(OrderKey {
            score: points(15),
            customer_id: 6,
        });

        let err = board.update_score(6, points(5)).await.unwrap_err();
        assert_eq!(err, LeaderboardError::RankingOutOfSync(6));
        assert_eq!(board.score(6).await, Ok(Some(points(10))));

        // The old key was put back, so both keys are still present.
        let state = board.state.get_mut();
        assert!(state.ranking.find(&OrderKey { score: points(10), customer_id: 6 }).is_some());
        assert_eq!(state.ranking.len(), 2);
        state.ranking.check_invariants();
    }

    #[tokio::test]
    async fn fractional_scores_keep_full_precision() {
        let board = Leaderboard::default();
        board.update_score(1, "1.23456".parse().unwrap()).await.unwrap();
        board.update_score(2, "1.23455".parse().unwrap()).await.unwrap();
        assert_eq!(board.rank(1).await, Ok(1));
        assert_eq!(board.rank(2).await, Ok(2));
        assert_eq!(board.score(1).await.unwrap().unwrap().to_string(), "1.23456");
    }

    #[test]
    fn directory_owner_is_stable() {
        let directory = CustomerDirectory::new(8, 50);
        for id in 1..100 {
            assert_eq!(directory.owner(id), directory.owner(id));
        }
        assert!(directory.is_empty());
        assert_eq!(directory.shard_len(3), Some(0));
        assert_eq!(directory.shard_len(8), None);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = LeaderboardConfig::default();
        config.shards.count = 0;
        assert!(Leaderboard::new(&config).is_err());
    }
}
