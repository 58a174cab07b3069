// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! Consistent hash ring.
//!
//! Each shard is placed on a u64 ring at `replicas` positions, one per
//! virtual replica, at `blake3(shard ++ replica_index)`. A key belongs to the
//! shard at the first position at or after the key's hash, wrapping around
//! past the largest position. Adding or removing a shard only moves the keys
//! whose successor position changed.

use std::collections::BTreeMap;
use std::fmt::Display;

use tracing::debug;

/// Default virtual replicas per shard.
pub const DEFAULT_REPLICAS: u32 = 100;

/// Maps keys to shards with minimal remapping on membership changes.
#[derive(Debug, Clone)]
pub struct HashRing<S> {
    /// Ring position -> owning shard.
    positions: BTreeMap<u64, S>,
    /// Shards currently on the ring, in insertion order.
    shards: Vec<S>,
    replicas: u32,
}

impl<S: Clone + Eq + Display> HashRing<S> {
    /// An empty ring placing each shard at `replicas` positions.
    pub fn new(replicas: u32) -> Self {
        HashRing {
            positions: BTreeMap::new(),
            shards: Vec::new(),
            replicas: replicas.max(1),
        }
    }

    /// Place `shard` on the ring. Re-adding a present shard is a no-op.
    ///
    /// Colliding positions are overwritten: the last shard added wins.
    pub fn add(&mut self, shard: S) {
        if self.contains(&shard) {
            return;
        }
        for replica in 0..self.replicas {
            self.positions.insert(position(&shard, replica), shard.clone());
        }
        debug!(%shard, replicas = self.replicas, "added shard to ring");
        self.shards.push(shard);
    }

    /// Take `shard` off the ring. Returns whether it was present.
    pub fn remove(&mut self, shard: &S) -> bool {
        let Some(index) = self.shards.iter().position(|s| s == shard) else {
            return false;
        };
        self.shards.remove(index);
        for replica in 0..self.replicas {
            let pos = position(shard, replica);
            // Leave positions a later shard overwrote alone.
            if self.positions.get(&pos) == Some(shard) {
                self.positions.remove(&pos);
            }
        }
        debug!(%shard, "removed shard from ring");
        true
    }

    /// The shard owning `key`, or None when the ring is empty.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&S> {
        let hash = hash_u64(key.as_ref());
        self.positions
            .range(hash..)
            .next()
            .or_else(|| self.positions.iter().next())
            .map(|(_, shard)| shard)
    }

    pub fn contains(&self, shard: &S) -> bool {
        self.shards.contains(shard)
    }

    /// Shards on the ring, in the order they were added.
    pub fn shards(&self) -> &[S] {
        &self.shards
    }

    /// Number of shards.
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Number of occupied ring positions (less than `len * replicas` only
    /// when positions collided).
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn replicas(&self) -> u32 {
        self.replicas
    }
}

/// Ring position of one virtual replica of `shard`.
fn position<S: Display>(shard: &S, replica: u32) -> u64 {
    let label = shard.to_string();
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(label.len() as u64).to_le_bytes());
    hasher.update(label.as_bytes());
    hasher.update(&replica.to_le_bytes());
    truncate(hasher.finalize())
}

/// blake3 of `bytes`, truncated to its first 8 bytes.
fn hash_u64(bytes: &[u8]) -> u64 {
    truncate(blake3::hash(bytes))
}

fn truncate(hash: blake3::Hash) -> u64 {
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(head)
}
