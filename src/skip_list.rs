// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! Rank-Augmented Skip List
//!
//! An ordered skip list over comparator-ordered keys that answers positional
//! rank queries in O(log n) by keeping a span counter on every forward link.
//!
//! # Span Semantics
//!
//! Ranks are 1-based. Head has rank 0 and Tail has rank `len + 1`. For every
//! node `x` at level `L` whose forward link points at `y`:
//!
//! - `x.span[L] = rank(y) - rank(x)`
//!
//! so summing spans while descending from Head yields the rank of the node
//! the search stops at, without touching the base level.
//!
//! # Operations
//!
//! - `insert(value)`: O(log n) expected
//! - `remove(&value)`: O(log n) expected, absence is not an error
//! - `find(&value)`: O(log n)
//! - `rank(&value)`: O(log n), `Ok(rank)` or `Err(insertion rank)`
//! - `node_at_rank(rank)`: O(log n)
//! - `prev(node)` / `next(node)`: O(1) base-level neighbor steps
//! - `iter()`: lazy ascending walk along level 0
//!
//! # Structure
//!
//! Nodes live in an arena and link to each other by index. Level 0 is doubly
//! linked (forward `next[0]` plus a single `prev`); upper levels are forward
//! only.
//!
//! ```text
//! Level 2: HEAD -------------(3)------------> C ---------(2)---------> TAIL
//! Level 1: HEAD ----(1)----> A ----(2)-----> C ----(1)----> D -(1)-> TAIL
//! Level 0: HEAD -(1)-> A -(1)-> B -(1)-> C -(1)-> D -(1)-> TAIL
//!                     <-      <-      <-      <-       <-
//! ```
//!
//! # Preconditions
//!
//! The comparator must be a strict total order that gives the same answer
//! for the same pair on every call. A comparator that violates this corrupts
//! the span bookkeeping without any runtime check catching it.

use std::cmp::Ordering;
use std::fmt;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Deserialize;
use smallvec::SmallVec;
use smallvec::smallvec;

/// Hard ceiling on configurable heights; sizes the search path buffers.
pub const LEVEL_CAP: usize = 64;

/// Default maximum height. 32 levels at p = 0.5 covers billions of keys.
pub const DEFAULT_MAX_LEVEL: usize = 32;

/// Default promotion probability for each extra level.
pub const DEFAULT_PROBABILITY: f64 = 0.5;

/// Node index type. u32 saves space vs usize on 64-bit.
type Idx = u32;

const HEAD: Idx = 0;
const TAIL: Idx = 1;

/// Three-way comparison used to order skip list keys.
pub trait Comparator<T> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Orders keys by their `Ord` implementation.
#[derive(Clone, Copy, Debug, Default)]
pub struct NaturalOrder;

impl<T: Ord> Comparator<T> for NaturalOrder {
    fn compare(&self, a: &T, b: &T) -> Ordering {
        return a.cmp(b);
    }
}

impl<T, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, a: &T, b: &T) -> Ordering {
        return self(a, b);
    }
}

/// Tuning knobs for level generation.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SkipListOptions {
    /// Maximum number of levels a node may occupy (1..=64).
    pub max_level: usize,
    /// Chance that a node is promoted one more level.
    pub probability: f64,
    /// Fixed seed for the level generator. Random when absent.
    pub seed: Option<u64>,
}

impl Default for SkipListOptions {
    fn default() -> Self {
        return SkipListOptions {
            max_level: DEFAULT_MAX_LEVEL,
            probability: DEFAULT_PROBABILITY,
            seed: None,
        };
    }
}

/// A handle to a live node.
///
/// Handles stay valid until the next insert or remove on the list that
/// produced them; after that they may point at a recycled slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef(Idx);

/// A node in the skip list. Head and Tail carry no value.
struct Node<T> {
    value: Option<T>,
    /// Forward links, one per level this node participates in.
    next: SmallVec<[Idx; 4]>,
    /// Base-level distance covered by each forward link.
    span: SmallVec<[usize; 4]>,
    /// Base-level backward link.
    prev: Idx,
}

impl<T> Node<T> {
    fn sentinel(levels: usize, next: Idx) -> Self {
        Node {
            value: None,
            next: smallvec![next; levels],
            span: smallvec![1; levels],
            prev: HEAD,
        }
    }

    fn height(&self) -> usize {
        self.next.len()
    }
}

/// A skip list that knows the rank of every key.
pub struct RankedSkipList<T, C = NaturalOrder> {
    /// Arena of nodes. Slots 0 and 1 are Head and Tail.
    nodes: Vec<Node<T>>,
    /// Free list for reusing removed node slots.
    free_list: Vec<Idx>,
    comparator: C,
    /// Number of levels currently in use (at least 1).
    level: usize,
    max_level: usize,
    probability: f64,
    len: usize,
    rng: SmallRng,
}

impl<T: Ord> RankedSkipList<T, NaturalOrder> {
    /// An empty list ordered by `T: Ord`.
    pub fn new() -> Self {
        Self::with_comparator(NaturalOrder)
    }
}

impl<T: Ord> Default for RankedSkipList<T, NaturalOrder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Comparator<T>> RankedSkipList<T, C> {
    /// An empty list ordered by `comparator`, with default options.
    pub fn with_comparator(comparator: C) -> Self {
        Self::with_options(comparator, &SkipListOptions::default())
    }

    /// An empty list with explicit level tuning.
    ///
    /// Panics if `max_level` is outside `1..=64` or `probability` is not in
    /// `[0, 1)`.
    pub fn with_options(comparator: C, options: &SkipListOptions) -> Self {
        assert!(
            (1..=LEVEL_CAP).contains(&options.max_level),
            "max_level {} outside 1..={}",
            options.max_level,
            LEVEL_CAP
        );
        assert!(
            (0.0..1.0).contains(&options.probability),
            "probability {} outside [0, 1)",
            options.probability
        );

        let rng = match options.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let mut list = RankedSkipList {
            nodes: Vec::new(),
            free_list: Vec::new(),
            comparator,
            level: 1,
            max_level: options.max_level,
            probability: options.probability,
            len: 0,
            rng,
        };
        list.nodes.push(Node::sentinel(options.max_level, TAIL));
        list.nodes.push(Node::sentinel(options.max_level, TAIL));
        list
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of levels currently in use.
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// Drop every element, keeping the options and generator state.
    pub fn clear(&mut self) {
        self.nodes.truncate(2);
        self.free_list.clear();
        self.nodes[HEAD as usize] = Node::sentinel(self.max_level, TAIL);
        self.nodes[TAIL as usize] = Node::sentinel(self.max_level, TAIL);
        self.level = 1;
        self.len = 0;
    }

    // --- Node access helpers ---

    fn node(&self, idx: Idx) -> &Node<T> {
        &self.nodes[idx as usize]
    }

    fn node_mut(&mut self, idx: Idx) -> &mut Node<T> {
        &mut self.nodes[idx as usize]
    }

    /// Value of a data node. Only called on indices reached by traversal.
    fn key(&self, idx: Idx) -> &T {
        match &self.node(idx).value {
            Some(value) => value,
            None => unreachable!("sentinel {} has no key", idx),
        }
    }

    /// Whether the base-level successor of `idx` sorts strictly before `value`.
    fn next_precedes(&self, idx: Idx, level: usize, value: &T) -> Option<Idx> {
        let next = self.node(idx).next[level];
        if next != TAIL && self.comparator.compare(self.key(next), value) == Ordering::Less {
            Some(next)
        } else {
            None
        }
    }

    fn alloc_node(&mut self, height: usize, value: T) -> Idx {
        if let Some(idx) = self.free_list.pop() {
            let node = self.node_mut(idx);
            node.value = Some(value);
            node.next = smallvec![TAIL; height];
            node.span = smallvec![1; height];
            node.prev = HEAD;
            idx
        } else {
            let idx = self.nodes.len() as Idx;
            self.nodes.push(Node {
                value: Some(value),
                next: smallvec![TAIL; height],
                span: smallvec![1; height],
                prev: HEAD,
            });
            idx
        }
    }

    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < self.max_level && self.rng.gen_bool(self.probability) {
            level += 1;
        }
        level
    }

    // --- Core operations ---

    /// Insert `value`. Returns false, leaving the list unchanged, when an
    /// equal key is already present.
    pub fn insert(&mut self, value: T) -> bool {
        let mut update = [HEAD; LEVEL_CAP];
        let mut rank = [0usize; LEVEL_CAP];
        let mut idx = HEAD;

        for level in (0..self.level).rev() {
            rank[level] = if level == self.level - 1 { 0 } else { rank[level + 1] };
            while let Some(next) = self.next_precedes(idx, level, &value) {
                rank[level] += self.node(idx).span[level];
                idx = next;
            }
            update[level] = idx;
        }

        let candidate = self.node(idx).next[0];
        if candidate != TAIL
            && self.comparator.compare(self.key(candidate), &value) == Ordering::Equal
        {
            return false;
        }

        let height = self.random_level();
        if height > self.level {
            // Newly opened levels run straight from Head to Tail.
            for level in self.level..height {
                rank[level] = 0;
                update[level] = HEAD;
                self.node_mut(HEAD).span[level] = self.len + 1;
            }
            self.level = height;
        }

        let new_idx = self.alloc_node(height, value);
        for level in 0..height {
            let pred_idx = update[level];
            let offset = rank[0] - rank[level];
            let pred_next = self.node(pred_idx).next[level];
            let pred_span = self.node(pred_idx).span[level];

            let node = self.node_mut(new_idx);
            node.next[level] = pred_next;
            node.span[level] = pred_span - offset;

            let pred = self.node_mut(pred_idx);
            pred.next[level] = new_idx;
            pred.span[level] = offset + 1;
        }

        // One more node now sits under every taller skip on the path.
        for level in height..self.level {
            self.node_mut(update[level]).span[level] += 1;
        }

        let succ = self.node(new_idx).next[0];
        self.node_mut(new_idx).prev = update[0];
        self.node_mut(succ).prev = new_idx;

        self.len += 1;
        true
    }

    /// Remove the node equal to `value`. Returns whether one was found.
    pub fn remove(&mut self, value: &T) -> bool {
        let mut update = [HEAD; LEVEL_CAP];
        let mut idx = HEAD;

        for level in (0..self.level).rev() {
            while let Some(next) = self.next_precedes(idx, level, value) {
                idx = next;
            }
            update[level] = idx;
        }

        let target = self.node(idx).next[0];
        if target == TAIL || self.comparator.compare(self.key(target), value) != Ordering::Equal {
            return false;
        }

        for level in 0..self.level {
            let pred_idx = update[level];
            if self.node(pred_idx).next[level] == target {
                let target_next = self.node(target).next[level];
                let target_span = self.node(target).span[level];
                let pred = self.node_mut(pred_idx);
                pred.next[level] = target_next;
                pred.span[level] += target_span - 1;
            } else {
                self.node_mut(pred_idx).span[level] -= 1;
            }
        }

        let succ = self.node(target).next[0];
        let pred = self.node(target).prev;
        self.node_mut(succ).prev = pred;

        while self.level > 1 && self.node(HEAD).next[self.level - 1] == TAIL {
            self.level -= 1;
        }

        let node = self.node_mut(target);
        node.value = None;
        node.next.clear();
        node.span.clear();
        self.free_list.push(target);

        self.len -= 1;
        true
    }

    /// Locate the node holding a key equal to `value`.
    pub fn find(&self, value: &T) -> Option<NodeRef> {
        let mut idx = HEAD;
        for level in (0..self.level).rev() {
            while let Some(next) = self.next_precedes(idx, level, value) {
                idx = next;
            }
        }

        let candidate = self.node(idx).next[0];
        if candidate != TAIL
            && self.comparator.compare(self.key(candidate), value) == Ordering::Equal
        {
            Some(NodeRef(candidate))
        } else {
            None
        }
    }

    /// 1-based rank of `value`.
    ///
    /// `Ok(rank)` when present, otherwise `Err(rank)` with the rank `value`
    /// would occupy if it were inserted now.
    pub fn rank(&self, value: &T) -> Result<usize, usize> {
        let mut idx = HEAD;
        let mut rank = 0usize;
        for level in (0..self.level).rev() {
            while let Some(next) = self.next_precedes(idx, level, value) {
                rank += self.node(idx).span[level];
                idx = next;
            }
        }

        let candidate = self.node(idx).next[0];
        if candidate != TAIL
            && self.comparator.compare(self.key(candidate), value) == Ordering::Equal
        {
            Ok(rank + 1)
        } else {
            Err(rank + 1)
        }
    }

    /// The node at 1-based `rank`, found by descending along spans.
    pub fn node_at_rank(&self, rank: usize) -> Option<NodeRef> {
        if rank == 0 || rank > self.len {
            return None;
        }

        let mut idx = HEAD;
        let mut traversed = 0usize;
        for level in (0..self.level).rev() {
            loop {
                let node = self.node(idx);
                let next = node.next[level];
                if next == TAIL || traversed + node.span[level] > rank {
                    break;
                }
                traversed += node.span[level];
                idx = next;
            }
            if traversed == rank {
                return Some(NodeRef(idx));
            }
        }
        None
    }

    /// The value behind a handle, or None if the slot has been freed.
    pub fn get(&self, node: NodeRef) -> Option<&T> {
        self.nodes.get(node.0 as usize).and_then(|n| n.value.as_ref())
    }

    /// The base-level successor, stopping at Tail.
    pub fn next(&self, node: NodeRef) -> Option<NodeRef> {
        let next = *self.node(node.0).next.first()?;
        if next == TAIL { None } else { Some(NodeRef(next)) }
    }

    /// The base-level predecessor, stopping at Head.
    pub fn prev(&self, node: NodeRef) -> Option<NodeRef> {
        let prev = self.node(node.0).prev;
        if prev == HEAD { None } else { Some(NodeRef(prev)) }
    }

    pub fn first(&self) -> Option<NodeRef> {
        let first = self.node(HEAD).next[0];
        if first == TAIL { None } else { Some(NodeRef(first)) }
    }

    pub fn last(&self) -> Option<NodeRef> {
        let last = self.node(TAIL).prev;
        if last == HEAD { None } else { Some(NodeRef(last)) }
    }

    /// Iterate over all values in ascending order.
    pub fn iter(&self) -> Iter<'_, T, C> {
        Iter {
            list: self,
            current: self.node(HEAD).next[0],
        }
    }

    /// Iterate in ascending order starting at 1-based `rank`.
    pub fn iter_from_rank(&self, rank: usize) -> Iter<'_, T, C> {
        let current = match self.node_at_rank(rank) {
            Some(NodeRef(idx)) => idx,
            None => TAIL,
        };
        Iter { list: self, current }
    }

    // --- Invariant checking ---

    /// Audit every structural invariant, panicking on the first violation.
    ///
    /// O(n * level). Meant for tests.
    pub fn check_invariants(&self) {
        assert!(
            (1..=self.max_level).contains(&self.level),
            "INVARIANT VIOLATED: level {} outside 1..={}",
            self.level,
            self.max_level
        );

        // Base level: ordering, back links, positions.
        let mut position = vec![usize::MAX; self.nodes.len()];
        position[HEAD as usize] = 0;
        let mut prev = HEAD;
        let mut idx = self.node(HEAD).next[0];
        let mut count = 0usize;
        while idx != TAIL {
            count += 1;
            assert!(
                count <= self.len,
                "INVARIANT VIOLATED: more than len()={} nodes on level 0",
                self.len
            );
            assert_eq!(
                self.node(idx).prev, prev,
                "INVARIANT VIOLATED: prev link of node at position {} is wrong",
                count
            );
            if prev != HEAD {
                assert_eq!(
                    self.comparator.compare(self.key(prev), self.key(idx)),
                    Ordering::Less,
                    "INVARIANT VIOLATED: level 0 not strictly ascending at position {}",
                    count
                );
            }
            position[idx as usize] = count;
            prev = idx;
            idx = self.node(idx).next[0];
        }
        assert_eq!(
            count, self.len,
            "INVARIANT VIOLATED: level 0 count={} != len()={}",
            count, self.len
        );
        assert_eq!(
            self.node(TAIL).prev, prev,
            "INVARIANT VIOLATED: Tail.prev does not point at the last node"
        );
        position[TAIL as usize] = self.len + 1;

        // Upper levels: spans equal rank distance and links only skip forward.
        for level in 0..self.level {
            let mut idx = HEAD;
            while idx != TAIL {
                let node = self.node(idx);
                assert!(
                    level < node.height(),
                    "INVARIANT VIOLATED: node reached on level {} with height {}",
                    level,
                    node.height()
                );
                let next = node.next[level];
                let from = position[idx as usize];
                let to = position[next as usize];
                assert!(
                    to != usize::MAX && to > from,
                    "INVARIANT VIOLATED: level {} link from rank {} is not forward",
                    level,
                    from
                );
                assert_eq!(
                    node.span[level],
                    to - from,
                    "INVARIANT VIOLATED: span at level {} from rank {}",
                    level,
                    from
                );
                idx = next;
            }
        }

        if self.level > 1 {
            assert_ne!(
                self.node(HEAD).next[self.level - 1],
                TAIL,
                "INVARIANT VIOLATED: top level {} is empty",
                self.level
            );
        }

        // Rank lookups agree with positions.
        for (expected, value) in self.iter().enumerate() {
            assert_eq!(
                self.rank(value),
                Ok(expected + 1),
                "INVARIANT VIOLATED: rank() disagrees with position {}",
                expected + 1
            );
        }
    }
}

impl<T, C> fmt::Debug for RankedSkipList<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankedSkipList")
            .field("len", &self.len)
            .field("level", &self.level)
            .field("max_level", &self.max_level)
            .field("probability", &self.probability)
            .finish()
    }
}

/// Ascending iterator over a [`RankedSkipList`].
pub struct Iter<'a, T, C> {
    list: &'a RankedSkipList<T, C>,
    current: Idx,
}

impl<'a, T, C> Iterator for Iter<'a, T, C> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == TAIL {
            return None;
        }

        let node = &self.list.nodes[self.current as usize];
        self.current = node.next[0];
        node.value.as_ref()
    }
}

impl<'a, T, C: Comparator<T>> IntoIterator for &'a RankedSkipList<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
