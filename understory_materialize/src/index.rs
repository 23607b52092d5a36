// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency index: producer → consumer edges between entities.

use alloc::vec::Vec;
use core::hash::Hash;

/// Keys that map onto a dense `usize` index.
///
/// The dependency index stores adjacency in vectors indexed by key, so keys
/// should be small and allocated densely (interned ids, arena indices).
pub trait DenseKey: Copy + Eq + Hash {
    /// Returns the dense index of this key.
    fn index(self) -> usize;
}

impl DenseKey for u32 {
    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

impl DenseKey for usize {
    #[inline]
    fn index(self) -> usize {
        self
    }
}

/// Reverse-edge index: which consumers read which producers.
///
/// Edges are stored in both directions, so "who reads `p`?" and "what does
/// `c` read?" are both O(1) lookups. Consumer lists keep the order in which
/// edges were added; invalidation order depends on it.
///
/// Cycles, including self-edges, are accepted. They are detected when the
/// affected set is drained (see [`drain_affected`](crate::drain_affected)).
///
/// # Example
///
/// ```
/// use understory_materialize::DependencyIndex;
///
/// let mut index = DependencyIndex::<u32>::new();
/// // 2 reads 1, 3 reads 1 and 2.
/// index.add_dependency(2, 1);
/// index.replace_dependencies(3, [1, 2]);
///
/// assert_eq!(index.consumers(1), &[2, 3]);
/// assert_eq!(index.producers(3), &[1, 2]);
///
/// // 3 stops reading 1.
/// index.replace_dependencies(3, [2]);
/// assert_eq!(index.consumers(1), &[2]);
/// assert_eq!(index.edge_count(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct DependencyIndex<K>
where
    K: DenseKey,
{
    /// producers[c.index()]: keys that `c` reads.
    producers: Vec<Vec<K>>,
    /// consumers[p.index()]: keys that read `p`, in insertion order.
    consumers: Vec<Vec<K>>,
    edges: usize,
}

impl<K> Default for DependencyIndex<K>
where
    K: DenseKey,
{
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn grow<T: Default>(vec: &mut Vec<T>, idx: usize) {
    if idx >= vec.len() {
        vec.resize_with(idx + 1, T::default);
    }
}

#[inline]
fn remove_ordered<K: PartialEq>(list: &mut Vec<K>, key: K) -> bool {
    match list.iter().position(|k| *k == key) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}

impl<K> DependencyIndex<K>
where
    K: DenseKey,
{
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            producers: Vec::new(),
            consumers: Vec::new(),
            edges: 0,
        }
    }

    /// Returns `true` if the index has no edges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges == 0
    }

    /// Returns the number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges
    }

    /// Records that `consumer` reads `producer`.
    ///
    /// Returns `false` if the edge already existed.
    pub fn add_dependency(&mut self, consumer: K, producer: K) -> bool {
        let (c, p) = (consumer.index(), producer.index());
        grow(&mut self.producers, c);
        if self.producers[c].contains(&producer) {
            return false;
        }
        self.producers[c].push(producer);
        grow(&mut self.consumers, p);
        self.consumers[p].push(consumer);
        self.edges += 1;
        true
    }

    /// Removes the edge `consumer` reads `producer`.
    ///
    /// Returns `true` if the edge existed.
    pub fn remove_dependency(&mut self, consumer: K, producer: K) -> bool {
        let Some(reads) = self.producers.get_mut(consumer.index()) else {
            return false;
        };
        if !remove_ordered(reads, producer) {
            return false;
        }
        if let Some(readers) = self.consumers.get_mut(producer.index()) {
            remove_ordered(readers, consumer);
        }
        self.edges -= 1;
        true
    }

    /// Replaces everything `consumer` reads with `producers`.
    ///
    /// Stale edges are removed before new ones are added; edges present in
    /// both sets are left in place (and keep their position in the consumer
    /// lists). Duplicates in `producers` are ignored.
    ///
    /// Returns `true` if the edge set changed.
    pub fn replace_dependencies(
        &mut self,
        consumer: K,
        producers: impl IntoIterator<Item = K>,
    ) -> bool {
        let mut new_set: Vec<K> = Vec::new();
        for k in producers {
            if !new_set.contains(&k) {
                new_set.push(k);
            }
        }

        let old = self.producers(consumer);
        let stale: Vec<K> = old.iter().copied().filter(|k| !new_set.contains(k)).collect();
        let fresh: Vec<K> = new_set.iter().copied().filter(|k| !old.contains(k)).collect();
        if stale.is_empty() && fresh.is_empty() {
            return false;
        }

        for producer in stale {
            self.remove_dependency(consumer, producer);
        }
        for producer in fresh {
            self.add_dependency(consumer, producer);
        }
        true
    }

    /// Removes every edge where `consumer` is the reader.
    ///
    /// Edges where `consumer` is the producer stay: whoever reads it keeps
    /// depending on its path and is invalidated when it comes back.
    pub fn remove_consumer(&mut self, consumer: K) {
        let Some(reads) = self.producers.get_mut(consumer.index()) else {
            return;
        };
        let reads = core::mem::take(reads);
        self.edges -= reads.len();
        for producer in reads {
            if let Some(readers) = self.consumers.get_mut(producer.index()) {
                remove_ordered(readers, consumer);
            }
        }
    }

    /// Returns the keys that read `producer`, in insertion order.
    #[must_use]
    pub fn consumers(&self, producer: K) -> &[K] {
        self.consumers
            .get(producer.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns the keys that `consumer` reads.
    #[must_use]
    pub fn producers(&self, consumer: K) -> &[K] {
        self.producers
            .get(consumer.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Returns `true` if anything reads `producer`.
    #[must_use]
    pub fn has_consumers(&self, producer: K) -> bool {
        !self.consumers(producer).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_deduplicated() {
        let mut index = DependencyIndex::<u32>::new();
        assert!(index.add_dependency(2, 1));
        assert!(!index.add_dependency(2, 1));
        assert_eq!(index.edge_count(), 1);
        assert!(index.has_consumers(1));
        assert!(!index.has_consumers(2));
    }

    #[test]
    fn removal_keeps_consumer_order() {
        let mut index = DependencyIndex::<u32>::new();
        for consumer in [5, 3, 7, 4] {
            index.add_dependency(consumer, 0);
        }
        assert!(index.remove_dependency(3, 0));
        assert!(!index.remove_dependency(3, 0));
        assert_eq!(index.consumers(0), &[5, 7, 4]);
    }

    #[test]
    fn replace_leaves_unchanged_edges_alone() {
        let mut index = DependencyIndex::<u32>::new();
        index.add_dependency(9, 1);
        index.add_dependency(8, 1);
        assert!(index.replace_dependencies(9, [1, 2, 2]));
        // 9 was not re-added to 1's consumers, so it stays first.
        assert_eq!(index.consumers(1), &[9, 8]);
        assert_eq!(index.producers(9), &[1, 2]);
        assert!(!index.replace_dependencies(9, [2, 1]));
    }

    #[test]
    fn remove_consumer_drops_outgoing_reads_only() {
        let mut index = DependencyIndex::<u32>::new();
        index.add_dependency(2, 1);
        index.add_dependency(2, 0);
        index.add_dependency(3, 2);
        index.remove_consumer(2);

        assert!(index.producers(2).is_empty());
        assert!(!index.has_consumers(1));
        assert_eq!(index.consumers(2), &[3]);
        assert_eq!(index.edge_count(), 1);
    }

    #[test]
    fn self_edges_are_allowed() {
        let mut index = DependencyIndex::<u32>::new();
        assert!(index.add_dependency(4, 4));
        assert_eq!(index.consumers(4), &[4]);
        index.remove_consumer(4);
        assert!(index.is_empty());
    }

    #[test]
    fn unknown_keys_are_empty() {
        let index = DependencyIndex::<usize>::default();
        assert!(index.consumers(100).is_empty());
        assert!(index.producers(100).is_empty());
    }
}
