// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Invalidation set: pending entity keys in first-marked order.

use alloc::vec::Vec;
use core::hash::Hash;

use hashbrown::HashSet;

/// Deduplicated keys in the order they were first marked, with generation
/// tracking.
///
/// The generation counter increments on every mutation, so callers can tell
/// whether the set changed since they last looked.
///
/// # Example
///
/// ```
/// use understory_materialize::InvalidationSet;
///
/// let mut pending = InvalidationSet::<u32>::new();
/// pending.mark(3);
/// pending.mark(1);
/// pending.mark(3);
///
/// assert_eq!(pending.len(), 2);
/// let drained: Vec<_> = pending.drain().collect();
/// assert_eq!(drained, [3, 1]);
/// assert!(pending.is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct InvalidationSet<K>
where
    K: Copy + Eq + Hash,
{
    order: Vec<K>,
    members: HashSet<K>,
    generation: u64,
}

impl<K> Default for InvalidationSet<K>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> InvalidationSet<K>
where
    K: Copy + Eq + Hash,
{
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            members: HashSet::new(),
            generation: 0,
        }
    }

    /// Returns the current generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Marks `key`.
    ///
    /// Returns `true` if the key was newly inserted.
    pub fn mark(&mut self, key: K) -> bool {
        self.generation = self.generation.wrapping_add(1);
        let inserted = self.members.insert(key);
        if inserted {
            self.order.push(key);
        }
        inserted
    }

    /// Returns `true` if `key` is marked.
    #[must_use]
    pub fn contains(&self, key: K) -> bool {
        self.members.contains(&key)
    }

    /// Returns the number of marked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if nothing is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates over marked keys in first-marked order.
    pub fn iter(&self) -> impl Iterator<Item = K> + '_ {
        self.order.iter().copied()
    }

    /// Removes and returns every marked key, in first-marked order.
    pub fn drain(&mut self) -> impl Iterator<Item = K> + '_ {
        self.generation = self.generation.wrapping_add(1);
        self.members.clear();
        self.order.drain(..)
    }

    /// Unmarks every key.
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.members.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_is_deduplicated_and_ordered() {
        let mut set = InvalidationSet::<u32>::new();
        assert!(set.mark(5));
        assert!(set.mark(2));
        assert!(!set.mark(5));
        assert!(set.contains(2));
        assert!(!set.contains(7));
        assert_eq!(set.iter().collect::<Vec<_>>(), [5, 2]);
    }

    #[test]
    fn generation_moves_on_every_mutation() {
        let mut set = InvalidationSet::<u32>::new();
        let g0 = set.generation();
        set.mark(1);
        let g1 = set.generation();
        assert_ne!(g0, g1);
        set.mark(1);
        assert_ne!(set.generation(), g1);
        let g2 = set.generation();
        set.clear();
        assert_ne!(set.generation(), g2);
        assert!(set.is_empty());
    }

    #[test]
    fn drain_empties_the_set() {
        let mut set = InvalidationSet::<u32>::new();
        set.mark(1);
        set.mark(2);
        assert_eq!(set.drain().count(), 2);
        assert!(set.is_empty());
        assert!(!set.contains(1));
        assert!(set.mark(1));
    }
}
