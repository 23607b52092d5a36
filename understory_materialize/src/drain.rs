// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Affected-set drain in topological waves.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;

use crate::index::{DenseKey, DependencyIndex};
use crate::set::InvalidationSet;

/// Indicates whether a drain finished normally or stalled due to a cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DrainCompletion {
    /// All affected keys were yielded.
    Complete,
    /// The drain stalled: some keys kept unfinished producers (cycle).
    Stalled {
        /// Number of keys that could not be yielded.
        remaining: usize,
    },
}

/// Drains `pending` and yields every affected key, producers first.
///
/// The affected set is the pending keys plus everything that transitively
/// reads them through `index`. It is found breadth-first, which gives every
/// key a discovery rank: pending keys in marked order, then their consumers
/// in consumer-list order, and so on.
///
/// Keys are then yielded in waves (Kahn's algorithm, one generation at a
/// time). A wave holds every key whose producers inside the affected set were
/// all yielded by earlier waves, and is yielded in rank order. Within a
/// batch, a key is therefore never yielded before something it reads.
///
/// Self-edges are ignored. Keys on a cycle through other keys never become
/// ready. Once the iterator is exhausted,
/// [`completion`](DrainWaves::completion) reports them and
/// [`take_remaining`](DrainWaves::take_remaining) hands them back.
///
/// # Example
///
/// ```
/// use understory_materialize::{DependencyIndex, DrainCompletion, InvalidationSet, drain_affected};
///
/// let mut index = DependencyIndex::<u32>::new();
/// // 1 reads 2, 2 reads 3.
/// index.add_dependency(1, 2);
/// index.add_dependency(2, 3);
///
/// let mut pending = InvalidationSet::new();
/// pending.mark(1);
/// pending.mark(3);
///
/// let (order, completion) = drain_affected(&mut pending, &index).collect_with_completion();
/// assert_eq!(order, [3, 2, 1]);
/// assert_eq!(completion, DrainCompletion::Complete);
/// assert!(pending.is_empty());
/// ```
pub fn drain_affected<'a, K>(
    pending: &mut InvalidationSet<K>,
    index: &'a DependencyIndex<K>,
) -> DrainWaves<'a, K>
where
    K: DenseKey,
{
    let mut rank: HashMap<K, usize> = HashMap::with_capacity(pending.len());
    let mut affected: Vec<K> = Vec::with_capacity(pending.len());
    let mut queue: VecDeque<K> = VecDeque::with_capacity(pending.len());

    for key in pending.drain() {
        if let Entry::Vacant(e) = rank.entry(key) {
            e.insert(affected.len());
            affected.push(key);
            queue.push_back(key);
        }
    }
    while let Some(key) = queue.pop_front() {
        for &consumer in index.consumers(key) {
            if let Entry::Vacant(e) = rank.entry(consumer) {
                e.insert(affected.len());
                affected.push(consumer);
                queue.push_back(consumer);
            }
        }
    }

    // Count, for every affected key, its other producers that are affected
    // too. A key reading itself does not wait on itself.
    let mut in_degree: HashMap<K, usize> = HashMap::with_capacity(affected.len());
    for &key in &affected {
        let degree = index
            .producers(key)
            .iter()
            .filter(|&&producer| producer != key && rank.contains_key(&producer))
            .count();
        in_degree.insert(key, degree);
    }

    // `affected` is in rank order, so filtering keeps the first wave sorted.
    let wave: VecDeque<K> = affected
        .into_iter()
        .filter(|key| in_degree.get(key).is_some_and(|&degree| degree == 0))
        .collect();

    DrainWaves {
        index,
        rank,
        in_degree,
        wave,
        next: Vec::new(),
        stalled: false,
    }
}

/// Iterator returned by [`drain_affected`].
#[derive(Debug)]
pub struct DrainWaves<'a, K>
where
    K: DenseKey,
{
    index: &'a DependencyIndex<K>,
    /// Discovery rank of every affected key.
    rank: HashMap<K, usize>,
    /// Unfinished producers of every key not yet yielded.
    in_degree: HashMap<K, usize>,
    /// Current wave, in rank order.
    wave: VecDeque<K>,
    /// Keys that became ready during the current wave.
    next: Vec<K>,
    stalled: bool,
}

impl<K> DrainWaves<'_, K>
where
    K: DenseKey,
{
    /// Returns the number of keys not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.in_degree.len()
    }

    /// Returns `true` if the drain has stalled due to a cycle.
    ///
    /// This is only meaningful after the iterator has been exhausted.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Returns whether the drain completed or stalled due to a cycle.
    ///
    /// This is only meaningful after the iterator has been exhausted.
    #[must_use]
    pub fn completion(&self) -> DrainCompletion {
        if self.stalled {
            DrainCompletion::Stalled {
                remaining: self.remaining(),
            }
        } else {
            DrainCompletion::Complete
        }
    }

    /// Collects all yielded keys and returns completion status.
    #[must_use]
    pub fn collect_with_completion(mut self) -> (Vec<K>, DrainCompletion) {
        let mut out = Vec::with_capacity(self.in_degree.len());
        out.extend(&mut self);
        let completion = self.completion();
        (out, completion)
    }

    /// Takes the keys that were never yielded, in rank order.
    ///
    /// After a stalled drain these are the keys on reference cycles and
    /// everything downstream of them.
    pub fn take_remaining(&mut self) -> Vec<K> {
        let mut remaining: Vec<K> = self.in_degree.drain().map(|(key, _)| key).collect();
        remaining.sort_by_key(|key| self.rank.get(key).copied().unwrap_or(usize::MAX));
        self.wave.clear();
        self.next.clear();
        remaining
    }
}

impl<K> Iterator for DrainWaves<'_, K>
where
    K: DenseKey,
{
    type Item = K;

    fn next(&mut self) -> Option<K> {
        if self.wave.is_empty() {
            if self.next.is_empty() {
                self.stalled = !self.in_degree.is_empty();
                return None;
            }
            let rank = &self.rank;
            self.next
                .sort_by_key(|key| rank.get(key).copied().unwrap_or(usize::MAX));
            self.wave.extend(self.next.drain(..));
        }

        let key = self.wave.pop_front()?;
        self.in_degree.remove(&key);
        for consumer in self.index.consumers(key) {
            if let Some(degree) = self.in_degree.get_mut(consumer) {
                *degree -= 1;
                if *degree == 0 {
                    self.next.push(*consumer);
                }
            }
        }
        Some(key)
    }
}
