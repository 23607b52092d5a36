// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Materializer configuration.

use alloc::string::String;
use alloc::vec::Vec;

/// What a flush does when references form a cycle.
///
/// Entities on a reference cycle (including an entity that references
/// itself) can never be rebuilt after all of their producers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum CycleHandling {
    /// Leave the stalled entities with their previous materialized values and
    /// return a [`CycleError`](crate::CycleError) naming them.
    #[default]
    Error,
    /// Rebuild the stalled entities once each, in discovery order, reading
    /// whatever their producers currently hold. A warning is logged.
    Resolve,
}

/// Options for [`Materializer::new`](crate::Materializer::new).
///
/// # Example
///
/// ```
/// use understory_materialize::{CycleHandling, MaterializerOptions};
///
/// let options = MaterializerOptions::new(2)
///     .observe("comps")
///     .observe("props")
///     .with_cycle_handling(CycleHandling::Resolve);
///
/// assert_eq!(options.depth, 2);
/// assert!(options.is_observed("comps"));
/// assert!(!options.is_observed("links"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct MaterializerOptions {
    /// Number of keys from the root to an entity. Must be at least 1.
    pub depth: usize,
    /// Top-level keys whose entities are reported by `flush`.
    ///
    /// Entities under other roots are still materialized; they are only left
    /// out of the returned lists.
    #[cfg_attr(feature = "serde", serde(default))]
    pub observed_roots: Vec<String>,
    /// Cycle policy.
    #[cfg_attr(feature = "serde", serde(default))]
    pub cycle_handling: CycleHandling,
}

impl MaterializerOptions {
    /// Creates options for entities `depth` keys deep, observing no roots.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            observed_roots: Vec::new(),
            cycle_handling: CycleHandling::default(),
        }
    }

    /// Adds `root` to the observed roots.
    #[must_use]
    pub fn observe(mut self, root: impl Into<String>) -> Self {
        let root = root.into();
        if !self.observed_roots.contains(&root) {
            self.observed_roots.push(root);
        }
        self
    }

    /// Sets the cycle policy.
    #[must_use]
    pub fn with_cycle_handling(mut self, cycle_handling: CycleHandling) -> Self {
        self.cycle_handling = cycle_handling;
        self
    }

    /// Returns `true` if entities under `root` are reported.
    #[must_use]
    pub fn is_observed(&self, root: &str) -> bool {
        self.observed_roots.iter().any(|observed| observed == root)
    }
}
