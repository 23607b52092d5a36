// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use alloc::vec::Vec;

use crate::path::Path;

/// Rejected [`MaterializerOptions`](crate::MaterializerOptions).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Entities must be at least one key deep.
    #[error("entity depth must be at least 1")]
    ZeroDepth,
}

/// A flush could not order some entities because their references form a
/// cycle.
///
/// Only returned under [`CycleHandling::Error`](crate::CycleHandling::Error).
/// Everything else in the batch was still rebuilt, and the pending set is
/// cleared.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("reference cycle left {} entities unresolved", .remaining.len())]
pub struct CycleError {
    /// Entities that kept their previous materialized value, in discovery
    /// order. Includes entities downstream of the cycle.
    pub remaining: Vec<Path>,
    /// The observed entities that were rebuilt, as `flush` would have
    /// returned them.
    pub invalidated: Vec<Path>,
}
