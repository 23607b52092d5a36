// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Materialize: incremental, reference-resolving materialization
//! of JSON-like documents.
//!
//! A document is fed in partial updates (*fragments*). Some of its values are
//! references to other places in the document. This crate keeps the merged
//! raw document (the *template*) and a second, *materialized* document in
//! which every reference is replaced by the value it points at, and on every
//! update recomputes only what went stale.
//!
//! - **Values** ([`Value`], [`Mapping`], [`Opaque`]): the JSON-like tree.
//!   Containers are reference counted, so unchanged parts keep their identity
//!   ([`Value::same`]) across updates.
//! - **Paths** ([`Path`], [`PathKey`]): key sequences into a document.
//! - **References** ([`Reference`], [`canonicalize`], [`infer_schema`]): the
//!   `"$a.b"` string form and the `{ "$type": "ref", "refPath": .. }` tagged
//!   form, and the [`Schema`] trees marking where references sit.
//! - **Dependency tracking** ([`DependencyIndex`], [`InvalidationSet`],
//!   [`drain_affected`]): reverse edges between entities, the pending set,
//!   and the wave-ordered drain of everything a change affects.
//! - **The materializer** ([`Materializer`]): batched updates, deferred
//!   flushes and point lookups on top of the above.
//!
//! ## Entities
//!
//! The document is cut into *entities*: the subtrees exactly
//! [`depth`](MaterializerOptions::depth) keys below the root. Entities are the
//! unit of change tracking. A fragment value at entity depth merges shallowly
//! into the existing entity when both are mappings, and replaces it
//! otherwise. [`Value::Absent`] removes whatever it covers.
//!
//! A reference anywhere inside entity `C` that points into entity `R` makes
//! `C` a consumer of `R`: whenever `R` is rebuilt, so is `C`, after `R`.
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use understory_materialize::{Materializer, MaterializerOptions, Path, Value};
//!
//! let mut m = Materializer::new(MaterializerOptions::new(2).observe("comps")).unwrap();
//!
//! // The link target is not there yet: the key is left out.
//! let out = m
//!     .update(
//!         &Value::from(json!({ "comps": { "comp1": { "props": { "link": "$links.link1" } } } })),
//!         None,
//!     )
//!     .unwrap();
//! assert_eq!(out, [Path::from("comps.comp1")]);
//! assert_eq!(m.get("comps.comp1.props.link"), None);
//!
//! // Once it arrives, its consumers are rebuilt and reported.
//! let out = m
//!     .update(&Value::from(json!({ "links": { "link1": { "href": "X" } } })), None)
//!     .unwrap();
//! assert_eq!(out, [Path::from("comps.comp1")]);
//! assert_eq!(
//!     m.get("comps.comp1.props.link.href"),
//!     Some(&Value::from("X"))
//! );
//! ```
//!
//! ## Batching
//!
//! [`Materializer::update_without_flush`] merges a fragment without
//! rebuilding anything; [`Materializer::flush`] later rebuilds everything the
//! batch affected, once. [`Materializer::update`] is both in one call.
//!
//! ## Reference cycles
//!
//! Entities whose references loop back on themselves cannot be ordered.
//! [`CycleHandling`] chooses between reporting them as a [`CycleError`]
//! (the default) and resolving them in discovery order.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `trace` per rebuilt entity, `debug`
//! per flush and for ignored input, `warn` on reference cycles. No subscriber
//! is installed.
//!
//! ## `no_std` Support
//!
//! This crate is `no_std` and uses `alloc`.
//!
//! ## Features
//!
//! - `serde`: derives `Serialize`/`Deserialize` for [`MaterializerOptions`]
//!   and [`CycleHandling`], with camel-case field names (`observedRoots`).

#![no_std]

extern crate alloc;

mod drain;
mod error;
mod index;
mod intern;
mod json;
mod materializer;
mod options;
mod path;
mod reference;
mod schema;
mod set;
mod store;
mod value;
mod walk;

pub use drain::{DrainCompletion, DrainWaves, drain_affected};
pub use error::{ConfigError, CycleError};
pub use index::{DenseKey, DependencyIndex};
pub use intern::EntityId;
pub use materializer::Materializer;
pub use options::{CycleHandling, MaterializerOptions};
pub use path::{Path, PathKey};
pub use reference::{
    REF_PATH_KEY, REF_SENTINEL, REF_TYPE, Reference, TYPE_KEY, canonicalize, infer_schema,
    is_reference,
};
pub use schema::Schema;
pub use set::InvalidationSet;
pub use value::{Mapping, Opaque, Value};
pub use walk::{Visit, traverse};
