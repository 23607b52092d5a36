// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The materializer: update protocol and reference resolution.

use alloc::vec::Vec;

use tracing::{debug, trace, warn};

use crate::drain::drain_affected;
use crate::error::{ConfigError, CycleError};
use crate::index::DependencyIndex;
use crate::intern::{EntityId, EntityIds};
use crate::options::{CycleHandling, MaterializerOptions};
use crate::path::{Path, PathKey};
use crate::reference::infer_schema;
use crate::schema::{Schema, SchemaStore};
use crate::set::InvalidationSet;
use crate::store::{EntityStore, EntityWrite};
use crate::value::{Mapping, Value};

/// Keeps a raw document and its reference-resolved counterpart in sync.
///
/// Fragments are merged into the raw document (the *template*) at entity
/// granularity. Each flush rebuilds exactly the entities that changed and
/// everything that reads them, producers before consumers, and reports the
/// rebuilt entities under the observed roots.
///
/// A `Materializer` is single-threaded: it owns all of its state and is not
/// `Send` (values share data through `Rc`).
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use understory_materialize::{Materializer, MaterializerOptions, Path, Value};
///
/// let mut materializer = Materializer::new(MaterializerOptions::new(2).observe("comps"))?;
///
/// let invalidated = materializer
///     .update(
///         &Value::from(json!({
///             "comps": { "comp1": { "props": { "link": "$links.link1" } } },
///             "links": { "link1": { "href": "X" } }
///         })),
///         None,
///     )
///     .unwrap();
///
/// assert_eq!(invalidated, [Path::from("comps.comp1")]);
/// assert_eq!(
///     materializer.get("comps.comp1").map(Value::to_json),
///     Some(json!({ "props": { "link": { "href": "X" } } }))
/// );
/// # Ok::<(), understory_materialize::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct Materializer {
    options: MaterializerOptions,
    store: EntityStore,
    materialized: Value,
    schemas: SchemaStore,
    ids: EntityIds,
    index: DependencyIndex<EntityId>,
    pending: InvalidationSet<EntityId>,
}

impl Materializer {
    /// Creates an empty materializer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroDepth`] if `options.depth` is 0.
    pub fn new(options: MaterializerOptions) -> Result<Self, ConfigError> {
        if options.depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(Self {
            store: EntityStore::new(options.depth),
            options,
            materialized: Value::empty_mapping(),
            schemas: SchemaStore::default(),
            ids: EntityIds::default(),
            index: DependencyIndex::new(),
            pending: InvalidationSet::new(),
        })
    }

    /// Returns the options this materializer was created with.
    #[must_use]
    pub fn options(&self) -> &MaterializerOptions {
        &self.options
    }

    /// Returns the entity depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.options.depth
    }

    /// Merges `fragment` and flushes, returning the observed invalidations.
    ///
    /// `schema` is the fragment's schema if the caller computed it up front
    /// with [`infer_schema`]; `None` infers it here. Both behave the same.
    ///
    /// # Errors
    ///
    /// See [`flush`](Self::flush).
    pub fn update(
        &mut self,
        fragment: &Value,
        schema: Option<&Schema>,
    ) -> Result<Vec<Path>, CycleError> {
        self.update_without_flush(fragment, schema);
        self.flush()
    }

    /// Merges `fragment` without rebuilding anything.
    ///
    /// The written entities join the pending set; [`get`](Self::get) keeps
    /// returning the state of the last flush until [`flush`](Self::flush)
    /// runs. The fragment itself is never modified.
    pub fn update_without_flush(&mut self, fragment: &Value, schema: Option<&Schema>) {
        let inferred;
        let schema = match schema {
            Some(schema) => schema,
            None => {
                inferred = infer_schema(fragment);
                &inferred
            }
        };

        let writes = self.store.plan(fragment);

        // Schemas and edges first, so they describe the values being written.
        for write in &writes {
            match write {
                EntityWrite::Merge { path, value } => {
                    let id = self.ids.record(path);
                    let old = self.store.get(path);
                    self.schemas.merge(id, old, value, schema.get(path));
                    let producers = self.producers_of(id);
                    self.index.replace_dependencies(id, producers);
                }
                EntityWrite::Remove { entities, .. } => {
                    for entity in entities {
                        if let Some(id) = self.ids.get(entity) {
                            self.schemas.remove(id);
                            self.index.remove_consumer(id);
                        }
                    }
                }
            }
        }

        let ids = &mut self.ids;
        let pending = &mut self.pending;
        self.store.merge_template(&writes, |path| {
            let id = ids.record(path);
            pending.mark(id);
        });
    }

    /// Rebuilds every pending entity and everything that reads it.
    ///
    /// Returns the rebuilt entities under the observed roots, producers
    /// before consumers. Returns an empty list if nothing is pending.
    ///
    /// # Errors
    ///
    /// With [`CycleHandling::Error`], returns [`CycleError`] if references
    /// among the affected entities form a cycle. The entities that could be
    /// ordered are still rebuilt, and the pending set is cleared.
    pub fn flush(&mut self) -> Result<Vec<Path>, CycleError> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let pending = self.pending.len();
        let (mut rebuilt, stalled) = self.populate();

        let mut remaining = Vec::new();
        if !stalled.is_empty() {
            match self.options.cycle_handling {
                CycleHandling::Resolve => {
                    warn!(entities = stalled.len(), "resolving reference cycle");
                    for &id in &stalled {
                        self.rebuild(id);
                    }
                    rebuilt.extend(stalled);
                }
                CycleHandling::Error => {
                    warn!(entities = stalled.len(), "reference cycle left entities stale");
                    remaining = stalled.iter().map(|&id| self.ids.path(id).clone()).collect();
                }
            }
        }

        let invalidated = self.observed(&rebuilt);
        debug!(
            pending,
            affected = rebuilt.len(),
            reported = invalidated.len(),
            "flushed"
        );

        if remaining.is_empty() {
            Ok(invalidated)
        } else {
            Err(CycleError {
                remaining,
                invalidated,
            })
        }
    }

    /// Returns the materialized value at `path`.
    ///
    /// Accepts dotted strings (`"comps.comp1"`) and key sequences. Paths
    /// shorter than the entity depth return the materialized subtree above
    /// the entities; it is gone once the template subtree was removed.
    pub fn get(&self, path: impl Into<Path>) -> Option<&Value> {
        let path: Path = path.into();
        self.materialized.lookup(&path)
    }

    /// Returns the whole materialized document.
    #[must_use]
    pub fn materialized(&self) -> &Value {
        &self.materialized
    }

    /// Returns the raw (unresolved) value at `path`, including pending writes.
    pub fn raw(&self, path: impl Into<Path>) -> Option<&Value> {
        let path: Path = path.into();
        self.store.get(&path)
    }

    /// Returns the whole raw document.
    #[must_use]
    pub fn template(&self) -> &Value {
        self.store.template()
    }

    /// Returns `true` if there are merged writes not yet flushed.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns the number of pending entities.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Returns the generation of the pending set.
    ///
    /// It changes whenever entities are marked or flushed.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.pending.generation()
    }

    /// Drains the pending set and rebuilds the affected entities in
    /// dependency order.
    ///
    /// Returns the rebuilt entities and the ones a cycle kept from being
    /// ordered.
    fn populate(&mut self) -> (Vec<EntityId>, Vec<EntityId>) {
        let (order, stalled) = {
            let mut waves = drain_affected(&mut self.pending, &self.index);
            let order: Vec<EntityId> = waves.by_ref().collect();
            (order, waves.take_remaining())
        };

        for &id in &order {
            self.rebuild(id);
        }
        (order, stalled)
    }

    /// Recomputes the materialized value of one entity.
    fn rebuild(&mut self, id: EntityId) {
        let path = self.ids.path(id).clone();
        let value = match self.store.get(&path) {
            None => None,
            Some(raw) => match self.schemas.get(id) {
                None => Some(raw.clone()),
                Some(schema) => resolve(raw, schema, &self.materialized),
            },
        };

        trace!(%path, present = value.is_some(), "rebuilt entity");
        match value {
            Some(value) => self.materialized.insert_at(&path, value),
            None => {
                self.materialized.remove_at(&path);
                self.prune_spine(&path);
            }
        }
    }

    /// Drops the materialized containers above `path` that the template no
    /// longer has.
    ///
    /// Every entity below such a container was removed from the template, so
    /// none of them has a materialized value either.
    fn prune_spine(&mut self, path: &Path) {
        for len in 1..path.len() {
            let spine = &path[..len];
            if self.store.get(spine).is_none() {
                self.materialized.remove_at(spine);
                return;
            }
        }
    }

    /// Returns the entities read by the schema of `id`.
    ///
    /// References shorter than the entity depth name no entity; they are
    /// resolved on rebuild but do not invalidate.
    fn producers_of(&mut self, id: EntityId) -> Vec<EntityId> {
        let depth = self.options.depth;
        let targets: Vec<Path> = self
            .schemas
            .get(id)
            .map(|schema| {
                schema
                    .references()
                    .into_iter()
                    .map(|(_, reference)| reference.path())
                    .filter(|target| target.len() >= depth)
                    .map(|target| target.truncated(depth))
                    .collect()
            })
            .unwrap_or_default();
        targets.iter().map(|target| self.ids.intern(target)).collect()
    }

    fn observed(&self, rebuilt: &[EntityId]) -> Vec<Path> {
        rebuilt
            .iter()
            .map(|&id| self.ids.path(id))
            .filter(|path| {
                path.root_name()
                    .is_some_and(|root| self.options.is_observed(root))
            })
            .cloned()
            .collect()
    }
}

/// Builds the materialized value of `raw` along `schema`.
///
/// Reference leaves take the materialized value at their target; positions
/// off the schema keep the raw value by handle; containers on the schema are
/// fresh copies. Returns `None` when `raw` itself is a dangling reference.
fn resolve(raw: &Value, schema: &Schema, materialized: &Value) -> Option<Value> {
    let children = match schema {
        Schema::Ref(reference) => return materialized.lookup(reference.path()).cloned(),
        Schema::Branch(children) => children,
    };
    if children.is_empty() {
        return Some(raw.clone());
    }
    match raw {
        Value::Mapping(fields) => {
            let mut resolved = Mapping::with_capacity(fields.len());
            for (key, field) in fields.iter() {
                if field.is_absent() {
                    continue;
                }
                match schema.child(&PathKey::Name(key.clone())) {
                    None => {
                        resolved.insert(key.clone(), field.clone());
                    }
                    Some(child) => {
                        // A dangling reference leaves the key out.
                        if let Some(value) = resolve(field, child, materialized) {
                            resolved.insert(key.clone(), value);
                        }
                    }
                }
            }
            Some(resolved.into())
        }
        Value::Sequence(items) => Some(Value::sequence(items.iter().enumerate().map(
            |(index, item)| match schema.child(&PathKey::Index(index)) {
                None => item.clone(),
                Some(child) => resolve(item, child, materialized).unwrap_or(Value::Null),
            },
        ))),
        other => Some(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn materializer(depth: usize) -> Materializer {
        Materializer::new(MaterializerOptions::new(depth).observe("comps")).unwrap()
    }

    fn comp(label: Value) -> Value {
        Value::mapping([(
            "comps",
            Value::mapping([("comp1", Value::mapping([("label", label)]))]),
        )])
    }

    #[test]
    fn zero_depth_is_rejected() {
        assert_eq!(
            Materializer::new(MaterializerOptions::new(0)).err(),
            Some(ConfigError::ZeroDepth)
        );
    }

    #[test]
    fn entity_without_references_aliases_the_template() {
        let mut m = materializer(2);
        m.update(&comp(Value::from(1)), None).unwrap();
        let raw = m.raw("comps.comp1").unwrap();
        assert!(m.get("comps.comp1").unwrap().same(raw));
    }

    #[test]
    fn dirty_state_and_generation() {
        let mut m = materializer(2);
        assert!(!m.is_dirty());
        let g0 = m.generation();
        m.update_without_flush(&comp(Value::from(1)), None);
        assert!(m.is_dirty());
        assert_eq!(m.pending_len(), 1);
        assert_ne!(m.generation(), g0);
        assert_eq!(m.get("comps.comp1"), None);
        assert_eq!(m.raw("comps.comp1.label"), Some(&Value::from(1)));

        m.flush().unwrap();
        assert!(!m.is_dirty());
        assert_eq!(m.get("comps.comp1.label"), Some(&Value::from(1)));
    }

    #[test]
    fn resolve_builds_fresh_containers_on_the_schema_only() {
        let shared = Value::mapping([("deep", Value::from(1))]);
        let raw = Value::mapping([
            ("plain", shared.clone()),
            ("props", Value::mapping([("link", Value::from("$links.a"))])),
        ]);
        let materialized = Value::mapping([(
            "links",
            Value::mapping([("a", Value::from("target"))]),
        )]);
        let mut schema = Schema::default();
        schema.insert(&Path::from("props.link"), crate::Reference::new("links.a"));

        let resolved = resolve(&raw, &schema, &materialized).unwrap();
        assert!(resolved.lookup(&Path::from("plain")).unwrap().same(&shared));
        assert_eq!(
            resolved.lookup(&Path::from("props.link")),
            Some(&Value::from("target"))
        );
        assert!(!resolved.same(&raw));
    }

    #[test]
    fn dangling_references_in_sequences_become_null() {
        let raw = Value::sequence([Value::from("$x.y"), Value::from(2)]);
        let mut schema = Schema::default();
        schema.insert(&[PathKey::Index(0)], crate::Reference::new("x.y"));
        let resolved = resolve(&raw, &schema, &Value::empty_mapping()).unwrap();
        assert_eq!(resolved, Value::sequence([Value::Null, Value::from(2)]));
    }

    #[test]
    fn short_references_resolve_but_do_not_invalidate() {
        let mut m = materializer(2);
        m.update(
            &Value::mapping([(
                "links",
                Value::mapping([("a", Value::from(1))]),
            )]),
            None,
        )
        .unwrap();
        m.update(&comp(Value::from("$links")), None).unwrap();
        assert_eq!(
            m.get("comps.comp1.label.a"),
            Some(&Value::from(1))
        );

        let out = m
            .update(
                &Value::mapping([("links", Value::mapping([("a", Value::from(2))]))]),
                None,
            )
            .unwrap();
        assert!(out.is_empty());
    }
}
