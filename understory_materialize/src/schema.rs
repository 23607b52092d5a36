// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Schemas: trees marking where references sit in a document.

use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::intern::EntityId;
use crate::path::{Path, PathKey};
use crate::reference::{Reference, canonicalize};
use crate::store::merges_shallowly;
use crate::value::{Mapping, Value};

/// A tree shaped like (a subset of) a document, with a [`Reference`] at every
/// reference position.
///
/// Positions without references are simply missing. The empty branch, which
/// is also the default, describes a document without references.
///
/// A schema is what [`infer_schema`](crate::infer_schema) computes. Callers
/// that update many fragments of the same shape can compute it once and pass
/// it to [`Materializer::update`](crate::Materializer::update).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Schema {
    /// A reference position.
    Ref(Reference),
    /// An interior node; children are keyed as in the document.
    Branch(HashMap<PathKey, Schema>),
}

impl Default for Schema {
    fn default() -> Self {
        Self::Branch(HashMap::new())
    }
}

impl From<Reference> for Schema {
    fn from(reference: Reference) -> Self {
        Self::Ref(reference)
    }
}

impl Schema {
    /// Parses a schema from its tagged tree form (see [`to_value`](Self::to_value)).
    ///
    /// Reference values become leaves, containers become branches and every
    /// other value is ignored.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        if let Some(reference) = canonicalize(value) {
            return Self::Ref(reference);
        }
        let children: HashMap<PathKey, Self> = match value {
            Value::Mapping(fields) => fields
                .iter()
                .map(|(key, child)| (PathKey::Name(key.clone()), Self::from_value(child)))
                .filter(|(_, child)| !child.is_empty())
                .collect(),
            Value::Sequence(items) => items
                .iter()
                .enumerate()
                .map(|(index, child)| (PathKey::Index(index), Self::from_value(child)))
                .filter(|(_, child)| !child.is_empty())
                .collect(),
            _ => HashMap::new(),
        };
        Self::Branch(children)
    }

    /// Returns `true` if the schema holds no reference.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Ref(_) => false,
            Self::Branch(children) => children.values().all(Self::is_empty),
        }
    }

    /// Returns the reference if this is a leaf.
    #[must_use]
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Ref(reference) => Some(reference),
            Self::Branch(_) => None,
        }
    }

    /// Returns the child schema at `key`.
    ///
    /// Like [`Value::child`], an index also finds its decimal name and a
    /// decimal name also finds its index.
    #[must_use]
    pub fn child(&self, key: &PathKey) -> Option<&Self> {
        let Self::Branch(children) = self else {
            return None;
        };
        children
            .get(key)
            .or_else(|| key.alternate().and_then(|other| children.get(&other)))
    }

    /// Returns the schema at `path` below this one.
    #[must_use]
    pub fn get(&self, path: &[PathKey]) -> Option<&Self> {
        path.iter().try_fold(self, |node, key| node.child(key))
    }

    /// Places `schema` at `path`, creating branches on the way.
    ///
    /// A reference leaf on the way is replaced by a branch.
    pub fn set(&mut self, path: &[PathKey], schema: Self) {
        let mut node = self;
        for key in path {
            if !matches!(node, Self::Branch(_)) {
                *node = Self::default();
            }
            let Self::Branch(children) = node else {
                unreachable!("node was just made a branch");
            };
            node = children.entry(key.clone()).or_default();
        }
        *node = schema;
    }

    /// Marks `path` as a reference to `reference`.
    pub fn insert(&mut self, path: &[PathKey], reference: Reference) {
        self.set(path, Self::Ref(reference));
    }

    /// Removes the direct child at `key` (in either spelling).
    pub fn remove(&mut self, key: &PathKey) -> Option<Self> {
        let Self::Branch(children) = self else {
            return None;
        };
        let removed = children.remove(key);
        let alternate = key.alternate().and_then(|other| children.remove(&other));
        removed.or(alternate)
    }

    /// Returns every reference leaf with its path relative to this schema.
    #[must_use]
    pub fn references(&self) -> Vec<(Path, &Reference)> {
        let mut found = Vec::new();
        let mut stack = vec![(Path::new(), self)];
        while let Some((path, node)) = stack.pop() {
            match node {
                Self::Ref(reference) => found.push((path, reference)),
                Self::Branch(children) => {
                    stack.extend(children.iter().map(|(key, child)| (path.child(key.clone()), child)));
                }
            }
        }
        found
    }

    /// Returns the tagged tree form: mappings for branches and
    /// [`Reference::to_value`] at every leaf.
    ///
    /// Index keys are written under their decimal names.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Ref(reference) => reference.to_value(),
            Self::Branch(children) => children
                .iter()
                .map(|(key, child)| (key.to_name(), child.to_value()))
                .collect::<Mapping>()
                .into(),
        }
    }
}

/// Per-entity schemas: the global schema tree addressed by entity.
///
/// The schema of an entity always describes the entity's current template
/// value, so it is merged with the same rule as the template itself.
#[derive(Debug, Default)]
pub(crate) struct SchemaStore {
    entities: HashMap<EntityId, Schema>,
}

impl SchemaStore {
    /// Returns the schema of `id`, if it has any references.
    pub(crate) fn get(&self, id: EntityId) -> Option<&Schema> {
        self.entities.get(&id)
    }

    /// Updates the schema of `id` for a write of `new` over `old`.
    ///
    /// `incoming` is the fragment's schema at the entity path. When the write
    /// is a shallow merge (two plain mappings), only the keys present
    /// in `new` take their schema from `incoming`; otherwise `incoming`
    /// replaces the entity schema.
    pub(crate) fn merge(
        &mut self,
        id: EntityId,
        old: Option<&Value>,
        new: &Value,
        incoming: Option<&Schema>,
    ) {
        let merged = match new {
            Value::Mapping(fields) if merges_shallowly(old, new) => {
                let mut schema = self.entities.remove(&id).unwrap_or_default();
                for (key, value) in fields.iter() {
                    let key = PathKey::Name(key.clone());
                    schema.remove(&key);
                    if value.is_absent() {
                        continue;
                    }
                    if let Some(child) = incoming.and_then(|incoming| incoming.child(&key)) {
                        schema.set(core::slice::from_ref(&key), child.clone());
                    }
                }
                schema
            }
            _ => incoming.cloned().unwrap_or_default(),
        };

        if merged.is_empty() {
            self.entities.remove(&id);
        } else {
            self.entities.insert(id, merged);
        }
    }

    /// Drops the schema of a removed entity.
    pub(crate) fn remove(&mut self, id: EntityId) -> Option<Schema> {
        self.entities.remove(&id)
    }
}
