// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entity store: the merged raw document.

use alloc::vec::Vec;

use tracing::debug;

use crate::path::{Path, PathKey};
use crate::reference::is_reference;
use crate::value::{Mapping, Value};
use crate::walk::{Visit, traverse};

/// One entity-level write planned from a fragment.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum EntityWrite {
    /// Merge `value` into the entity at `path`.
    Merge { path: Path, value: Value },
    /// Remove the subtree at `path`, which holds `entities`.
    Remove { path: Path, entities: Vec<Path> },
}

/// The template: every fragment merged at entity granularity.
#[derive(Debug)]
pub(crate) struct EntityStore {
    template: Value,
    depth: usize,
}

impl EntityStore {
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            template: Value::empty_mapping(),
            depth,
        }
    }

    pub(crate) fn template(&self) -> &Value {
        &self.template
    }

    /// Returns the raw value at `path`.
    pub(crate) fn get(&self, path: &[PathKey]) -> Option<&Value> {
        self.template.lookup(path)
    }

    /// Plans the entity writes of `fragment`, in breadth-first order.
    ///
    /// Nodes at exactly `depth` keys become merges. `Absent` nodes at or above
    /// that depth become removals, listing the entities that currently exist
    /// beneath them. Other scalars above entity depth are ignored.
    pub(crate) fn plan(&self, fragment: &Value) -> Vec<EntityWrite> {
        let mut writes = Vec::new();
        traverse(fragment, |value, path| {
            if value.is_absent() {
                writes.push(EntityWrite::Remove {
                    path: path.clone(),
                    entities: self.descendant_entities(path),
                });
                return Visit::Skip;
            }
            if path.len() == self.depth {
                writes.push(EntityWrite::Merge {
                    path: path.clone(),
                    value: value.clone(),
                });
                return Visit::Skip;
            }
            if !value.is_container() {
                debug!(%path, "ignoring scalar above entity depth");
            }
            Visit::Continue
        });
        writes
    }

    /// Returns the entities that exist in the template at or below `path`.
    pub(crate) fn descendant_entities(&self, path: &Path) -> Vec<Path> {
        let mut entities = Vec::new();
        let Some(subtree) = self.template.lookup(path) else {
            return entities;
        };
        let remaining = self.depth.saturating_sub(path.len());
        traverse(subtree, |_, relative| {
            if relative.len() == remaining {
                entities.push(path.join(relative));
                Visit::Skip
            } else {
                Visit::Continue
            }
        });
        entities
    }

    /// Applies planned writes, reporting every invalidated entity path.
    pub(crate) fn merge_template(
        &mut self,
        writes: &[EntityWrite],
        mut invalidate: impl FnMut(&Path),
    ) {
        for write in writes {
            match write {
                EntityWrite::Merge { path, value } => {
                    self.merge_entity(path, value);
                    invalidate(path);
                }
                EntityWrite::Remove { path, entities } => {
                    for entity in entities {
                        invalidate(entity);
                    }
                    if path.is_empty() {
                        self.template = Value::empty_mapping();
                    } else {
                        self.template.remove_at(path);
                    }
                    debug!(%path, entities = entities.len(), "removed subtree");
                }
            }
        }
    }

    /// Merges `value` into the entity at `path`.
    ///
    /// Two plain mappings merge shallowly: the fragment's keys overwrite the
    /// old ones, and `Absent` entries delete them. Anything else, including a
    /// tagged reference, replaces the entity. `Absent` nested deeper is
    /// dropped before storing.
    fn merge_entity(&mut self, path: &Path, value: &Value) {
        let old = self.template.lookup(path);
        let merged = match (old, value) {
            (Some(Value::Mapping(old_fields)), Value::Mapping(new))
                if merges_shallowly(old, value) =>
            {
                let mut fields = Mapping::clone(old_fields);
                for (key, field) in new.iter() {
                    if field.is_absent() {
                        fields.remove(key);
                    } else {
                        fields.insert(key.clone(), field.without_absent());
                    }
                }
                Value::from(fields)
            }
            (_, value) => value.without_absent(),
        };
        self.template.insert_at(path, merged);
    }
}

/// Returns `true` if writing `new` over `old` merges key by key.
///
/// Only plain mappings merge; a tagged reference on either side is a single
/// value and is replaced whole.
pub(crate) fn merges_shallowly(old: Option<&Value>, new: &Value) -> bool {
    matches!((old, new), (Some(Value::Mapping(_)), Value::Mapping(_)))
        && old.is_some_and(|old| !is_reference(old))
        && !is_reference(new)
}
