// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interning of entity paths into compact ids.
//!
//! The dependency index and the invalidation set are keyed by `K: Copy`, so
//! every entity path is interned once into an [`EntityId`]. Paths are keyed
//! by their [normalized](crate::Path::normalized) form: `["items", "0"]`
//! (from a reference) and `["items", 0]` (from the template) get one id.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::index::DenseKey;
use crate::path::Path;

/// A compact, interned entity identifier.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Returns this id as a `usize` index.
    #[inline]
    #[must_use]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }
}

impl DenseKey for EntityId {
    #[inline]
    fn index(self) -> usize {
        self.as_usize()
    }
}

/// Interns entity paths into [`EntityId`]s.
///
/// Each id remembers the path as it was last written to the template, which
/// is the spelling reported back to callers.
#[derive(Debug, Default)]
pub(crate) struct EntityIds {
    paths: Vec<Path>,
    ids: HashMap<Path, EntityId>,
}

impl EntityIds {
    /// Returns the id of `path`, interning it if needed.
    ///
    /// A newly interned path is remembered in the spelling given here.
    pub(crate) fn intern(&mut self, path: &Path) -> EntityId {
        let key = path.normalized();
        if let Some(&id) = self.ids.get(&key) {
            return id;
        }
        let id = EntityId(
            u32::try_from(self.paths.len()).expect("too many entities for EntityId (u32)"),
        );
        self.paths.push(path.clone());
        self.ids.insert(key, id);
        id
    }

    /// Interns `path` and makes it the reported spelling of its entity.
    pub(crate) fn record(&mut self, path: &Path) -> EntityId {
        let id = self.intern(path);
        let slot = &mut self.paths[id.as_usize()];
        if slot != path {
            *slot = path.clone();
        }
        id
    }

    /// Returns the id of `path` if it was interned.
    pub(crate) fn get(&self, path: &Path) -> Option<EntityId> {
        self.ids.get(&path.normalized()).copied()
    }

    /// Returns the reported path of `id`.
    pub(crate) fn path(&self, id: EntityId) -> &Path {
        &self.paths[id.as_usize()]
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.paths.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathKey;

    #[test]
    fn spellings_of_one_entity_share_an_id() {
        let mut ids = EntityIds::default();
        let from_ref = ids.intern(&Path::from("items.0"));
        let from_template = Path::from_iter([PathKey::from("items"), PathKey::Index(0)]);

        assert_eq!(ids.intern(&from_template), from_ref);
        assert_eq!(ids.path(from_ref), &Path::from("items.0"));

        ids.record(&from_template);
        assert_eq!(ids.path(from_ref), &from_template);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn get_does_not_intern() {
        let mut ids = EntityIds::default();
        assert_eq!(ids.get(&Path::from("a.b")), None);
        let id = ids.intern(&Path::from("a.b"));
        assert_eq!(ids.get(&Path::from("a.b")), Some(id));
        assert_ne!(ids.intern(&Path::from("a.c")), id);
    }
}
