// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Document values: the JSON-like tree the materializer reads and produces.
//!
//! Containers and strings are reference counted, so cloning a [`Value`] copies
//! a handle rather than the data. This is what lets the materializer hand the
//! same object back for entities that did not change: compare handles with
//! [`Value::same`].

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::fmt;

use hashbrown::HashMap;

use crate::path::PathKey;
use crate::walk::{Visit, traverse};

/// A node of a JSON-like document.
///
/// # Example
///
/// ```
/// use understory_materialize::{Mapping, Value};
///
/// let link: Value = Mapping::from_iter([("href", Value::from("X"))]).into();
/// let copy = link.clone();
///
/// // Clones share the allocation.
/// assert!(link.same(&copy));
/// assert_eq!(link.lookup(&["href".into()]), Some(&Value::from("X")));
/// ```
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Explicit `null`.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string. Strings starting with `$` are references in raw fragments.
    String(Rc<str>),
    /// An ordered sequence.
    Sequence(Rc<Vec<Value>>),
    /// An insertion-ordered, string-keyed mapping.
    Mapping(Rc<Mapping>),
    /// Anything that is not plain data (callables, class instances, handles).
    ///
    /// Opaque values are leaves: they are never walked into and always pass
    /// through unchanged.
    Opaque(Opaque),
    /// Removal marker.
    ///
    /// In a fragment, `Absent` deletes whatever is stored at its position.
    /// Lookups never return it.
    Absent,
}

impl Value {
    /// Creates a sequence value.
    pub fn sequence(items: impl IntoIterator<Item = Self>) -> Self {
        Self::Sequence(Rc::new(items.into_iter().collect()))
    }

    /// Creates a mapping value.
    pub fn mapping<K: Into<Rc<str>>>(entries: impl IntoIterator<Item = (K, Self)>) -> Self {
        Self::Mapping(Rc::new(entries.into_iter().collect()))
    }

    /// Creates an empty mapping value.
    #[must_use]
    pub fn empty_mapping() -> Self {
        Self::Mapping(Rc::default())
    }

    /// Wraps an arbitrary value as an opaque leaf.
    pub fn opaque<T: Any>(value: T) -> Self {
        Self::Opaque(Opaque::new(value))
    }

    /// Returns `true` for [`Value::Absent`].
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns `true` for [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for mappings and sequences.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Mapping(_) | Self::Sequence(_))
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number, if this is one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(&**s),
            _ => None,
        }
    }

    /// Returns the sequence items, if this is a sequence.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Returns the mapping, if this is one.
    #[must_use]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(fields) => Some(&**fields),
            _ => None,
        }
    }

    /// Returns the opaque payload, if this is an opaque leaf.
    #[must_use]
    pub fn as_opaque(&self) -> Option<&Opaque> {
        match self {
            Self::Opaque(opaque) => Some(opaque),
            _ => None,
        }
    }

    /// Returns `true` if both values are the same object.
    ///
    /// Strings, containers and opaque values compare by allocation; scalars
    /// compare by value.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Rc::ptr_eq(a, b),
            (Self::Sequence(a), Self::Sequence(b)) => Rc::ptr_eq(a, b),
            (Self::Mapping(a), Self::Mapping(b)) => Rc::ptr_eq(a, b),
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            (Self::String(_) | Self::Sequence(_) | Self::Mapping(_) | Self::Opaque(_), _) => false,
            _ => self == other,
        }
    }

    /// Returns the direct child at `key`.
    ///
    /// Lookups are lenient about key kinds: a decimal name indexes into a
    /// sequence, and an index looks up its decimal name in a mapping.
    #[must_use]
    pub fn child(&self, key: &PathKey) -> Option<&Self> {
        let child = match (self, key) {
            (Self::Mapping(fields), PathKey::Name(name)) => fields.get(name),
            (Self::Mapping(fields), PathKey::Index(index)) => fields.get(&format!("{index}")),
            (Self::Sequence(items), key) => key.as_index().and_then(|index| items.get(index)),
            _ => None,
        };
        child.filter(|value| !value.is_absent())
    }

    /// Returns the value at `path` below this one.
    ///
    /// The empty path returns `self`.
    #[must_use]
    pub fn lookup(&self, path: &[PathKey]) -> Option<&Self> {
        path.iter().try_fold(self, |node, key| node.child(key))
    }

    /// Writes `value` at `path`, creating missing containers on the way.
    ///
    /// Index keys create sequences and name keys create mappings. Shared
    /// containers on the spine are copied before being written, so any other
    /// holder of them keeps seeing the old tree.
    pub(crate) fn insert_at(&mut self, path: &[PathKey], value: Self) {
        let mut node = self;
        for key in path {
            node = node.child_slot(key);
        }
        *node = value;
    }

    /// Removes and returns the value at `path`.
    ///
    /// Mapping entries are deleted; sequence elements are replaced with
    /// `Null` so later indices stay put.
    pub(crate) fn remove_at(&mut self, path: &[PathKey]) -> Option<Self> {
        self.lookup(path)?;
        self.detach(path)
    }

    /// Returns this value with every nested `Absent` taken out.
    ///
    /// Mapping entries holding `Absent` are deleted and sequence elements
    /// become `Null`. Without any `Absent` inside, the result is `self` by
    /// handle; otherwise only the spines above the removed entries are
    /// copied.
    pub(crate) fn without_absent(&self) -> Self {
        if self.is_absent() || !self.contains_absent() {
            return self.clone();
        }
        let mut absent = Vec::new();
        traverse(self, |value, path| {
            if value.is_absent() && !path.is_empty() {
                absent.push(path.clone());
            }
            Visit::Continue
        });

        let mut stripped = self.clone();
        for path in &absent {
            stripped.detach(path);
        }
        stripped
    }

    fn contains_absent(&self) -> bool {
        let mut stack = Vec::new();
        stack.push(self);
        while let Some(value) = stack.pop() {
            match value {
                Self::Absent => return true,
                Self::Sequence(items) => stack.extend(items.iter()),
                Self::Mapping(fields) => stack.extend(fields.values()),
                _ => {}
            }
        }
        false
    }

    /// Removes the slot at `path` without checking that it holds a value.
    fn detach(&mut self, path: &[PathKey]) -> Option<Self> {
        let (last, spine) = path.split_last()?;
        let mut node = self;
        for key in spine {
            node = node.child_slot(key);
        }
        match node {
            Self::Mapping(fields) => Rc::make_mut(fields).remove(&last.to_name()),
            Self::Sequence(items) => {
                let index = last.as_index()?;
                Rc::make_mut(items)
                    .get_mut(index)
                    .map(|slot| core::mem::replace(slot, Self::Null))
            }
            _ => None,
        }
    }

    fn child_slot(&mut self, key: &PathKey) -> &mut Self {
        let replacement = match (&*self, key) {
            (Self::Mapping(_), _) => None,
            (Self::Sequence(_), key) if key.as_index().is_some() => None,
            (_, PathKey::Index(_)) => Some(Self::Sequence(Rc::default())),
            (_, PathKey::Name(_)) => Some(Self::empty_mapping()),
        };
        if let Some(container) = replacement {
            *self = container;
        }

        match self {
            Self::Sequence(items) => {
                let index = key.as_index().unwrap_or_default();
                let items = Rc::make_mut(items);
                if index >= items.len() {
                    items.resize(index + 1, Self::Null);
                }
                &mut items[index]
            }
            Self::Mapping(fields) => Rc::make_mut(fields).slot(key.to_name()),
            other => other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) | (Self::Absent, Self::Absent) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Mapping(a), Self::Mapping(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Drop for Value {
    // Unique containers hand their children to a local stack instead of
    // dropping them in place, so freeing a deep tree does not recurse.
    fn drop(&mut self) {
        if !self.is_container() {
            return;
        }
        let mut stack = Vec::new();
        self.take_children(&mut stack);
        while let Some(mut value) = stack.pop() {
            value.take_children(&mut stack);
        }
    }
}

impl Value {
    /// Moves the children of a uniquely owned container onto `stack`.
    fn take_children(&mut self, stack: &mut Vec<Self>) {
        match self {
            Self::Sequence(items) => {
                if let Some(items) = Rc::get_mut(items) {
                    stack.append(items);
                }
            }
            Self::Mapping(fields) => {
                if let Some(fields) = Rc::get_mut(fields) {
                    fields.index.clear();
                    stack.extend(fields.entries.drain(..).map(|(_, value)| value));
                }
            }
            _ => {}
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Rc::from(value))
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Self>> for Value {
    fn from(items: Vec<Self>) -> Self {
        Self::Sequence(Rc::new(items))
    }
}

impl From<Mapping> for Value {
    fn from(fields: Mapping) -> Self {
        Self::Mapping(Rc::new(fields))
    }
}

impl From<Opaque> for Value {
    fn from(opaque: Opaque) -> Self {
        Self::Opaque(opaque)
    }
}

/// An insertion-ordered map from string keys to [`Value`]s.
///
/// Entries live in a vector; a hash index maps each key to its slot.
/// Replacing a key keeps its position, removing one shifts the entries after
/// it.
#[derive(Clone, Default)]
pub struct Mapping {
    entries: Vec<(Rc<str>, Value)>,
    index: HashMap<Rc<str>, usize>,
}

impl Mapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty mapping with room for `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the mapping has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Inserts `value` under `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<Rc<str>>, value: Value) -> Option<Value> {
        let key = key.into();
        if let Some(&slot) = self.index.get(&*key) {
            return Some(core::mem::replace(&mut self.entries[slot].1, value));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let slot = self.index.remove(key)?;
        let (_, value) = self.entries.remove(slot);
        for (later, _) in &self.entries[slot..] {
            if let Some(position) = self.index.get_mut(&**later) {
                *position -= 1;
            }
        }
        Some(value)
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> + '_ {
        self.entries.iter().map(|(key, value)| (key, value))
    }

    /// Iterates over keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(|(key, _)| &**key)
    }

    /// Iterates over values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &Value> + '_ {
        self.entries.iter().map(|(_, value)| value)
    }

    /// Returns the slot for `key`, inserting `Null` if it is missing.
    fn slot(&mut self, key: Rc<str>) -> &mut Value {
        let slot = match self.index.get(&*key) {
            Some(&slot) => slot,
            None => {
                let slot = self.entries.len();
                self.index.insert(key.clone(), slot);
                self.entries.push((key, Value::Null));
                slot
            }
        };
        &mut self.entries[slot].1
    }
}

impl PartialEq for Mapping {
    /// Key order does not take part in equality.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(key, value)| other.get(key).is_some_and(|theirs| theirs == value))
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Into<Rc<str>>> FromIterator<(K, Value)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut fields = Self::with_capacity(iter.size_hint().0);
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

/// A shared handle to a value that is not plain data.
///
/// Opaque values compare by identity.
#[derive(Clone)]
pub struct Opaque(Rc<dyn Any>);

impl Opaque {
    /// Wraps `value`.
    pub fn new<T: Any>(value: T) -> Self {
        Self(Rc::new(value))
    }

    /// Returns the payload if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Returns `true` if both handles point at the same payload.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        core::ptr::addr_eq(Rc::as_ptr(&self.0), Rc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Opaque").finish_non_exhaustive()
    }
}
