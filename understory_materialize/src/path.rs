// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Paths into a document.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Deref;

use smallvec::SmallVec;

/// One step of a [`Path`]: a mapping key or a sequence index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathKey {
    /// A mapping key.
    Name(Rc<str>),
    /// A sequence index.
    Index(usize),
}

impl PathKey {
    /// Returns the index this key addresses in a sequence.
    ///
    /// Names count when they are canonical decimal numbers (`"0"`, `"17"`,
    /// but not `"01"` or `"+1"`).
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Name(name) => parse_index(name),
        }
    }

    /// Returns the key as a mapping key name.
    #[must_use]
    pub fn to_name(&self) -> Rc<str> {
        match self {
            Self::Name(name) => name.clone(),
            Self::Index(index) => Rc::from(format!("{index}")),
        }
    }

    /// Returns the other spelling of this key, if it has one.
    ///
    /// `Index(3)` and `Name("3")` are alternates of each other.
    #[must_use]
    pub fn alternate(&self) -> Option<Self> {
        match self {
            Self::Index(_) => Some(Self::Name(self.to_name())),
            Self::Name(name) => parse_index(name).map(Self::Index),
        }
    }
}

fn parse_index(name: &str) -> Option<usize> {
    let canonical = !name.is_empty()
        && name.bytes().all(|b| b.is_ascii_digit())
        && (name == "0" || !name.starts_with('0'));
    if canonical { name.parse().ok() } else { None }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathKey {
    fn from(name: &str) -> Self {
        Self::Name(Rc::from(name))
    }
}

impl From<String> for PathKey {
    fn from(name: String) -> Self {
        Self::Name(Rc::from(name))
    }
}

impl From<Rc<str>> for PathKey {
    fn from(name: Rc<str>) -> Self {
        Self::Name(name)
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An ordered sequence of keys identifying a location in a document.
///
/// Two paths are equal iff their keys are equal element-wise, so
/// `Index(0)` and `Name("0")` are different keys. Use
/// [`normalized`](Self::normalized) when both spellings should name the same
/// place.
///
/// # Example
///
/// ```
/// use understory_materialize::{Path, PathKey};
///
/// let dotted = Path::from("comps.comp1");
/// let keys = Path::from(["comps", "comp1"]);
/// assert_eq!(dotted, keys);
/// assert_eq!(dotted.to_string(), "comps.comp1");
///
/// let item = Path::from_iter([PathKey::from("items"), PathKey::Index(0)]);
/// assert_ne!(item, Path::from("items.0"));
/// assert_eq!(item, Path::from("items.0").normalized());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(SmallVec<[PathKey; 4]>);

impl Path {
    /// Creates the empty (root) path.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a dotted path. Every segment becomes a [`PathKey::Name`].
    ///
    /// The empty string is the empty path.
    #[must_use]
    pub fn parse(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::new();
        }
        dotted.split('.').map(PathKey::from).collect()
    }

    /// Returns the keys as a slice.
    #[must_use]
    pub fn keys(&self) -> &[PathKey] {
        &self.0
    }

    /// Appends a key.
    pub fn push(&mut self, key: impl Into<PathKey>) {
        self.0.push(key.into());
    }

    /// Returns this path extended by `key`.
    #[must_use]
    pub fn child(&self, key: impl Into<PathKey>) -> Self {
        let mut child = self.clone();
        child.push(key);
        child
    }

    /// Returns this path extended by every key of `rest`.
    #[must_use]
    pub fn join(&self, rest: &[PathKey]) -> Self {
        let mut joined = self.clone();
        joined.0.extend(rest.iter().cloned());
        joined
    }

    /// Returns the first `len` keys (or the whole path if it is shorter).
    #[must_use]
    pub fn truncated(&self, len: usize) -> Self {
        Self(self.0.iter().take(len).cloned().collect())
    }

    /// Returns `true` if `prefix` is a prefix of this path.
    #[must_use]
    pub fn starts_with(&self, prefix: &[PathKey]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Returns the path with canonical decimal names turned into indices.
    ///
    /// This is the identity used for entity keys, so a dotted reference like
    /// `"$items.0"` names the same entity as the template's sequence slot 0.
    #[must_use]
    pub fn normalized(&self) -> Self {
        self.0
            .iter()
            .map(|key| match key.as_index() {
                Some(index) => PathKey::Index(index),
                None => key.clone(),
            })
            .collect()
    }

    /// Returns the first key's name, if the first key is a name.
    #[must_use]
    pub fn root_name(&self) -> Option<&str> {
        match self.0.first() {
            Some(PathKey::Name(name)) => Some(&**name),
            _ => None,
        }
    }
}

impl Deref for Path {
    type Target = [PathKey];

    fn deref(&self) -> &[PathKey] {
        &self.0
    }
}

impl AsRef<[PathKey]> for Path {
    fn as_ref(&self) -> &[PathKey] {
        &self.0
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, key) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{key}")?;
        }
        Ok(())
    }
}

impl<K: Into<PathKey>> FromIterator<K> for Path {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathKey;
    type IntoIter = core::slice::Iter<'a, PathKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<&str> for Path {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

impl From<&String> for Path {
    fn from(dotted: &String) -> Self {
        Self::parse(dotted)
    }
}

impl From<String> for Path {
    fn from(dotted: String) -> Self {
        Self::parse(&dotted)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl From<&[PathKey]> for Path {
    fn from(keys: &[PathKey]) -> Self {
        Self(keys.iter().cloned().collect())
    }
}

impl From<Vec<PathKey>> for Path {
    fn from(keys: Vec<PathKey>) -> Self {
        Self(SmallVec::from_vec(keys))
    }
}

impl From<&[&str]> for Path {
    fn from(names: &[&str]) -> Self {
        names.iter().copied().collect()
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(names: [&str; N]) -> Self {
        names.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_and_key_forms_agree() {
        assert_eq!(Path::from("a.b.c"), Path::from(["a", "b", "c"]));
        assert_eq!(Path::from("").len(), 0);
        assert_eq!(Path::from("a..b").len(), 3);
    }

    #[test]
    fn index_and_name_keys_stay_distinct() {
        let by_index = Path::from_iter([PathKey::from("list"), PathKey::Index(0)]);
        let by_name = Path::from("list.0");
        assert_ne!(by_index, by_name);
        assert_eq!(by_index.normalized(), by_name.normalized());
    }

    #[test]
    fn only_canonical_decimals_normalize() {
        assert_eq!(PathKey::from("0").as_index(), Some(0));
        assert_eq!(PathKey::from("42").as_index(), Some(42));
        assert_eq!(PathKey::from("042").as_index(), None);
        assert_eq!(PathKey::from("").as_index(), None);
        assert_eq!(PathKey::from("-1").as_index(), None);
        assert_eq!(PathKey::from("x1").as_index(), None);
    }

    #[test]
    fn truncate_join_and_prefix() {
        let path = Path::from("app.clientSpecMap.7.instance");
        let entity = path.truncated(3);
        assert_eq!(entity, Path::from("app.clientSpecMap.7"));
        assert!(path.starts_with(&entity));
        assert_eq!(entity.join(&path[3..]), path);
        assert_eq!(Path::from("a").truncated(3), Path::from("a"));
        assert_eq!(path.root_name(), Some("app"));
    }

    #[test]
    fn display_is_dotted() {
        let path = Path::from_iter([PathKey::from("items"), PathKey::Index(2)]);
        assert_eq!(format!("{path}"), "items.2");
    }

    #[test]
    fn alternate_spellings() {
        assert_eq!(PathKey::Index(3).alternate(), Some(PathKey::from("3")));
        assert_eq!(PathKey::from("3").alternate(), Some(PathKey::Index(3)));
        assert_eq!(PathKey::from("x").alternate(), None);
    }
}
