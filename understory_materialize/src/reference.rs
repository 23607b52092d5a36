// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! References: values that stand for the value at another path.
//!
//! Raw fragments spell a reference in one of two ways:
//!
//! - a string starting with [`REF_SENTINEL`], followed by a dotted path
//!   (`"$links.link1"`);
//! - a tagged mapping `{ "$type": "ref", "refPath": ... }`, where `refPath` is
//!   a dotted string or a sequence of keys.
//!
//! Both spellings canonicalize to the same [`Reference`]. Reference paths are
//! always resolved from the document root.

use alloc::vec::Vec;

use crate::path::{Path, PathKey};
use crate::schema::Schema;
use crate::value::{Mapping, Value};
use crate::walk::{Visit, traverse};

/// First character of the string form of a reference.
pub const REF_SENTINEL: char = '$';

/// Key carrying the type tag of a tagged reference.
pub const TYPE_KEY: &str = "$type";

/// Type tag of a tagged reference.
pub const REF_TYPE: &str = "ref";

/// Key carrying the target path of a tagged reference.
pub const REF_PATH_KEY: &str = "refPath";

/// A canonical reference to the value at an absolute path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Reference {
    path: Path,
}

impl Reference {
    /// Creates a reference to `path`.
    pub fn new(path: impl Into<Path>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the target path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the canonical tagged form, `{ "$type": "ref", "refPath": [..] }`.
    ///
    /// Name keys become strings and index keys become numbers.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let keys = self.path.iter().map(|key| match key {
            PathKey::Name(name) => Value::String(name.clone()),
            PathKey::Index(index) => Value::Number(*index as f64),
        });
        let mut tagged = Mapping::with_capacity(2);
        tagged.insert(TYPE_KEY, Value::from(REF_TYPE));
        tagged.insert(REF_PATH_KEY, Value::sequence(keys));
        tagged.into()
    }
}

/// Returns `true` if `value` is a reference in either spelling.
///
/// A tagged mapping whose `refPath` cannot be read as a path is not a
/// reference; it is plain data.
#[must_use]
pub fn is_reference(value: &Value) -> bool {
    canonicalize(value).is_some()
}

/// Extracts the reference denoted by `value`, if it is one.
///
/// # Example
///
/// ```
/// use understory_materialize::{Path, Value, canonicalize};
///
/// let short = canonicalize(&Value::from("$links.link1")).unwrap();
/// let tagged = canonicalize(&Value::mapping([
///     ("$type", Value::from("ref")),
///     ("refPath", Value::sequence([Value::from("links"), Value::from("link1")])),
/// ]))
/// .unwrap();
///
/// assert_eq!(short, tagged);
/// assert_eq!(short.path(), &Path::from("links.link1"));
/// assert!(canonicalize(&Value::from("links.link1")).is_none());
/// ```
#[must_use]
pub fn canonicalize(value: &Value) -> Option<Reference> {
    match value {
        Value::String(text) => text
            .strip_prefix(REF_SENTINEL)
            .map(|dotted| Reference::new(dotted.split('.').collect::<Path>())),
        Value::Mapping(fields) => {
            if fields.get(TYPE_KEY)?.as_str()? != REF_TYPE {
                return None;
            }
            ref_path(fields.get(REF_PATH_KEY)?).map(Reference::new)
        }
        _ => None,
    }
}

fn ref_path(value: &Value) -> Option<Path> {
    match value {
        Value::String(dotted) => Some(Path::parse(dotted)),
        Value::Sequence(keys) => keys.iter().map(ref_key).collect::<Option<Vec<_>>>().map(Path::from),
        _ => None,
    }
}

fn ref_key(value: &Value) -> Option<PathKey> {
    match value {
        Value::String(name) => Some(PathKey::Name(name.clone())),
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n <= f64::from(u32::MAX) => {
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "checked to be a non-negative integer in u32 range"
            )]
            let index = *n as usize;
            Some(PathKey::Index(index))
        }
        _ => None,
    }
}

/// Builds the schema of `fragment`: a reference leaf at every reference
/// position.
///
/// This is a pure function. Its result can be computed once and passed to
/// [`Materializer::update`](crate::Materializer::update) for every fragment of
/// the same shape; that behaves exactly like letting `update` infer it.
///
/// References are leaves: the walk does not descend into tagged reference
/// mappings.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use understory_materialize::{Path, Reference, Value, infer_schema};
///
/// let fragment = Value::from(json!({
///     "comps": { "comp1": { "props": { "link": "$links.link1", "text": "hi" } } }
/// }));
/// let schema = infer_schema(&fragment);
///
/// let refs = schema.references();
/// assert_eq!(refs.len(), 1);
/// assert_eq!(refs[0].0, Path::from("comps.comp1.props.link"));
/// assert_eq!(refs[0].1, &Reference::new("links.link1"));
/// ```
#[must_use]
pub fn infer_schema(fragment: &Value) -> Schema {
    let mut schema = Schema::default();
    traverse(fragment, |value, path| match canonicalize(value) {
        Some(reference) => {
            schema.insert(path, reference);
            Visit::Skip
        }
        None => Visit::Continue,
    });
    schema
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(ref_path: Value) -> Value {
        Value::mapping([("$type", Value::from("ref")), ("refPath", ref_path)])
    }

    #[test]
    fn string_form_needs_the_sentinel() {
        assert!(is_reference(&Value::from("$a.b")));
        assert!(!is_reference(&Value::from("a.b")));
        assert!(!is_reference(&Value::from(1)));
        assert!(!is_reference(&Value::Null));
    }

    #[test]
    fn tagged_form_accepts_dotted_and_key_paths() {
        let dotted = canonicalize(&tagged(Value::from("app.clientSpecMap.7"))).unwrap();
        let keys = canonicalize(&tagged(Value::sequence([
            Value::from("app"),
            Value::from("clientSpecMap"),
            Value::from(7),
        ])))
        .unwrap();

        assert_eq!(dotted.path(), &Path::from("app.clientSpecMap.7"));
        assert_eq!(keys.path().normalized(), dotted.path().normalized());
        assert_eq!(keys.path()[2], PathKey::Index(7));
    }

    #[test]
    fn malformed_tags_are_data() {
        assert!(!is_reference(&Value::mapping([("$type", Value::from("ref"))])));
        assert!(!is_reference(&tagged(Value::from(true))));
        assert!(!is_reference(&tagged(Value::sequence([Value::from(-1)]))));
        assert!(!is_reference(&tagged(Value::sequence([Value::from(0.5)]))));
        assert!(!is_reference(&Value::mapping([
            ("$type", Value::from("other")),
            ("refPath", Value::from("a")),
        ])));
    }

    #[test]
    fn to_value_round_trips_through_canonicalize() {
        let reference = Reference::new(Path::from_iter([
            PathKey::from("items"),
            PathKey::Index(3),
        ]));
        assert_eq!(canonicalize(&reference.to_value()), Some(reference));
    }

    #[test]
    fn infer_schema_does_not_descend_into_references() {
        let fragment = Value::mapping([(
            "comps",
            Value::mapping([(
                "comp1",
                Value::mapping([
                    ("a", tagged(Value::from("x.y"))),
                    ("b", Value::sequence([Value::from("plain"), Value::from("$z.w")])),
                ]),
            )]),
        )]);
        let schema = infer_schema(&fragment);

        let mut refs: Vec<_> = schema
            .references()
            .into_iter()
            .map(|(path, reference)| (path, reference.path().clone()))
            .collect();
        refs.sort();
        assert_eq!(
            refs,
            [
                (Path::from("comps.comp1.a"), Path::from("x.y")),
                (
                    Path::from_iter([
                        PathKey::from("comps"),
                        PathKey::from("comp1"),
                        PathKey::from("b"),
                        PathKey::Index(1),
                    ]),
                    Path::from("z.w"),
                ),
            ]
        );
    }

    #[test]
    fn fragments_without_references_have_empty_schemas() {
        let fragment = Value::mapping([("a", Value::mapping([("b", Value::from("c"))]))]);
        assert!(infer_schema(&fragment).is_empty());
    }
}
