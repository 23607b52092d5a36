// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Breadth-first tree walking.
//!
//! Every other part of the crate walks documents through [`traverse`]: the
//! reference model to find reference positions, the entity store to find
//! entity writes and the descendants of removed subtrees.

use alloc::collections::VecDeque;

use crate::path::{Path, PathKey};
use crate::value::Value;

/// What [`traverse`] should do after visiting a node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Visit {
    /// Expand the node's children (if it has any).
    Continue,
    /// Do not expand this node.
    Skip,
}

/// Walks `root` breadth-first, calling `visit` with each node and its path.
///
/// The walk starts at `root` with the empty path. Mappings expand in
/// insertion order, sequences in index order. Scalars, `Null`, `Absent` and
/// opaque values are leaves. The walk is iterative over a growable ring
/// buffer, so deep or wide documents do not hit recursion limits.
///
/// # Example
///
/// ```
/// use understory_materialize::{Path, Value, Visit, traverse};
///
/// let doc = Value::mapping([
///     ("a", Value::mapping([("x", Value::from(1))])),
///     ("b", Value::sequence([Value::from(2)])),
/// ]);
///
/// let mut seen = Vec::new();
/// traverse(&doc, |_, path| {
///     seen.push(path.to_string());
///     Visit::Continue
/// });
/// assert_eq!(seen, ["", "a", "b", "a.x", "b.0"]);
///
/// // Skipping a node keeps its subtree out of the walk.
/// let mut seen = Vec::new();
/// traverse(&doc, |_, path: &Path| {
///     seen.push(path.to_string());
///     if path.len() == 1 { Visit::Skip } else { Visit::Continue }
/// });
/// assert_eq!(seen, ["", "a", "b"]);
/// ```
pub fn traverse<'a, F>(root: &'a Value, mut visit: F)
where
    F: FnMut(&'a Value, &Path) -> Visit,
{
    let mut queue: VecDeque<(Path, &'a Value)> = VecDeque::new();
    queue.push_back((Path::new(), root));

    while let Some((path, value)) = queue.pop_front() {
        if visit(value, &path) == Visit::Skip {
            continue;
        }
        match value {
            Value::Mapping(fields) => {
                queue.extend(
                    fields
                        .iter()
                        .map(|(key, child)| (path.child(PathKey::Name(key.clone())), child)),
                );
            }
            Value::Sequence(items) => {
                queue.extend(
                    items
                        .iter()
                        .enumerate()
                        .map(|(index, child)| (path.child(index), child)),
                );
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::{String, ToString};
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn visits_levels_in_order() {
        let doc = Value::mapping([
            (
                "a",
                Value::mapping([("c", Value::from(1)), ("d", Value::from(2))]),
            ),
            ("b", Value::sequence([Value::mapping([("e", Value::Null)])])),
        ]);

        let mut seen: Vec<String> = Vec::new();
        traverse(&doc, |_, path| {
            seen.push(path.to_string());
            Visit::Continue
        });
        assert_eq!(seen, vec!["", "a", "b", "a.c", "a.d", "b.0", "b.0.e"]);
    }

    #[test]
    fn sequence_children_use_index_keys() {
        let doc = Value::sequence([Value::from("x")]);
        let mut paths = Vec::new();
        traverse(&doc, |_, path| {
            paths.push(path.clone());
            Visit::Continue
        });
        assert_eq!(paths[1].keys(), &[PathKey::Index(0)]);
    }

    #[test]
    fn leaves_are_not_expanded() {
        let doc = Value::mapping([
            ("opaque", Value::opaque(vec![Value::from(1)])),
            ("gone", Value::Absent),
            ("text", Value::from("abc")),
        ]);
        let mut count = 0;
        traverse(&doc, |_, _| {
            count += 1;
            Visit::Continue
        });
        assert_eq!(count, 4);
    }

    #[test]
    fn handles_deep_documents_without_recursion() {
        let mut doc = Value::from(0);
        for _ in 0..10_000 {
            doc = Value::mapping([("n", doc)]);
        }
        let mut deepest = 0;
        traverse(&doc, |_, path| {
            deepest = deepest.max(path.len());
            Visit::Continue
        });
        assert_eq!(deepest, 10_000);
    }
}
