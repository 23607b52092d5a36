// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversions to and from `serde_json` values.

use alloc::string::ToString;

use serde_json::{Map, Number};

use crate::value::{Mapping, Value};

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Self::from(&json)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::from(s.as_str()),
            serde_json::Value::Array(items) => Self::sequence(items.iter().map(Self::from)),
            serde_json::Value::Object(fields) => fields
                .iter()
                .map(|(key, field)| (key.as_str(), Self::from(field)))
                .collect::<Mapping>()
                .into(),
        }
    }
}

impl Value {
    /// Converts to a `serde_json` value.
    ///
    /// Whole numbers that fit an `i64` become JSON integers. Opaque values
    /// and non-finite numbers become `null`. `Absent` mapping entries are
    /// skipped; anywhere else `Absent` becomes `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null | Self::Opaque(_) | Self::Absent => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => serde_json::Value::String(s.to_string()),
            Self::Sequence(items) => items.iter().map(Self::to_json).collect(),
            Self::Mapping(fields) => fields
                .iter()
                .filter(|(_, field)| !field.is_absent())
                .map(|(key, field)| (key.to_string(), field.to_json()))
                .collect::<Map<_, _>>()
                .into(),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    if n.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&n) {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "whole number checked to be in i64 range"
        )]
        let whole = n as i64;
        return serde_json::Value::Number(whole.into());
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_json_trees() {
        let value = Value::from(json!({
            "a": [1, 2.5, "x", null, true],
            "b": { "c": {} }
        }));
        assert_eq!(
            value.lookup(&crate::Path::from("a.1")),
            Some(&Value::from(2.5))
        );
        assert_eq!(
            value.lookup(&crate::Path::from("b.c")),
            Some(&Value::empty_mapping())
        );
    }

    #[test]
    fn back_to_json() {
        let original = json!({ "n": 3, "f": 0.5, "s": "t", "l": [null, false] });
        assert_eq!(Value::from(&original).to_json(), original);
    }

    #[test]
    fn absent_and_opaque() {
        let value = Value::mapping([
            ("gone", Value::Absent),
            ("fn", Value::opaque(42_u8)),
            ("nan", Value::from(f64::NAN)),
        ]);
        assert_eq!(value.to_json(), json!({ "fn": null, "nan": null }));
    }
}
