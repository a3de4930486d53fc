//! Primitive scalar kinds and their string representations.
//!
//! The backing store only holds strings, so every scalar is written in its
//! stringified form and coerced back through its field's primitive on load.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Largest integer magnitude an `f64` represents exactly (2^53 - 1).
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// The concrete scalar kind a type expression may pin a value to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
}

impl PrimitiveKind {
    /// Built-in name of the primitive as written in type expressions.
    pub const fn name(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
        }
    }

    /// Returns true if the runtime representation of `value` is this kind.
    /// No coercion: `"1"` is not a number.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            PrimitiveKind::String => value.is_string(),
            PrimitiveKind::Number => value.is_number(),
            PrimitiveKind::Boolean => value.is_boolean(),
        }
    }

    /// Coerces a raw stored token back into a value of this kind.
    ///
    /// Unparseable input yields `Value::Null` instead of an error; callers
    /// treat null as "field absent".
    pub fn coerce(&self, raw: &str) -> Value {
        match self {
            PrimitiveKind::String => Value::String(raw.to_string()),
            PrimitiveKind::Number => raw
                .trim()
                .parse::<f64>()
                .map(number_from_f64)
                .unwrap_or(Value::Null),
            PrimitiveKind::Boolean => match raw {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Null,
            },
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Converts an `f64` into a JSON number, preferring the integer form for
/// integral values within 2^53. Non-finite input becomes `Value::Null`.
///
/// The store holds `7.0` and `7` as the same string `"7"`, so the float
/// form of an integral value is not recoverable: `json!(7.0)` loads back as
/// `json!(7)`. Numeric value is preserved; `Value` equality is not.
pub fn number_from_f64(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Renders a value as the string that predicates see and the store holds.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Like [`stringify`], but a missing value contributes nothing to a key.
pub fn key_segment(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(v) => stringify(v),
    }
}

fn format_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        // f64's Display drops the trailing ".0" on integral values.
        n.as_f64().map(|f| f.to_string()).unwrap_or_default()
    }
}
