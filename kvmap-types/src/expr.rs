//! Compiled type expressions.

use crate::primitive::{stringify, PrimitiveKind};
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A named validator. Receives the stringified value.
pub type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// One resolved token of a type expression.
#[derive(Clone)]
pub enum TypeCheck {
    /// A registered type bound to a primitive kind (`string`, `number`, ...).
    Primitive { name: String, kind: PrimitiveKind },
    /// A registered type with no primitive kind. Accepts any value.
    Marker { name: String },
    /// A `/.../` literal, tested unanchored against the stringified value.
    Pattern(Regex),
    /// An entry of the validator set, e.g. `isEmail`.
    Validator { name: String, predicate: Predicate },
}

impl TypeCheck {
    /// The token this check was resolved from.
    pub fn name(&self) -> &str {
        match self {
            TypeCheck::Primitive { name, .. } => name,
            TypeCheck::Marker { name } => name,
            TypeCheck::Pattern(re) => re.as_str(),
            TypeCheck::Validator { name, .. } => name,
        }
    }

    /// Returns the primitive kind if this check is a primitive.
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            TypeCheck::Primitive { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn check(&self, value: &Value) -> bool {
        match self {
            TypeCheck::Primitive { kind, .. } => kind.matches(value),
            TypeCheck::Marker { .. } => true,
            TypeCheck::Pattern(re) => re.is_match(&stringify(value)),
            TypeCheck::Validator { predicate, .. } => predicate(&stringify(value)),
        }
    }
}

impl fmt::Debug for TypeCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeCheck::Primitive { name, kind } => {
                write!(f, "Primitive({name}: {kind})")
            }
            TypeCheck::Marker { name } => write!(f, "Marker({name})"),
            TypeCheck::Pattern(re) => write!(f, "Pattern(/{}/)", re.as_str()),
            TypeCheck::Validator { name, .. } => write!(f, "Validator({name})"),
        }
    }
}

/// An immutable, fully resolved type expression.
///
/// Produced by [`TypeRegistry::compile`](crate::TypeRegistry::compile).
/// Registering new types afterwards does not affect an existing `TypeExpr`.
#[derive(Debug, Clone)]
pub struct TypeExpr {
    source: String,
    checks: Vec<TypeCheck>,
    primitive: Option<PrimitiveKind>,
}

impl TypeExpr {
    pub(crate) fn new(source: &str, checks: Vec<TypeCheck>) -> Self {
        let primitive = implied_primitive(&checks);
        Self {
            source: source.to_string(),
            checks,
            primitive,
        }
    }

    /// The expression as it was declared.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn checks(&self) -> &[TypeCheck] {
        &self.checks
    }

    /// The single primitive kind implied by this expression, if exactly one
    /// distinct primitive token is present.
    pub fn primitive(&self) -> Option<PrimitiveKind> {
        self.primitive
    }

    /// Returns true iff `value` passes every check (conjunction).
    pub fn validate(&self, value: &Value) -> bool {
        self.checks.iter().all(|check| check.check(value))
    }

    /// Coerces a raw stored token back to a typed value.
    /// Without a primitive the raw string is kept as-is.
    pub fn parse(&self, raw: &str) -> Value {
        match self.primitive {
            Some(kind) => kind.coerce(raw),
            None => Value::String(raw.to_string()),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Splits an expression on `|` and trims each token. Empty tokens are kept
/// so that callers can reject them.
pub fn split_tokens(expr: &str) -> Vec<&str> {
    expr.split('|').map(str::trim).collect()
}

fn implied_primitive(checks: &[TypeCheck]) -> Option<PrimitiveKind> {
    let mut found: Vec<(&str, PrimitiveKind)> = Vec::new();
    for check in checks {
        if let TypeCheck::Primitive { name, kind } = check {
            if !found.iter().any(|(n, _)| *n == name.as_str()) {
                found.push((name.as_str(), *kind));
            }
        }
    }
    match found.as_slice() {
        [(_, kind)] => Some(*kind),
        _ => None,
    }
}
