//! The type registry.
//!
//! Holds two append-only tables: named types (primitives and derived types)
//! and the validator set keyed by the `is<Name>` convention. A token of a
//! type expression is resolved against them in this order:
//!
//! 1. an exact registered type name
//! 2. a `/.../` regular expression literal
//! 3. a validator named `is<Token>` (or the token itself, if it already
//!    carries the `is` prefix)
//!
//! Anything else makes the expression invalid.

use crate::expr::{split_tokens, Predicate, TypeCheck, TypeExpr};
use crate::primitive::PrimitiveKind;
use crate::validators;
use crate::{TypeError, TypeResult};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

const VALIDATOR_PREFIX: &str = "is";

static SHARED: OnceLock<Arc<TypeRegistry>> = OnceLock::new();

/// A registered type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedType {
    pub name: String,
    /// Primitive the type aliases, or `None` for a marker type.
    pub primitive: Option<PrimitiveKind>,
}

#[derive(Default)]
struct Tables {
    types: HashMap<String, NamedType>,
    validators: HashMap<String, Predicate>,
}

/// Registry of named types and validators.
///
/// Entries can be added but never removed or replaced. Compiled
/// [`TypeExpr`]s capture their checks by value, so concurrent readers and
/// already-compiled schemas never observe a registration.
pub struct TypeRegistry {
    tables: RwLock<Tables>,
}

impl TypeRegistry {
    /// Creates a registry holding only the `string`, `number` and `boolean`
    /// primitives.
    pub fn new() -> Self {
        let mut tables = Tables::default();
        for kind in [
            PrimitiveKind::String,
            PrimitiveKind::Number,
            PrimitiveKind::Boolean,
        ] {
            tables.types.insert(
                kind.name().to_string(),
                NamedType {
                    name: kind.name().to_string(),
                    primitive: Some(kind),
                },
            );
        }
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Creates a registry with the primitives and the built-in validator set
    /// (`Email`, `Url`, `Lowercase`, `Float`, ...).
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        {
            let mut tables = registry.write();
            for (name, predicate) in validators::builtin() {
                tables
                    .validators
                    .insert(format!("{VALIDATOR_PREFIX}{name}"), predicate);
            }
        }
        registry
    }

    /// Installs `registry` as the process-wide registry. Call once during
    /// setup, before anything reads [`shared`](Self::shared).
    ///
    /// # Errors
    ///
    /// [`TypeError::SharedInitialized`] if the shared registry is already in
    /// place, whether installed here or by an earlier `shared()` call.
    pub fn init_shared(registry: TypeRegistry) -> TypeResult<Arc<TypeRegistry>> {
        let registry = Arc::new(registry);
        SHARED
            .set(registry.clone())
            .map_err(|_| TypeError::SharedInitialized)?;
        Ok(registry)
    }

    /// The process-wide registry.
    ///
    /// Without a prior [`init_shared`](Self::init_shared), the first access
    /// installs [`with_builtins`](Self::with_builtins). That registry is
    /// fully determined by the built-in tables, so this matches calling
    /// `init_shared(TypeRegistry::with_builtins())` at startup.
    pub fn shared() -> Arc<TypeRegistry> {
        SHARED
            .get_or_init(|| Arc::new(TypeRegistry::with_builtins()))
            .clone()
    }

    /// Registers a derived type. With a primitive kind the name behaves as
    /// an alias of that primitive; without one it accepts any value.
    ///
    /// A name that already resolves to a type or validator is a duplicate.
    pub fn register(&self, name: &str, primitive: Option<PrimitiveKind>) -> TypeResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TypeError::EmptyName);
        }
        let mut tables = self.write();
        if tables.types.contains_key(name) || tables.validators.contains_key(&validator_key(name)) {
            return Err(TypeError::Duplicate {
                name: name.to_string(),
            });
        }
        tables.types.insert(
            name.to_string(),
            NamedType {
                name: name.to_string(),
                primitive,
            },
        );
        Ok(())
    }

    /// Adds a validator to the validator set. `name` may be given as `Slug`
    /// or `isSlug`; it is stored as `isSlug` either way.
    pub fn register_validator<F>(&self, name: &str, predicate: F) -> TypeResult<()>
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        let name = name.trim();
        if name.is_empty() || name == VALIDATOR_PREFIX {
            return Err(TypeError::EmptyName);
        }
        let key = validator_key(name);
        let mut tables = self.write();
        let bare = &key[VALIDATOR_PREFIX.len()..];
        if tables.validators.contains_key(&key) || tables.types.contains_key(bare) {
            return Err(TypeError::Duplicate { name: key });
        }
        tables.validators.insert(key, Arc::new(predicate));
        Ok(())
    }

    /// Returns the registered type with this exact name.
    pub fn named(&self, name: &str) -> Option<NamedType> {
        self.read().types.get(name).cloned()
    }

    pub fn has_validator(&self, name: &str) -> bool {
        self.read().validators.contains_key(&validator_key(name))
    }

    /// Resolves a single token, or `None` if it names nothing.
    pub fn resolve_token(&self, token: &str) -> Option<TypeCheck> {
        if token.is_empty() {
            return None;
        }
        let tables = self.read();

        if let Some(named) = tables.types.get(token) {
            return Some(match named.primitive {
                Some(kind) => TypeCheck::Primitive {
                    name: named.name.clone(),
                    kind,
                },
                None => TypeCheck::Marker {
                    name: named.name.clone(),
                },
            });
        }

        if let Some(body) = regex_body(token) {
            return Regex::new(body).ok().map(TypeCheck::Pattern);
        }

        let prefixed = format!("{VALIDATOR_PREFIX}{token}");
        if let Some(predicate) = tables.validators.get(&prefixed) {
            return Some(TypeCheck::Validator {
                name: prefixed,
                predicate: predicate.clone(),
            });
        }
        if token.starts_with(VALIDATOR_PREFIX) {
            if let Some(predicate) = tables.validators.get(token) {
                return Some(TypeCheck::Validator {
                    name: token.to_string(),
                    predicate: predicate.clone(),
                });
            }
        }

        None
    }

    /// Compiles an expression, failing if any token does not resolve.
    pub fn compile(&self, expr: &str) -> TypeResult<TypeExpr> {
        let checks = split_tokens(expr)
            .into_iter()
            .map(|token| self.resolve_token(token))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| TypeError::InvalidExpression {
                expr: expr.to_string(),
            })?;
        Ok(TypeExpr::new(expr, checks))
    }

    /// Returns true iff every token of `expr` resolves.
    pub fn is_valid_expression(&self, expr: &str) -> bool {
        split_tokens(expr)
            .into_iter()
            .all(|token| self.resolve_token(token).is_some())
    }

    /// The primitive kind implied by `expr`: present only when exactly one
    /// token names a registered primitive. Other tokens need not resolve.
    pub fn resolve_primitive(&self, expr: &str) -> Option<PrimitiveKind> {
        let tables = self.read();
        let mut tokens = split_tokens(expr);
        tokens.sort_unstable();
        tokens.dedup();
        let kinds: Vec<PrimitiveKind> = tokens
            .into_iter()
            .filter_map(|token| tables.types.get(token).and_then(|t| t.primitive))
            .collect();
        match kinds.as_slice() {
            [kind] => Some(*kind),
            _ => None,
        }
    }

    /// Validates a value against an expression. An invalid expression
    /// accepts nothing.
    pub fn validate(&self, expr: &str, value: &Value) -> bool {
        self.compile(expr)
            .map(|compiled| compiled.validate(value))
            .unwrap_or(false)
    }

    /// Coerces a raw stored token according to the primitive `expr` implies.
    pub fn parse(&self, expr: &str, raw: &str) -> Value {
        match self.resolve_primitive(expr) {
            Some(kind) => kind.coerce(raw),
            None => Value::String(raw.to_string()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.read();
        let mut types: Vec<&String> = tables.types.keys().collect();
        types.sort();
        let mut validators: Vec<&String> = tables.validators.keys().collect();
        validators.sort();
        f.debug_struct("TypeRegistry")
            .field("types", &types)
            .field("validators", &validators)
            .finish()
    }
}

/// Registers a derived type in the [shared](TypeRegistry::shared) registry.
pub fn register_type(name: &str, primitive: Option<PrimitiveKind>) -> TypeResult<()> {
    TypeRegistry::shared().register(name, primitive)
}

fn validator_key(name: &str) -> String {
    let already_prefixed = name
        .strip_prefix(VALIDATOR_PREFIX)
        .and_then(|rest| rest.chars().next())
        .is_some_and(char::is_uppercase);
    if already_prefixed {
        name.to_string()
    } else {
        format!("{VALIDATOR_PREFIX}{name}")
    }
}

fn regex_body(token: &str) -> Option<&str> {
    if token.len() >= 2 && token.starts_with('/') && token.ends_with('/') {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}
