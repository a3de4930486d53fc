//! Type system for kvmap.
//!
//! Field declarations in a kvmap model are written as *type expressions*:
//! one or more type names joined by `|`, e.g. `"Email | Lowercase"`. Each name
//! resolves, in order, to:
//! - a registered primitive or derived type (`string`, `number`, `boolean`, ...)
//! - a literal regular expression delimited by slashes (`/^[a-z]+$/`)
//! - a validator from the named validator set, looked up as `is<Name>`
//!
//! A value satisfies an expression only if it satisfies *every* name in it.
//! The pipe reads like a union but is a conjunction: `"Email | Lowercase"`
//! accepts `login@server.com` and rejects `LOGIN@server.com`.
//!
//! At most one primitive in an expression decides how values are stored as
//! raw strings and coerced back on load; see [`PrimitiveKind`].

mod expr;
mod primitive;
mod registry;
mod validators;

pub use expr::{split_tokens, Predicate, TypeCheck, TypeExpr};
pub use primitive::{key_segment, number_from_f64, stringify, PrimitiveKind};
pub use registry::{register_type, NamedType, TypeRegistry};

/// Result type alias using the crate's error type.
pub type TypeResult<T> = std::result::Result<T, TypeError>;

/// Errors that can occur while registering types or compiling expressions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("type name is empty")]
    EmptyName,

    #[error("type '{name}' is already defined")]
    Duplicate { name: String },

    #[error("invalid type expression: '{expr}'")]
    InvalidExpression { expr: String },

    #[error("shared type registry is already initialized")]
    SharedInitialized,
}
