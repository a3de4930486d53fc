//! Model schemas for kvmap.
//!
//! - [`CompiledSchema`]: an immutable model definition (name, typed fields,
//!   and the sorted key fields that address an instance)
//! - [`FieldSpec`] / [`FieldDef`]: declared and compiled fields
//! - [`KeyConfig`]: key sigil and store key layout
//! - [`ModelError`]: the error taxonomy shared with the store layer
//!
//! Schemas are compiled once against a [`kvmap_types::TypeRegistry`] and
//! never mutated, so they can be shared freely between concurrent
//! operations.

mod config;
mod error;
mod key;
mod schema;
mod validator;

pub use config::KeyConfig;
pub use error::{BoxError, ModelError, ModelResult};
pub use schema::{CompiledSchema, FieldDef, FieldSpec};
