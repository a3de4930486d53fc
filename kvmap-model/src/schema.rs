//! Schema compilation.
//!
//! A model is declared as a map from field name to [`FieldSpec`]. A leading
//! key sigil (`$` by default) marks the field as part of the primary key; a
//! single-element sequence marks it as a collection stored as a set.
//!
//! ```json
//! { "$date_of_production": "number", "$production_line": "string",
//!   "manufacturer": "string", "colors": ["string"] }
//! ```

use crate::config::KeyConfig;
use crate::error::{ModelError, ModelResult};
use kvmap_types::{TypeExpr, TypeRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// A declared field type: a type expression, or a sequence that must hold
/// exactly one element type for a collection field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldSpec {
    Type(String),
    Sequence(Vec<String>),
}

impl FieldSpec {
    /// Shorthand for a collection of `element`.
    pub fn collection(element: impl Into<String>) -> Self {
        FieldSpec::Sequence(vec![element.into()])
    }
}

impl From<&str> for FieldSpec {
    fn from(expr: &str) -> Self {
        FieldSpec::Type(expr.to_string())
    }
}

impl From<String> for FieldSpec {
    fn from(expr: String) -> Self {
        FieldSpec::Type(expr)
    }
}

impl<const N: usize> From<[&str; N]> for FieldSpec {
    fn from(elements: [&str; N]) -> Self {
        FieldSpec::Sequence(elements.iter().map(|e| e.to_string()).collect())
    }
}

/// A compiled field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    name: String,
    expr: TypeExpr,
    is_key: bool,
    is_collection: bool,
}

impl FieldDef {
    /// Field name with the key sigil stripped.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field's type expression; the element type for a collection.
    pub fn expr(&self) -> &TypeExpr {
        &self.expr
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    /// Checks a value against this field. A collection must be an array
    /// whose every element passes the element type; an empty array passes.
    pub fn validate(&self, value: &Value) -> bool {
        if self.is_collection {
            value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| self.expr.validate(item)))
        } else {
            self.expr.validate(value)
        }
    }

    /// Coerces a scalar read back from the store. A missing key is null.
    pub fn parse_scalar(&self, raw: Option<&str>) -> Value {
        raw.map(|raw| self.expr.parse(raw)).unwrap_or(Value::Null)
    }

    /// Coerces set members read back from the store, element-wise.
    pub fn parse_members(&self, members: &[String]) -> Value {
        Value::Array(members.iter().map(|m| self.expr.parse(m)).collect())
    }
}

/// An immutable compiled model schema.
///
/// Always holds at least one key field. Fields iterate in name order, which
/// is also the order in which store commands are issued.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    name: String,
    fields: BTreeMap<String, FieldDef>,
    key_fields: Vec<String>,
    config: KeyConfig,
}

impl CompiledSchema {
    /// Compiles field declarations against `registry`.
    ///
    /// # Errors
    ///
    /// - [`ModelError::InvalidModel`] if `name` is blank
    /// - [`ModelError::InvalidArrayDefinition`] for a sequence whose length is not 1
    /// - [`ModelError::InvalidType`] if a type expression does not resolve
    /// - [`ModelError::DuplicateField`] if two declarations share a name
    /// - [`ModelError::NoPrimaryKey`] if no field carries the key sigil
    pub fn compile<I, K, S>(
        name: &str,
        specs: I,
        registry: &TypeRegistry,
        config: KeyConfig,
    ) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (K, S)>,
        K: AsRef<str>,
        S: Into<FieldSpec>,
    {
        if name.trim().is_empty() {
            return Err(ModelError::InvalidModel);
        }

        let mut fields = BTreeMap::new();
        for (declared, spec) in specs {
            let declared = declared.as_ref();
            let (field_name, is_key) = match declared.strip_prefix(config.key_sigil) {
                Some(stripped) => (stripped.to_string(), true),
                None => (declared.to_string(), false),
            };

            let (source, is_collection) = match spec.into() {
                FieldSpec::Type(expr) => (expr, false),
                FieldSpec::Sequence(mut elements) => {
                    if elements.len() != 1 {
                        return Err(ModelError::InvalidArrayDefinition { field: field_name });
                    }
                    (elements.remove(0), true)
                }
            };

            let expr = registry
                .compile(&source)
                .map_err(|_| ModelError::InvalidType {
                    field: field_name.clone(),
                    expr: source.clone(),
                })?;

            if fields.contains_key(&field_name) {
                return Err(ModelError::DuplicateField { field: field_name });
            }
            fields.insert(
                field_name.clone(),
                FieldDef {
                    name: field_name,
                    expr,
                    is_key,
                    is_collection,
                },
            );
        }

        let key_fields: Vec<String> = fields
            .values()
            .filter(|f| f.is_key)
            .map(|f| f.name.clone())
            .collect();
        if key_fields.is_empty() {
            return Err(ModelError::NoPrimaryKey {
                model: name.to_string(),
            });
        }

        debug!(
            "Model defined: {} (fields: {:?}, key: {:?})",
            name,
            fields.keys().collect::<Vec<_>>(),
            key_fields
        );

        Ok(Self {
            name: name.to_string(),
            fields,
            key_fields,
            config,
        })
    }

    /// Compiles a schema declared as a JSON object of field specs.
    pub fn from_json(
        name: &str,
        specs: &Value,
        registry: &TypeRegistry,
        config: KeyConfig,
    ) -> ModelResult<Self> {
        let specs: BTreeMap<String, FieldSpec> = serde_json::from_value(specs.clone())?;
        Self::compile(name, specs, registry, config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    pub(crate) fn key_field_names(&self) -> &[String] {
        &self.key_fields
    }
}
