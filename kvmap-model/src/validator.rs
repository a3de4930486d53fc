//! Instance validation against a compiled schema.

use crate::error::{ModelError, ModelResult};
use crate::schema::CompiledSchema;
use serde_json::{Map, Value};
use tracing::debug;

static NULL: Value = Value::Null;

impl CompiledSchema {
    /// Returns the first field (in name order) whose value fails its type.
    /// Absent fields are checked as null.
    pub fn first_invalid_field(&self, values: &Map<String, Value>) -> Option<&str> {
        self.fields()
            .find(|field| {
                let value = values.get(field.name()).unwrap_or(&NULL);
                !field.validate(value)
            })
            .map(|field| field.name())
    }

    /// Validates `values`, failing with [`ModelError::InvalidValue`] on the
    /// first offending field.
    pub fn validate(&self, values: &Map<String, Value>) -> ModelResult<()> {
        match self.first_invalid_field(values) {
            None => Ok(()),
            Some(field) => {
                debug!(
                    "Invalid value for {}.{}: {:?}",
                    self.name(),
                    field,
                    values.get(field)
                );
                Err(ModelError::InvalidValue {
                    field: field.to_string(),
                    model: self.name().to_string(),
                })
            }
        }
    }

    pub fn is_valid(&self, values: &Map<String, Value>) -> bool {
        self.first_invalid_field(values).is_none()
    }
}
