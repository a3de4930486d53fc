//! Store key derivation.
//!
//! An instance's key prefix is `<model>:<v1>__<v2>...:` where the values are
//! taken from the key fields in name order, so every process derives the
//! same prefix regardless of declaration order. Each field then lives at
//! `<prefix><field>`.

use crate::schema::CompiledSchema;
use kvmap_types::key_segment;
use serde_json::{Map, Value};
use tracing::debug;

impl CompiledSchema {
    /// Key field names, sorted.
    pub fn key_fields(&self) -> &[String] {
        self.key_field_names()
    }

    /// Derives the key prefix from the key field values in `values`.
    ///
    /// A missing or null key value contributes an empty segment. The result
    /// is still a well-formed key; it just will not match a stored entity.
    pub fn derive_key(&self, values: &Map<String, Value>) -> String {
        let config = self.config();
        let parts: Vec<String> = self
            .key_fields()
            .iter()
            .map(|field| {
                let value = values.get(field);
                if is_missing(value) {
                    debug!("No key \"{}\" specified for model {}", field, self.name());
                }
                key_segment(value)
            })
            .collect();

        format!(
            "{name}{delim}{joined}{delim}",
            name = self.name(),
            delim = config.segment_delimiter,
            joined = parts.join(&config.key_joiner),
        )
    }

    /// The store key of one field under `prefix`.
    pub fn field_key(&self, prefix: &str, field: &str) -> String {
        format!("{prefix}{field}")
    }
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}
