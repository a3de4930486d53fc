//! Key layout configuration.

use serde::{Deserialize, Serialize};

/// Controls how key fields are declared and how store keys are laid out.
///
/// With the defaults, a `vehicle` keyed by `date` and `line` stores its
/// `model` field under `vehicle:1400000000__X2:model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Prefix marking a declared field as part of the primary key.
    pub key_sigil: char,
    /// Joins key field values inside the prefix.
    pub key_joiner: String,
    /// Separates the model name, the joined key and the field name.
    pub segment_delimiter: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            key_sigil: '$',
            key_joiner: "__".to_string(),
            segment_delimiter: ":".to_string(),
        }
    }
}
