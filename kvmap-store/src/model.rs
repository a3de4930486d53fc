//! Public model API: define models, create, load, save and remove instances.

use crate::client::{Expiry, KeyValueClient};
use crate::mapping;
use kvmap_model::{CompiledSchema, FieldSpec, KeyConfig, ModelResult};
use kvmap_types::TypeRegistry;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-call expiry for [`Instance::save_with`].
///
/// Deserializes from `{"PX": 200}` or `{"EX": 10}`. When both are set, `PX`
/// wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOptions {
    #[serde(rename = "PX", default, skip_serializing_if = "Option::is_none")]
    pub px: Option<u64>,
    #[serde(rename = "EX", default, skip_serializing_if = "Option::is_none")]
    pub ex: Option<u64>,
}

impl SaveOptions {
    /// Expire written keys after `millis` milliseconds.
    pub fn px(millis: u64) -> Self {
        Self {
            px: Some(millis),
            ex: None,
        }
    }

    /// Expire written keys after `seconds` seconds.
    pub fn ex(seconds: u64) -> Self {
        Self {
            px: None,
            ex: Some(seconds),
        }
    }

    /// The expiry to attach. A zero `PX` or `EX` counts as unset, so
    /// `{"PX": 0, "EX": 10}` expires after ten seconds.
    pub fn expiry(&self) -> Option<Expiry> {
        self.px
            .filter(|&ms| ms > 0)
            .map(Expiry::Millis)
            .or(self.ex.filter(|&s| s > 0).map(Expiry::Seconds))
    }
}

/// Entry point: binds a store client and a type registry, and defines
/// models against them.
#[derive(Clone)]
pub struct Mapper {
    client: Arc<dyn KeyValueClient>,
    registry: Arc<TypeRegistry>,
    config: KeyConfig,
}

impl Mapper {
    /// Creates a mapper using the shared type registry and the default key
    /// layout.
    pub fn new(client: Arc<dyn KeyValueClient>) -> Self {
        Self::with_registry(client, TypeRegistry::shared(), KeyConfig::default())
    }

    pub fn with_registry(
        client: Arc<dyn KeyValueClient>,
        registry: Arc<TypeRegistry>,
        config: KeyConfig,
    ) -> Self {
        Self {
            client,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &KeyConfig {
        &self.config
    }

    /// Compiles a model from `(declared name, spec)` pairs.
    pub fn define_model<I, K, S>(&self, name: &str, specs: I) -> ModelResult<Model>
    where
        I: IntoIterator<Item = (K, S)>,
        K: AsRef<str>,
        S: Into<FieldSpec>,
    {
        let schema = CompiledSchema::compile(name, specs, &self.registry, self.config.clone())?;
        Ok(Model::new(schema, self.client.clone()))
    }

    /// Compiles a model from a JSON object of field specs.
    pub fn define_model_json(&self, name: &str, specs: &Value) -> ModelResult<Model> {
        let schema =
            CompiledSchema::from_json(name, specs, &self.registry, self.config.clone())?;
        Ok(Model::new(schema, self.client.clone()))
    }
}

impl fmt::Debug for Mapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct ModelInner {
    schema: CompiledSchema,
    client: Arc<dyn KeyValueClient>,
}

/// A compiled schema bound to a store client. Cheap to clone.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    pub fn new(schema: CompiledSchema, client: Arc<dyn KeyValueClient>) -> Self {
        Self {
            inner: Arc::new(ModelInner { schema, client }),
        }
    }

    pub fn name(&self) -> &str {
        self.inner.schema.name()
    }

    pub fn schema(&self) -> &CompiledSchema {
        &self.inner.schema
    }

    /// Key field names, sorted.
    pub fn key_fields(&self) -> &[String] {
        self.inner.schema.key_fields()
    }

    /// The key prefix for the given key field values.
    pub fn key_for(&self, values: &Value) -> String {
        self.inner.schema.derive_key(&as_map(values))
    }

    /// Creates a validated instance from a JSON object.
    ///
    /// # Errors
    ///
    /// [`ModelError::InvalidValue`](kvmap_model::ModelError::InvalidValue) naming
    /// the first field that fails its type. A non-object is validated as an
    /// empty map.
    pub fn create(&self, values: Value) -> ModelResult<Instance> {
        match values {
            Value::Object(map) => self.create_from_map(map),
            _ => self.create_from_map(Map::new()),
        }
    }

    pub fn create_from_map(&self, values: Map<String, Value>) -> ModelResult<Instance> {
        self.inner.schema.validate(&values)?;
        debug!("Instance created: {} {:?}", self.name(), values);
        Ok(Instance {
            model: self.clone(),
            values,
        })
    }

    /// Loads the instance addressed by `key_values`.
    ///
    /// Resolves to `None` when nothing valid is stored at that key: missing,
    /// expired, or partially written entities all look the same.
    ///
    /// # Errors
    ///
    /// [`ModelError::Store`](kvmap_model::ModelError::Store) if the batch fails.
    pub async fn get(&self, key_values: &Value) -> ModelResult<Option<Instance>> {
        let schema = &self.inner.schema;
        let prefix = schema.derive_key(&as_map(key_values));
        let batch = mapping::load_commands(schema, &prefix);
        let replies = mapping::execute(self.inner.client.as_ref(), batch).await?;

        let Some(values) = mapping::parse_replies(schema, &replies) else {
            return Ok(None);
        };
        if let Some(field) = schema.first_invalid_field(&values) {
            debug!("No valid {} at {} (field {} failed)", self.name(), prefix, field);
            return Ok(None);
        }
        Ok(Some(Instance {
            model: self.clone(),
            values,
        }))
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("schema", &self.inner.schema)
            .finish_non_exhaustive()
    }
}

/// One record of a [`Model`].
///
/// Field values may be changed freely; they are re-validated on every save.
/// Removing an instance deletes its keys but leaves this value usable.
#[derive(Clone)]
pub struct Instance {
    model: Model,
    values: Map<String, Value>,
}

impl Instance {
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Replaces a field value, returning the previous one. Not validated
    /// until the next save.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(field.to_string(), value.into())
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }

    /// The key prefix derived from the current key field values.
    pub fn key(&self) -> String {
        self.model.schema().derive_key(&self.values)
    }

    /// Writes every field without expiry.
    pub async fn save(&self) -> ModelResult<&Self> {
        self.save_with(SaveOptions::default()).await
    }

    /// Writes every field, attaching the expiry from `options` to each key.
    ///
    /// # Errors
    ///
    /// - [`ModelError::InvalidValue`](kvmap_model::ModelError::InvalidValue)
    ///   if a field no longer passes its type; nothing is written
    /// - [`ModelError::Store`](kvmap_model::ModelError::Store) if the batch fails
    ///
    /// A single command answered with an error (e.g. `WRONGTYPE`) does not
    /// fail the save; it is logged at `warn` and the other fields still land.
    pub async fn save_with(&self, options: SaveOptions) -> ModelResult<&Self> {
        let schema = self.model.schema();
        schema.validate(&self.values)?;

        let prefix = self.key();
        debug!("Saving {} at {}", self.model_name(), prefix);
        let batch = mapping::save_commands(schema, &prefix, &self.values, options.expiry());
        let replies = mapping::execute(self.model.inner.client.as_ref(), batch.clone()).await?;
        for (command, message) in mapping::command_errors(batch.commands(), &replies) {
            warn!(
                "Save of {} at {} left `{}` unapplied: {}",
                self.model_name(),
                prefix,
                command,
                message
            );
        }
        Ok(self)
    }

    /// Deletes every field key of this instance.
    pub async fn remove(&self) -> ModelResult<()> {
        let schema = self.model.schema();
        let prefix = self.key();
        debug!("Removing {} at {}", self.model_name(), prefix);
        let batch = mapping::remove_commands(schema, &prefix);
        mapping::execute(self.model.inner.client.as_ref(), batch).await?;
        Ok(())
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("model", &self.model_name())
            .field("values", &self.values)
            .finish()
    }
}

impl Serialize for Instance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

fn as_map(values: &Value) -> Map<String, Value> {
    values.as_object().cloned().unwrap_or_default()
}
