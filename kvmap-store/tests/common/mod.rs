//! Shared test helpers for store tests.

#![allow(dead_code)]

use async_trait::async_trait;
use kvmap_store::{
    Batch, ClientError, ClientResult, KeyConfig, KeyValueClient, Mapper, MemoryStore, Model,
    Reply, TypeRegistry,
};
use serde_json::json;
use std::sync::{Arc, Mutex, Once};

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A `MemoryStore` that remembers every batch it executed.
#[derive(Default)]
pub struct RecordingClient {
    pub store: MemoryStore,
    batches: Mutex<Vec<Batch>>,
}

impl RecordingClient {
    pub fn batches(&self) -> Vec<Batch> {
        self.batches.lock().unwrap().clone()
    }

    pub fn last_batch(&self) -> Option<Batch> {
        self.batches.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl KeyValueClient for RecordingClient {
    async fn exec(&self, batch: Batch) -> ClientResult<Vec<Reply>> {
        self.batches.lock().unwrap().push(batch.clone());
        self.store.exec(batch).await
    }
}

/// Fails every batch with a connection error.
pub struct FailingClient;

#[async_trait]
impl KeyValueClient for FailingClient {
    async fn exec(&self, _batch: Batch) -> ClientResult<Vec<Reply>> {
        Err(ClientError::Connection("connection refused".into()))
    }
}

/// Answers every batch with a fixed reply list.
pub struct CannedClient(pub Vec<Reply>);

#[async_trait]
impl KeyValueClient for CannedClient {
    async fn exec(&self, _batch: Batch) -> ClientResult<Vec<Reply>> {
        Ok(self.0.clone())
    }
}

/// A mapper over `client` with its own registry.
pub fn mapper(client: Arc<dyn KeyValueClient>) -> Mapper {
    init_tracing();
    Mapper::with_registry(
        client,
        Arc::new(TypeRegistry::with_builtins()),
        KeyConfig::default(),
    )
}

pub fn vehicle(mapper: &Mapper) -> Model {
    mapper
        .define_model_json(
            "vehicle",
            &json!({
                "manufacturer": "string",
                "model": "string",
                "$date_of_production": "number",
                "$production_line": "string",
                "colors": ["string"],
            }),
        )
        .unwrap()
}

pub fn student(mapper: &Mapper) -> Model {
    mapper
        .define_model_json("student", &json!({"$name": "string", "teachers": ["string"]}))
        .unwrap()
}
