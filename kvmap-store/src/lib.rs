//! Object mapping onto a batched key-value store.
//!
//! A [`Model`] projects each field of an instance onto its own store key:
//!
//! - scalar fields → `SET <model>:<key values>:<field> <value>`
//! - collection fields → `SADD` into a set at the same kind of key
//!
//! Every operation on an instance is a single batch, executed atomically by
//! a [`KeyValueClient`]. Loads that find nothing valid resolve to `None`
//! rather than an error.
//!
//! # Example
//!
//! ```
//! use kvmap_store::{Mapper, MemoryStore, SaveOptions};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run() -> kvmap_store::ModelResult<()> {
//! let mapper = Mapper::new(Arc::new(MemoryStore::new()));
//! let vehicle = mapper.define_model_json(
//!     "vehicle",
//!     &json!({ "$id": "number", "manufacturer": "string", "colors": ["string"] }),
//! )?;
//!
//! let tesla = vehicle.create(json!({ "id": 7, "manufacturer": "Tesla", "colors": ["red"] }))?;
//! tesla.save_with(SaveOptions::px(60_000)).await?;
//!
//! let loaded = vehicle.get(&json!({ "id": 7 })).await?;
//! assert!(loaded.is_some());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod mapping;
mod memory;
mod model;

pub use client::{Batch, ClientError, ClientResult, Command, Expiry, KeyValueClient, Reply};
pub use memory::MemoryStore;
pub use model::{Instance, Mapper, Model, SaveOptions};

pub use kvmap_model::{CompiledSchema, FieldDef, FieldSpec, KeyConfig, ModelError, ModelResult};
pub use kvmap_types::{register_type, PrimitiveKind, TypeRegistry};
