//! Translation between model instances and store command batches.
//!
//! Every field of an instance lives at its own key, `<prefix><field>`:
//! scalars as plain string values, collections as sets. Commands are issued
//! in schema field order and replies are matched back to fields by
//! position.

use crate::client::{Batch, ClientError, Command, Expiry, KeyValueClient, Reply};
use kvmap_model::{CompiledSchema, ModelError, ModelResult};
use kvmap_types::stringify;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Builds the read batch for the entity at `prefix`: `SMEMBERS` for each
/// collection field, `GET` for each scalar.
pub fn load_commands(schema: &CompiledSchema, prefix: &str) -> Batch {
    let mut batch = Batch::new();
    for field in schema.fields() {
        let key = schema.field_key(prefix, field.name());
        if field.is_collection() {
            batch.smembers(key);
        } else {
            batch.get(key);
        }
    }
    batch
}

/// Parses the replies of a [`load_commands`] batch into a value map.
///
/// Returns `None` when a collection field's reply is not a member list; the
/// whole entity is then treated as not found. Unparseable scalars become
/// null and are left for validation to reject.
pub fn parse_replies(schema: &CompiledSchema, replies: &[Reply]) -> Option<Map<String, Value>> {
    let mut values = Map::new();
    for (field, reply) in schema.fields().zip(replies) {
        let value = if field.is_collection() {
            match reply.as_members() {
                Some(members) => field.parse_members(members),
                None => {
                    warn!(
                        "Received {:?} for {}.{} but a member list was expected",
                        reply,
                        schema.name(),
                        field.name()
                    );
                    return None;
                }
            }
        } else {
            match reply {
                Reply::Bulk(raw) => field.parse_scalar(Some(raw.as_str())),
                Reply::Integer(n) => field.parse_scalar(Some(n.to_string().as_str())),
                Reply::Error(message) => {
                    warn!("Read of {}.{} failed: {}", schema.name(), field.name(), message);
                    Value::Null
                }
                _ => Value::Null,
            }
        };
        values.insert(field.name().to_string(), value);
    }
    Some(values)
}

/// Builds the write batch for `values` at `prefix`.
///
/// Scalars carry the expiry inline on `SET`. Set members cannot, so each
/// collection's `SADD`s are followed by one `PEXPIRE`/`EXPIRE` on its key.
pub fn save_commands(
    schema: &CompiledSchema,
    prefix: &str,
    values: &Map<String, Value>,
    expiry: Option<Expiry>,
) -> Batch {
    let mut batch = Batch::new();
    for field in schema.fields() {
        let key = schema.field_key(prefix, field.name());
        let value = values.get(field.name()).unwrap_or(&Value::Null);

        if field.is_collection() {
            for member in value.as_array().into_iter().flatten() {
                batch.sadd(key.as_str(), stringify(member));
            }
            if let Some(expiry) = expiry {
                batch.expire(key, expiry);
            }
        } else {
            batch.set_with_expiry(key, stringify(value), expiry);
        }
    }
    batch
}

/// Builds the delete batch for the entity at `prefix`.
pub fn remove_commands(schema: &CompiledSchema, prefix: &str) -> Batch {
    let mut batch = Batch::new();
    for field in schema.fields() {
        batch.del(schema.field_key(prefix, field.name()));
    }
    batch
}

/// Pairs each command with the per-command error it was answered with.
/// The rest of a batch still runs when one command fails, so callers use
/// this to report writes that did not land.
pub fn command_errors<'a>(
    commands: &'a [Command],
    replies: &'a [Reply],
) -> Vec<(&'a Command, &'a str)> {
    commands
        .iter()
        .zip(replies)
        .filter_map(|(command, reply)| match reply {
            Reply::Error(message) => Some((command, message.as_str())),
            _ => None,
        })
        .collect()
}

/// Runs a batch and checks that the replies line up with its commands.
pub async fn execute(client: &dyn KeyValueClient, batch: Batch) -> ModelResult<Vec<Reply>> {
    let expected = batch.len();
    debug!(
        "Executing batch: [{}]",
        batch
            .commands()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );

    let replies = client.exec(batch).await.map_err(ModelError::store)?;
    if replies.len() != expected {
        return Err(ModelError::store(ClientError::ReplyCount {
            expected,
            actual: replies.len(),
        }));
    }
    Ok(replies)
}
