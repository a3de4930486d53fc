//! In-process key-value store.
//!
//! Implements the command subset used by the mapping engine with Redis
//! semantics. Each batch runs under a single lock, so it is atomic with
//! respect to other batches. Expiry is lazy and measured with
//! `tokio::time::Instant`, which lets tests drive it with a paused clock.

use crate::client::{Batch, ClientResult, Command, KeyValueClient, Reply};
use async_trait::async_trait;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug)]
enum Stored {
    Scalar(String),
    Set(BTreeSet<String>),
}

#[derive(Debug)]
struct Entry {
    value: Stored,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A `KeyValueClient` backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.values().filter(|e| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Returns true if `key` exists and has not expired.
    pub async fn contains_key(&self, key: &str) -> bool {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.get(key).is_some_and(|e| !e.is_expired(now))
    }

    /// Live keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueClient for MemoryStore {
    async fn exec(&self, batch: Batch) -> ClientResult<Vec<Reply>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| !entry.is_expired(now));

        let replies = batch
            .into_commands()
            .into_iter()
            .map(|command| {
                trace!("{}", command);
                apply(&mut entries, command, now)
            })
            .collect();
        Ok(replies)
    }
}

fn apply(entries: &mut HashMap<String, Entry>, command: Command, now: Instant) -> Reply {
    match command {
        Command::Get { key } => match entries.get(&key).map(|e| &e.value) {
            None => Reply::Nil,
            Some(Stored::Scalar(value)) => Reply::Bulk(value.clone()),
            Some(Stored::Set(_)) => Reply::Error(WRONGTYPE.to_string()),
        },
        Command::SMembers { key } => match entries.get(&key).map(|e| &e.value) {
            None => Reply::Members(Vec::new()),
            Some(Stored::Set(members)) => Reply::Members(members.iter().cloned().collect()),
            Some(Stored::Scalar(_)) => Reply::Error(WRONGTYPE.to_string()),
        },
        Command::Set { key, value, expiry } => {
            entries.insert(
                key,
                Entry {
                    value: Stored::Scalar(value),
                    expires_at: expiry.map(|e| now + e.as_duration()),
                },
            );
            Reply::Ok
        }
        Command::SAdd { key, member } => match entries.entry(key) {
            MapEntry::Vacant(slot) => {
                slot.insert(Entry {
                    value: Stored::Set(BTreeSet::from([member])),
                    expires_at: None,
                });
                Reply::Integer(1)
            }
            MapEntry::Occupied(mut slot) => match &mut slot.get_mut().value {
                Stored::Set(members) => Reply::Integer(i64::from(members.insert(member))),
                Stored::Scalar(_) => Reply::Error(WRONGTYPE.to_string()),
            },
        },
        Command::Expire { key, expiry } => match entries.get_mut(&key) {
            Some(entry) => {
                entry.expires_at = Some(now + expiry.as_duration());
                Reply::Integer(1)
            }
            None => Reply::Integer(0),
        },
        Command::Del { key } => Reply::Integer(i64::from(entries.remove(&key).is_some())),
    }
}
