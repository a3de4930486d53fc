//! Batched key-value client abstraction.
//!
//! The mapping engine never talks to a store directly. It builds a [`Batch`]
//! of commands and hands it to a [`KeyValueClient`], which runs the whole
//! batch in one round trip and returns one [`Reply`] per command, in
//! enqueue order.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors a client reports for a whole batch.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not reach the store.
    #[error("connection error: {0}")]
    Connection(String),

    /// The store refused to run the batch.
    #[error("command error: {0}")]
    Command(String),

    /// The client returned a reply list that does not line up with the batch.
    #[error("expected {expected} replies, got {actual}")]
    ReplyCount { expected: usize, actual: usize },

    #[error("client closed")]
    Closed,
}

/// Time-to-live attached to a written key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// `PX`: milliseconds.
    Millis(u64),
    /// `EX`: seconds.
    Seconds(u64),
}

impl Expiry {
    pub fn as_duration(&self) -> Duration {
        match self {
            Expiry::Millis(ms) => Duration::from_millis(*ms),
            Expiry::Seconds(s) => Duration::from_secs(*s),
        }
    }
}

/// One command of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read a scalar value.
    Get { key: String },
    /// Read all members of a set.
    SMembers { key: String },
    /// Write a scalar value, optionally with a TTL.
    Set {
        key: String,
        value: String,
        expiry: Option<Expiry>,
    },
    /// Add one member to a set.
    SAdd { key: String, member: String },
    /// Attach a TTL to an existing key.
    Expire { key: String, expiry: Expiry },
    Del { key: String },
}

impl Command {
    pub fn key(&self) -> &str {
        match self {
            Command::Get { key }
            | Command::SMembers { key }
            | Command::Set { key, .. }
            | Command::SAdd { key, .. }
            | Command::Expire { key, .. }
            | Command::Del { key } => key,
        }
    }

    /// The store command name, e.g. `SMEMBERS` or `PEXPIRE`.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Get { .. } => "GET",
            Command::SMembers { .. } => "SMEMBERS",
            Command::Set { .. } => "SET",
            Command::SAdd { .. } => "SADD",
            Command::Expire {
                expiry: Expiry::Millis(_),
                ..
            } => "PEXPIRE",
            Command::Expire {
                expiry: Expiry::Seconds(_),
                ..
            } => "EXPIRE",
            Command::Del { .. } => "DEL",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name(), self.key())?;
        match self {
            Command::Set { value, expiry, .. } => {
                write!(f, " {value}")?;
                match expiry {
                    Some(Expiry::Millis(ms)) => write!(f, " PX {ms}"),
                    Some(Expiry::Seconds(s)) => write!(f, " EX {s}"),
                    None => Ok(()),
                }
            }
            Command::SAdd { member, .. } => write!(f, " {member}"),
            Command::Expire {
                expiry: Expiry::Millis(n) | Expiry::Seconds(n),
                ..
            } => write!(f, " {n}"),
            _ => Ok(()),
        }
    }
}

/// An ordered list of commands executed atomically by a client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn get(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::Get { key: key.into() })
    }

    pub fn smembers(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::SMembers { key: key.into() })
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.set_with_expiry(key, value, None)
    }

    pub fn set_with_expiry(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        expiry: Option<Expiry>,
    ) -> &mut Self {
        self.push(Command::Set {
            key: key.into(),
            value: value.into(),
            expiry,
        })
    }

    pub fn sadd(&mut self, key: impl Into<String>, member: impl Into<String>) -> &mut Self {
        self.push(Command::SAdd {
            key: key.into(),
            member: member.into(),
        })
    }

    pub fn expire(&mut self, key: impl Into<String>, expiry: Expiry) -> &mut Self {
        self.push(Command::Expire {
            key: key.into(),
            expiry,
        })
    }

    pub fn del(&mut self, key: impl Into<String>) -> &mut Self {
        self.push(Command::Del { key: key.into() })
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// The store's answer to one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Key does not exist.
    Nil,
    Ok,
    Integer(i64),
    /// A scalar value.
    Bulk(String),
    /// Set members, in no particular order.
    Members(Vec<String>),
    /// The command failed on its own (e.g. `WRONGTYPE`); the rest of the
    /// batch still ran.
    Error(String),
}

impl Reply {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::Bulk(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_members(&self) -> Option<&[String]> {
        match self {
            Reply::Members(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

/// A key-value store that executes command batches atomically.
///
/// Implementations must return exactly one reply per command, in the order
/// the commands were enqueued. "Atomic" means no other client observes a
/// partial batch; it does not imply rollback of earlier commands when a
/// later one fails.
#[async_trait]
pub trait KeyValueClient: Send + Sync {
    /// Opens a new, empty batch.
    fn multi(&self) -> Batch {
        Batch::new()
    }

    /// Executes a batch in a single round trip.
    async fn exec(&self, batch: Batch) -> ClientResult<Vec<Reply>>;
}
