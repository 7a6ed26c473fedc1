//! Blacklist and visit log storage.
//!
//! The engine only sees the [`VisitorStore`] trait; the process builds one
//! store at startup and shares it by `Arc`.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage write failed: {0}")]
    WriteFailed(String),
}

/// A permanently restricted IP address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    pub id: u64,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a blacklist upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upsert {
    /// No entry existed; this call created it
    Created(BlacklistEntry),
    /// An entry already existed and was left untouched
    Existing(BlacklistEntry),
}

impl Upsert {
    pub fn entry(&self) -> &BlacklistEntry {
        match self {
            Upsert::Created(entry) | Upsert::Existing(entry) => entry,
        }
    }

    pub fn into_entry(self) -> BlacklistEntry {
        match self {
            Upsert::Created(entry) | Upsert::Existing(entry) => entry,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, Upsert::Created(_))
    }
}

/// A visit log record before the store assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVisitorLog {
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub is_bot: bool,
    pub parameters: Option<String>,
    pub redirected_to: String,
}

/// One classification decision as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorLogEntry {
    pub id: u64,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub is_bot: bool,
    pub parameters: Option<String>,
    pub redirected_to: String,
    pub timestamp: DateTime<Utc>,
}

/// Storage used by the redirect engine.
#[async_trait]
pub trait VisitorStore: Send + Sync {
    /// Whether `ip` has a blacklist entry.
    async fn is_blacklisted(&self, ip: &str) -> Result<bool, StoreError>;

    /// Insert a blacklist entry for `ip` unless one exists.
    ///
    /// The existence check and the insert are a single atomic step, so
    /// concurrent callers for the same key see exactly one `Created`.
    async fn blacklist(&self, ip: &str, user_agent: Option<&str>) -> Result<Upsert, StoreError>;

    /// Append a visit record, assigning a fresh id and timestamp.
    async fn append_log(&self, entry: NewVisitorLog) -> Result<VisitorLogEntry, StoreError>;

    /// All blacklist entries, ordered by id.
    async fn blacklist_entries(&self) -> Result<Vec<BlacklistEntry>, StoreError>;

    /// All visit records, ordered by id.
    async fn visit_logs(&self) -> Result<Vec<VisitorLogEntry>, StoreError>;
}
