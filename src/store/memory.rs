//! In-process store. State lives for the lifetime of the process.

use super::{BlacklistEntry, NewVisitorLog, StoreError, Upsert, VisitorLogEntry, VisitorStore};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// `DashMap`-backed blacklist and visit log.
pub struct MemoryStore {
    /// Blacklist keyed by IP address
    blacklist: DashMap<String, BlacklistEntry>,
    /// Visit log keyed by id
    logs: DashMap<u64, VisitorLogEntry>,
    /// Next blacklist id
    blacklist_seq: AtomicU64,
    /// Next visit log id
    log_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            blacklist: DashMap::new(),
            logs: DashMap::new(),
            blacklist_seq: AtomicU64::new(1),
            log_seq: AtomicU64::new(1),
        }
    }

    /// Number of blacklisted addresses.
    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }

    /// Number of visit records.
    pub fn log_len(&self) -> usize {
        self.logs.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisitorStore for MemoryStore {
    async fn is_blacklisted(&self, ip: &str) -> Result<bool, StoreError> {
        Ok(self.blacklist.contains_key(ip))
    }

    async fn blacklist(&self, ip: &str, user_agent: Option<&str>) -> Result<Upsert, StoreError> {
        // The shard lock is held across the check and the insert.
        match self.blacklist.entry(ip.to_string()) {
            Entry::Occupied(existing) => Ok(Upsert::Existing(existing.get().clone())),
            Entry::Vacant(slot) => {
                let entry = BlacklistEntry {
                    id: self.blacklist_seq.fetch_add(1, Ordering::Relaxed),
                    ip_address: ip.to_string(),
                    user_agent: user_agent.map(str::to_string),
                    created_at: Utc::now(),
                };
                slot.insert(entry.clone());
                Ok(Upsert::Created(entry))
            }
        }
    }

    async fn append_log(&self, entry: NewVisitorLog) -> Result<VisitorLogEntry, StoreError> {
        let stored = VisitorLogEntry {
            id: self.log_seq.fetch_add(1, Ordering::Relaxed),
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            is_bot: entry.is_bot,
            parameters: entry.parameters,
            redirected_to: entry.redirected_to,
            timestamp: Utc::now(),
        };
        self.logs.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn blacklist_entries(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        let mut entries: Vec<_> = self.blacklist.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn visit_logs(&self) -> Result<Vec<VisitorLogEntry>, StoreError> {
        let mut entries: Vec<_> = self.logs.iter().map(|e| e.value().clone()).collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }
}
