//! Locally cached blacklist flag.

use dashmap::DashMap;
use std::io;
use std::path::PathBuf;

/// Value written under the storage key when the visitor is flagged.
pub const FLAG_VALUE: &str = "blacklisted";

/// What the client currently believes about its own blacklist status.
///
/// Ordered: the flag only ever moves up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LocalFlag {
    /// Nothing stored
    #[default]
    Unknown,
    /// Set locally (direct visit, or loaded from storage) without server confirmation
    Suspected,
    /// Server reported the visitor as blacklisted
    Confirmed,
}

impl LocalFlag {
    /// Whether the client enforces the blacklist.
    pub fn is_flagged(self) -> bool {
        self != LocalFlag::Unknown
    }

    /// Flag implied by a stored value.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some(FLAG_VALUE) => LocalFlag::Suspected,
            _ => LocalFlag::Unknown,
        }
    }
}

/// Durable key/value storage for the flag.
pub trait FlagStorage: Send + Sync {
    fn load(&self, key: &str) -> io::Result<Option<String>>;

    fn store(&self, key: &str, value: &str) -> io::Result<()>;
}

/// Process-local storage, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryFlagStorage {
    values: DashMap<String, String>,
}

impl MemoryFlagStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with the flag, as left behind by an earlier session.
    pub fn flagged(key: &str) -> Self {
        let storage = Self::new();
        storage.values.insert(key.to_string(), FLAG_VALUE.to_string());
        storage
    }
}

impl FlagStorage for MemoryFlagStorage {
    fn load(&self, key: &str) -> io::Result<Option<String>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    fn store(&self, key: &str, value: &str) -> io::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileFlagStorage {
    dir: PathBuf,
}

impl FileFlagStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl FlagStorage for FileFlagStorage {
    fn load(&self, key: &str) -> io::Result<Option<String>> {
        match std::fs::read_to_string(self.dir.join(key)) {
            Ok(content) => Ok(Some(content.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, key: &str, value: &str) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.dir.join(key), value)
    }
}
