//! Key/value contracts for the two cache tiers.
//!
//! The ephemeral tier is a memcache-style byte cache with expirations,
//! add-if-absent and compare-and-swap. The durable tier is a keyed record
//! store partitioned by [`EntityKind`]. Values are opaque bytes in both; the
//! [`CacheManager`](crate::cache::CacheManager) owns serialization.

use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::{MemoryCache, MemoryStore};

/// A live ephemeral value with the token that identifies this write.
///
/// Every store of a key gets a fresh `cas` token, even when the bytes are the
/// same as before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheItem {
    /// Stored bytes.
    pub value: Vec<u8>,
    /// Compare-and-swap token for [`EphemeralStore::compare_and_swap`].
    pub cas: u64,
}

/// Result of [`EphemeralStore::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The key was absent and now holds the value.
    Added,
    /// A live value was already stored; nothing changed.
    AlreadyPresent,
}

/// Result of [`EphemeralStore::compare_and_swap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The observed write was still current and was replaced.
    Swapped,
    /// The key was written again since it was observed.
    Conflict,
    /// Nothing is stored under the key (never set, or expired).
    NotStored,
}

/// Fast, lossy cache tier.
#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Live value for `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<CacheItem>>;

    /// Unconditionally store `value` for `ttl`.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Store every item with the same expiration.
    async fn set_multi(&self, items: Vec<(String, Vec<u8>)>, ttl: Duration) -> Result<()>;

    /// Store `value` only if no live value exists.
    async fn add(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<AddOutcome>;

    /// Replace the stored value only if the write identified by `cas` is
    /// still the current one.
    async fn compare_and_swap(
        &self,
        key: &str,
        cas: u64,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<CasOutcome>;

    /// Remove keys; missing keys are ignored.
    async fn delete_multi(&self, keys: &[String]) -> Result<()>;
}

/// Record kinds kept in the durable tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Full documentation records.
    Doc,
    /// Index records.
    Package,
}

impl EntityKind {
    /// Stable name used for directories and logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Doc => "doc",
            Self::Package => "package",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative record tier.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Stored record for `key`, if any.
    async fn get(&self, kind: EntityKind, key: &str) -> Result<Option<Vec<u8>>>;

    /// Create or replace the record for `key`.
    async fn put(&self, kind: EntityKind, key: &str, value: Vec<u8>) -> Result<()>;

    /// Remove the record for `key`. Returns whether one existed.
    async fn delete(&self, kind: EntityKind, key: &str) -> Result<bool>;

    /// All records whose key starts with `prefix`, ordered by key.
    async fn list(&self, kind: EntityKind, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}
