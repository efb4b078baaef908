use super::{AddOutcome, CacheItem, CasOutcome, DurableStore, EntityKind, EphemeralStore};
use crate::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    cas: u64,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Entry>,
    last_cas: u64,
}

impl Entries {
    fn insert(&mut self, key: String, value: Vec<u8>, ttl: Duration) {
        self.last_cas += 1;
        let entry = Entry {
            value,
            cas: self.last_cas,
            expires_at: Instant::now() + ttl,
        };
        self.map.insert(key, entry);
    }

    fn live(&self, key: &str) -> Option<&Entry> {
        self.map.get(key).filter(|e| e.is_live())
    }

    fn sweep(&mut self) {
        self.map.retain(|_, e| e.is_live());
    }
}

/// In-process ephemeral tier.
///
/// Expirations follow the tokio clock, so tests can advance time with
/// `tokio::time::advance` under a paused runtime. Expired entries are dropped
/// when read and swept on every `add` and `set_multi`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, live or not yet swept.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.map.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.map.is_empty()
    }
}

#[async_trait]
impl EphemeralStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<CacheItem>> {
        let mut entries = self.entries.lock().await;
        match entries.map.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(CacheItem {
                value: entry.value.clone(),
                cas: entry.cas,
            })),
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.entries.lock().await.insert(key.to_string(), value, ttl);
        Ok(())
    }

    async fn set_multi(&self, items: Vec<(String, Vec<u8>)>, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.sweep();
        for (key, value) in items {
            entries.insert(key, value, ttl);
        }
        Ok(())
    }

    async fn add(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<AddOutcome> {
        let mut entries = self.entries.lock().await;
        entries.sweep();
        if entries.live(key).is_some() {
            return Ok(AddOutcome::AlreadyPresent);
        }
        entries.insert(key.to_string(), value, ttl);
        Ok(AddOutcome::Added)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        cas: u64,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<CasOutcome> {
        let mut entries = self.entries.lock().await;
        match entries.live(key).map(|e| e.cas) {
            None => Ok(CasOutcome::NotStored),
            Some(current) if current != cas => Ok(CasOutcome::Conflict),
            Some(_) => {
                entries.insert(key.to_string(), value, ttl);
                Ok(CasOutcome::Swapped)
            },
        }
    }

    async fn delete_multi(&self, keys: &[String]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.map.remove(key);
        }
        Ok(())
    }
}

/// In-process durable tier, mainly for tests and one-shot tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<(EntityKind, String), Vec<u8>>>,
    writes: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` and `delete` calls that changed the store.
    pub fn writes(&self) -> usize {
        self.writes.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, kind: EntityKind, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .records
            .read()
            .await
            .get(&(kind, key.to_string()))
            .cloned())
    }

    async fn put(&self, kind: EntityKind, key: &str, value: Vec<u8>) -> Result<()> {
        self.records
            .write()
            .await
            .insert((kind, key.to_string()), value);
        self.record_write();
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, key: &str) -> Result<bool> {
        let existed = self
            .records
            .write()
            .await
            .remove(&(kind, key.to_string()))
            .is_some();
        if existed {
            self.record_write();
        }
        Ok(existed)
    }

    async fn list(&self, kind: EntityKind, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let records = self.records.read().await;
        Ok(records
            .range((kind, prefix.to_string())..)
            .take_while(|((k, key), _)| *k == kind && key.starts_with(prefix))
            .map(|((_, key), value)| (key.clone(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const TTL: Duration = Duration::from_secs(60);

    fn value(item: Option<CacheItem>) -> Option<Vec<u8>> {
        item.map(|i| i.value)
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache.set("k", b"v".to_vec(), TTL).await?;
        assert_eq!(value(cache.get("k").await?), Some(b"v".to_vec()));

        tokio::time::advance(TTL).await;
        assert_eq!(cache.get("k").await?, None);
        assert!(cache.is_empty().await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_only_when_absent_or_expired() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        assert_eq!(cache.add("k", b"1".to_vec(), TTL).await?, AddOutcome::Added);
        assert_eq!(cache.add("k", b"2".to_vec(), TTL).await?, AddOutcome::AlreadyPresent);
        assert_eq!(value(cache.get("k").await?), Some(b"1".to_vec()));

        tokio::time::advance(TTL + Duration::from_secs(1)).await;
        assert_eq!(cache.add("k", b"3".to_vec(), TTL).await?, AddOutcome::Added);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_compare_and_swap_outcomes() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        assert_eq!(
            cache.compare_and_swap("k", 1, b"new".to_vec(), TTL).await?,
            CasOutcome::NotStored
        );

        cache.set("k", b"old".to_vec(), TTL).await?;
        let old = cache.get("k").await?.unwrap();
        assert_eq!(
            cache.compare_and_swap("k", old.cas + 1, b"new".to_vec(), TTL).await?,
            CasOutcome::Conflict
        );
        assert_eq!(
            cache.compare_and_swap("k", old.cas, b"new".to_vec(), TTL).await?,
            CasOutcome::Swapped
        );
        let new = cache.get("k").await?.unwrap();
        assert_eq!(new.value, b"new".to_vec());
        assert_ne!(new.cas, old.cas);

        tokio::time::advance(TTL).await;
        assert_eq!(
            cache.compare_and_swap("k", new.cas, b"newer".to_vec(), TTL).await?,
            CasOutcome::NotStored
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_rewriting_same_bytes_invalidates_token() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache.set("k", vec![0], TTL).await?;
        let seen = cache.get("k").await?.unwrap();

        cache.set_multi(vec![("k".to_string(), vec![0])], TTL).await?;
        assert_eq!(
            cache.compare_and_swap("k", seen.cas, b"late".to_vec(), TTL).await?,
            CasOutcome::Conflict
        );
        assert_eq!(value(cache.get("k").await?), Some(vec![0]));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_sweep_expired_entries() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        let short = Duration::from_secs(1);
        cache
            .set_multi(
                vec![("proj:a".to_string(), vec![0]), ("proj:b".to_string(), vec![0])],
                short,
            )
            .await?;
        cache.set("kept", b"v".to_vec(), TTL).await?;

        tokio::time::advance(short).await;
        cache.set_multi(vec![("pkglist".to_string(), vec![0])], short).await?;
        assert_eq!(cache.len().await, 2);

        tokio::time::advance(short).await;
        cache.add("other", b"v".to_vec(), TTL).await?;
        assert_eq!(cache.len().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_adds_store_one_value() -> anyhow::Result<()> {
        let cache = Arc::new(MemoryCache::new());
        let tasks: Vec<_> = (0..8u8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.add("race", vec![i], TTL).await })
            })
            .collect();

        let mut added = 0;
        for task in tasks {
            if task.await?? == AddOutcome::Added {
                added += 1;
            }
        }
        assert_eq!(added, 1);
        assert_eq!(cache.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_store_lists_by_prefix_within_kind() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.put(EntityKind::Package, "a.org/x", b"1".to_vec()).await?;
        store.put(EntityKind::Package, "a.org/x/y", b"2".to_vec()).await?;
        store.put(EntityKind::Package, "a.org/xz", b"3".to_vec()).await?;
        store.put(EntityKind::Doc, "a.org/x/doc", b"4".to_vec()).await?;

        let keys: Vec<_> = store
            .list(EntityKind::Package, "a.org/x/")
            .await?
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["a.org/x/y"]);

        assert!(store.delete(EntityKind::Package, "a.org/x").await?);
        assert!(!store.delete(EntityKind::Package, "a.org/x").await?);
        assert_eq!(store.writes(), 5);
        Ok(())
    }
}
