//! Two-tier cache manager.
//!
//! The ephemeral tier holds serialized documentation records and cached
//! package-list queries. The durable tier holds the authoritative
//! documentation records ([`EntityKind::Doc`]) and index records
//! ([`EntityKind::Package`]).
//!
//! Ephemeral keys go through `Missing -> Present -> Tombstoned -> Missing`.
//! Invalidation writes a one-byte tombstone with a short expiration instead of
//! deleting, and reads treat a tombstone as a miss. Writers that may race use
//! [`CacheManager::safe_set`], which never overwrites a write it did not
//! observe and never fails the losing writer.
//!
//! Durable records that no longer decode read as absent, the same as records
//! written under another [`PACKAGE_VERSION`].

use crate::config::CacheConfig;
use crate::path::is_standard_package;
use crate::projection::project;
use crate::store::{AddOutcome, CacheItem, CasOutcome, DurableStore, EntityKind, EphemeralStore};
use crate::types::{IndexRecord, PACKAGE_VERSION, Package};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Ephemeral value marking a key as recently invalidated.
pub const TOMBSTONE: &[u8] = &[0];

/// Cache key of the listing of all visible packages.
pub const PACKAGE_LIST_KEY: &str = "pkglist";

/// Prefix of cache keys holding the packages of one project.
pub const PROJECT_LIST_KEY_PREFIX: &str = "proj:";

/// Ephemeral key of the documentation record for `import_path`.
pub fn doc_key(import_path: &str) -> String {
    format!("doc-{PACKAGE_VERSION}:{import_path}")
}

/// Ephemeral key of the child-package listing of `project_root`.
pub fn project_list_key(project_root: &str) -> String {
    format!("{PROJECT_LIST_KEY_PREFIX}{project_root}")
}

/// Durable key of the index record for `import_path`.
///
/// Standard library paths get a leading `/` so they never collide with
/// remote paths.
pub fn package_key(import_path: &str, standard: bool) -> String {
    if standard {
        format!("/{import_path}")
    } else {
        import_path.to_string()
    }
}

/// What a read observed under one ephemeral key.
///
/// `observed` is the raw stored item, a tombstone included. Its token is what
/// [`CacheManager::safe_set`] swaps against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRead<T> {
    pub key: String,
    pub observed: Option<CacheItem>,
    pub value: Option<T>,
}

impl<T> CacheRead<T> {
    /// Token of the observed write, if anything was stored.
    pub fn cas(&self) -> Option<u64> {
        self.observed.as_ref().map(|item| item.cas)
    }

    /// Whether the key was recently invalidated.
    pub fn is_tombstone(&self) -> bool {
        self.observed
            .as_ref()
            .is_some_and(|item| item.value == TOMBSTONE)
    }
}

#[derive(Serialize)]
struct DocBlobRef<'a> {
    version: &'a str,
    package: &'a Package,
}

#[derive(Deserialize)]
struct DocBlob {
    package: Package,
}

#[derive(Deserialize)]
struct VersionTag {
    #[serde(default)]
    version: String,
}

/// Coordinates both cache tiers.
#[derive(Clone)]
pub struct CacheManager {
    ephemeral: Arc<dyn EphemeralStore>,
    durable: Arc<dyn DurableStore>,
    config: CacheConfig,
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CacheManager {
    /// Create a manager over the two tiers.
    pub fn new(
        ephemeral: Arc<dyn EphemeralStore>,
        durable: Arc<dyn DurableStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            ephemeral,
            durable,
            config,
        }
    }

    /// Expiration and size settings.
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Read and decode `key` from the ephemeral tier.
    ///
    /// A tombstone, or a value that no longer decodes, reads as a miss.
    pub async fn cache_get<T: DeserializeOwned>(&self, key: &str) -> Result<CacheRead<T>> {
        let observed = self.ephemeral.get(key).await?;
        let value = match observed.as_ref().map(|item| item.value.as_slice()) {
            None | Some(TOMBSTONE) => None,
            Some(bytes) => match serde_json::from_slice(bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("Discarding undecodable cache entry {}: {}", key, e);
                    None
                },
            },
        };
        Ok(CacheRead {
            key: key.to_string(),
            observed,
            value,
        })
    }

    /// Unconditionally store `value` under `key`.
    pub async fn cache_set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.ephemeral.set(key, bytes, ttl).await
    }

    /// Store `value` under `key` unless another writer got there first.
    ///
    /// `observed` is the token of the write this writer read earlier (see
    /// [`CacheRead::cas`]). With nothing observed the value is only added if
    /// absent. Otherwise it is swapped in only if no other write, tombstones
    /// included, happened since; if that entry has expired meanwhile, the
    /// write falls back to add-if-absent. Losing either race is success.
    pub async fn safe_set<T: Serialize>(
        &self,
        key: &str,
        observed: Option<u64>,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;

        if let Some(cas) = observed {
            match self
                .ephemeral
                .compare_and_swap(key, cas, bytes.clone(), ttl)
                .await?
            {
                CasOutcome::Swapped => return Ok(()),
                CasOutcome::Conflict => {
                    debug!("{} was set by another writer", key);
                    return Ok(());
                },
                CasOutcome::NotStored => {},
            }
        }

        if self.ephemeral.add(key, bytes, ttl).await? == AddOutcome::AlreadyPresent {
            debug!("{} was added by another writer", key);
        }
        Ok(())
    }

    /// Tombstone every key for the configured tombstone expiration.
    pub async fn clear(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let items = keys
            .iter()
            .map(|key| (key.clone(), TOMBSTONE.to_vec()))
            .collect();
        self.ephemeral
            .set_multi(items, self.config.tombstone_ttl())
            .await
    }

    /// Hard-delete ephemeral keys.
    pub async fn delete(&self, keys: &[String]) -> Result<()> {
        self.ephemeral.delete_multi(keys).await
    }

    /// Load the stored documentation record for `import_path`.
    ///
    /// Records written under another format version, or that no longer
    /// decode, read as absent.
    pub async fn load_doc(&self, import_path: &str) -> Result<Option<Package>> {
        let Some(bytes) = self.durable.get(EntityKind::Doc, import_path).await? else {
            return Ok(None);
        };
        let tag = match serde_json::from_slice::<VersionTag>(&bytes) {
            Ok(tag) => tag,
            Err(e) => {
                debug!("Ignoring undecodable stored doc for {}: {}", import_path, e);
                return Ok(None);
            },
        };
        if tag.version != PACKAGE_VERSION {
            debug!(
                "Ignoring stored doc for {} at version {:?}",
                import_path, tag.version
            );
            return Ok(None);
        }
        match serde_json::from_slice::<DocBlob>(&bytes) {
            Ok(blob) => Ok(Some(blob.package)),
            Err(e) => {
                debug!("Ignoring undecodable stored doc for {}: {}", import_path, e);
                Ok(None)
            },
        }
    }

    /// Delete the stored documentation record for `import_path`.
    pub async fn remove_doc(&self, import_path: &str) -> Result<()> {
        if self.durable.delete(EntityKind::Doc, import_path).await? {
            debug!("Removed stored doc for {}", import_path);
        }
        Ok(())
    }

    /// Serialize `pkg` for the durable tier, truncating it if needed.
    ///
    /// The truncated record is verified against the bound; a record that is
    /// still too large is an error.
    fn encode_doc(&self, pkg: &mut Package) -> Result<Vec<u8>> {
        let encode = |pkg: &Package| {
            serde_json::to_vec(&DocBlobRef {
                version: PACKAGE_VERSION,
                package: pkg,
            })
        };

        let bytes = encode(pkg)?;
        if bytes.len() <= self.config.max_doc_bytes {
            return Ok(bytes);
        }

        info!(
            "Truncating documentation for {} ({} bytes)",
            pkg.import_path,
            bytes.len()
        );
        pkg.truncate();
        let bytes = encode(pkg)?;
        if bytes.len() > self.config.max_doc_bytes {
            return Err(Error::ResourceLimited(format!(
                "documentation for {} is {} bytes after truncation",
                pkg.import_path,
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// Persist the outcome of a resolution for `import_path`.
    ///
    /// `pdoc` is the rebuilt record, or `None` when the package no longer
    /// exists. The record may be truncated in place. The index record is only
    /// written when it changed, and listing caches are only invalidated after
    /// such a write.
    pub async fn update_package(&self, import_path: &str, mut pdoc: Option<&mut Package>) -> Result<()> {
        let record = pdoc.as_deref().and_then(|pkg| project(import_path, pkg));

        match (&record, pdoc.as_deref_mut()) {
            (Some(_), Some(pkg)) => {
                let bytes = self.encode_doc(pkg)?;
                self.durable.put(EntityKind::Doc, import_path, bytes).await?;
            },
            _ => {
                self.durable.delete(EntityKind::Doc, import_path).await?;
            },
        }

        let standard = pdoc
            .as_deref()
            .map_or_else(|| is_standard_package(import_path), Package::is_standard);
        let key = package_key(import_path, standard);

        let stored = self
            .durable
            .get(EntityKind::Package, &key)
            .await?
            .map(|bytes| decode_index_record(&key, &bytes));

        let changed = match (stored, &record) {
            (None, None) => false,
            (None | Some(None), Some(record)) => {
                info!("Adding package {}", import_path);
                self.durable
                    .put(EntityKind::Package, &key, serde_json::to_vec(record)?)
                    .await?;
                true
            },
            (Some(_), None) => {
                info!("Deleting package {}", import_path);
                self.durable.delete(EntityKind::Package, &key).await?;
                true
            },
            (Some(Some(stored)), Some(record)) => {
                if stored.same_listing(record) {
                    false
                } else {
                    info!("Updating package {}", import_path);
                    self.durable
                        .put(EntityKind::Package, &key, serde_json::to_vec(record)?)
                        .await?;
                    true
                }
            },
        };

        if changed {
            let mut keys = vec![PACKAGE_LIST_KEY.to_string()];
            match pdoc.as_deref() {
                Some(pkg) => keys.push(project_list_key(&pkg.project_root)),
                None => keys.extend(ancestor_roots(import_path).map(project_list_key)),
            }
            self.clear(&keys).await?;
        }
        Ok(())
    }

    /// Index records whose durable key starts with `prefix`, cached under
    /// `cache_key`.
    ///
    /// Standard library keys have their leading `/` stripped again.
    pub async fn query_packages<F>(&self, cache_key: &str, prefix: &str, filter: F) -> Result<Vec<IndexRecord>>
    where
        F: Fn(&IndexRecord) -> bool + Send,
    {
        let read = self.cache_get::<Vec<IndexRecord>>(cache_key).await?;
        if let Some(records) = read.value {
            return Ok(records);
        }

        let mut records = Vec::new();
        for (key, bytes) in self.durable.list(EntityKind::Package, prefix).await? {
            let Some(mut record) = decode_index_record(&key, &bytes) else {
                continue;
            };
            record.import_path = key.strip_prefix('/').unwrap_or(&key).to_string();
            if filter(&record) {
                records.push(record);
            }
        }

        self.safe_set(
            cache_key,
            read.cas(),
            &records,
            self.config.list_ttl(),
        )
        .await?;
        Ok(records)
    }
}

fn decode_index_record(key: &str, bytes: &[u8]) -> Option<IndexRecord> {
    serde_json::from_slice(bytes)
        .inspect_err(|e| debug!("Ignoring undecodable index record {}: {}", key, e))
        .ok()
}

/// Every proper path prefix of `import_path` that could be a project root.
fn ancestor_roots(import_path: &str) -> impl Iterator<Item = &str> {
    import_path
        .match_indices('/')
        .map(move |(i, _)| &import_path[..i])
}
