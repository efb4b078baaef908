use super::{DurableStore, EntityKind};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    key: String,
    data: String,
}

/// Durable tier backed by one JSON file per record.
///
/// Records live under `{root}/{kind}/`. File names are the sanitized key plus
/// a short hash of the exact key, so distinct keys never share a file.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for kind in [EntityKind::Doc, EntityKind::Package] {
            std::fs::create_dir_all(root.join(kind.as_str()))
                .map_err(|e| Error::Storage(format!("Failed to create store directory: {e}")))?;
        }
        Ok(Self { root })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn sanitize_key(key: &str) -> String {
        let mut sanitized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        while sanitized.contains("..") {
            sanitized = sanitized.replace("..", "_");
        }
        sanitized.truncate(120);
        sanitized
    }

    fn record_path(&self, kind: EntityKind, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        let hash: String = digest.iter().take(6).map(|b| format!("{b:02x}")).collect();
        self.root
            .join(kind.as_str())
            .join(format!("{}.{hash}.json", Self::sanitize_key(key)))
    }

    async fn read_record(path: &Path) -> Result<StoredRecord> {
        let json = fs::read_to_string(path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to read record: {e}")))?;
        serde_json::from_str(&json)
            .map_err(|e| Error::Storage(format!("Failed to parse record {}: {e}", path.display())))
    }

    fn decode(record: &StoredRecord) -> Result<Vec<u8>> {
        STANDARD
            .decode(&record.data)
            .map_err(|e| Error::Storage(format!("Corrupt record {}: {e}", record.key)))
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, kind: EntityKind, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.record_path(kind, key);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        let record = Self::read_record(&path).await?;
        Ok(Some(Self::decode(&record)?))
    }

    async fn put(&self, kind: EntityKind, key: &str, value: Vec<u8>) -> Result<()> {
        let path = self.record_path(kind, key);
        let json = serde_json::to_string(&StoredRecord {
            key: key.to_string(),
            data: STANDARD.encode(value),
        })
        .map_err(|e| Error::Storage(format!("Failed to serialize record: {e}")))?;

        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write record: {e}")))?;

        #[cfg(target_os = "windows")]
        if fs::try_exists(&path).await? {
            fs::remove_file(&path)
                .await
                .map_err(|e| Error::Storage(format!("Failed to remove existing record: {e}")))?;
        }
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to commit record: {e}")))?;

        debug!("Saved {} record {}", kind, key);
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, key: &str) -> Result<bool> {
        match fs::remove_file(self.record_path(kind, key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Storage(format!("Failed to delete record: {e}"))),
        }
    }

    async fn list(&self, kind: EntityKind, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut dir = fs::read_dir(self.root.join(kind.as_str()))
            .await
            .map_err(|e| Error::Storage(format!("Failed to list records: {e}")))?;

        let mut records = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let record = Self::read_record(&path).await?;
            if record.key.starts_with(prefix) {
                let value = Self::decode(&record)?;
                records.push((record.key, value));
            }
        }
        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records)
    }
}
