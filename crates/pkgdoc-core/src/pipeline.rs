//! Request-level orchestration.
//!
//! [`DocService::get_doc`] serves a documentation record the way a package
//! page needs it: from the ephemeral tier when possible, otherwise by
//! re-resolving against the stored record's ETag and persisting the result.
//! Transport failures fall back to the stored record when one exists.

use crate::cache::{CacheManager, PACKAGE_LIST_KEY, doc_key, project_list_key};
use crate::config::Config;
use crate::fetcher::FetchContext;
use crate::resolver::Resolver;
use crate::store::{FileStore, MemoryCache};
use crate::types::{IndexRecord, Package, Resolution};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// A documentation record with the packages below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocPage {
    pub package: Package,
    /// Library packages under the import path.
    pub packages: Vec<IndexRecord>,
    /// Commands under the import path.
    pub commands: Vec<IndexRecord>,
}

/// Listing of every visible package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageIndex {
    pub packages: Vec<IndexRecord>,
    pub commands: Vec<IndexRecord>,
}

/// Split records into libraries and commands, keeping order.
pub fn split_commands(records: Vec<IndexRecord>) -> (Vec<IndexRecord>, Vec<IndexRecord>) {
    records.into_iter().partition(|r| !r.is_cmd)
}

/// Resolution plus caching for one import path at a time.
#[derive(Debug)]
pub struct DocService {
    resolver: Resolver,
    cache: CacheManager,
}

impl DocService {
    /// Combine a resolver and a cache manager.
    pub const fn new(resolver: Resolver, cache: CacheManager) -> Self {
        Self { resolver, cache }
    }

    /// Service with an in-process ephemeral tier and a file-backed durable
    /// tier under `paths.data_dir`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let resolver = Resolver::from_config(config)?;
        let durable = FileStore::open(&config.paths.data_dir)?;
        let cache = CacheManager::new(
            Arc::new(MemoryCache::new()),
            Arc::new(durable),
            config.cache.clone(),
        );
        Ok(Self::new(resolver, cache))
    }

    /// The cache manager backing this service.
    pub const fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Documentation and child packages for `import_path`.
    #[instrument(skip(self, ctx))]
    pub async fn get_doc(&self, ctx: &FetchContext, import_path: &str) -> Result<DocPage> {
        let cache_key = doc_key(import_path);
        let cached = self.cache.cache_get::<Package>(&cache_key).await?;
        if let Some(pkg) = cached.value {
            debug!("Serving {} from cache", import_path);
            return self.page(pkg, import_path).await;
        }

        let saved = self.cache.load_doc(import_path).await?;
        let etag = saved.as_ref().map_or("", |pkg| pkg.etag.as_str());

        let result = self.resolver.resolve(ctx, import_path, etag).await;
        let pkg = match result {
            Ok(Resolution::Found(mut pkg)) => {
                info!("Resolved {} at {}", import_path, pkg.etag);
                self.cache.update_package(import_path, Some(pkg.as_mut())).await?;
                self.cache
                    .cache_set(&cache_key, &pkg, self.cache.config().doc_ttl())
                    .await?;
                *pkg
            },
            Ok(Resolution::NotModified) => {
                let pkg = saved.ok_or_else(|| {
                    Error::Other(format!("{import_path} not modified but no record is stored"))
                })?;
                debug!("{} not modified", import_path);
                self.cache
                    .cache_set(&cache_key, &pkg, self.cache.config().doc_ttl())
                    .await?;
                pkg
            },
            Err(Error::PackageNotFound) => {
                info!("{} not found", import_path);
                self.cache.update_package(import_path, None).await?;
                return Err(Error::PackageNotFound);
            },
            Err(e) if e.is_recoverable() => match saved {
                Some(pkg) => {
                    warn!(
                        category = e.category(),
                        "Serving {} from store after error: {}", import_path, e
                    );
                    pkg
                },
                None => return Err(e),
            },
            Err(e) => return Err(e),
        };

        self.page(pkg, import_path).await
    }

    async fn page(&self, package: Package, import_path: &str) -> Result<DocPage> {
        let children = self
            .child_packages(&package.project_root, import_path)
            .await?;
        if children.is_empty() && package.name.is_empty() && package.errors.is_empty() {
            return Err(Error::PackageNotFound);
        }
        let (packages, commands) = split_commands(children);
        Ok(DocPage {
            package,
            packages,
            commands,
        })
    }

    /// Index records of the project at `project_root` that live below
    /// `import_path`.
    pub async fn child_packages(&self, project_root: &str, import_path: &str) -> Result<Vec<IndexRecord>> {
        let project = self
            .cache
            .query_packages(
                &project_list_key(project_root),
                &format!("{project_root}/"),
                |_| true,
            )
            .await?;
        let prefix = format!("{import_path}/");
        Ok(project
            .into_iter()
            .filter(|record| record.import_path.starts_with(&prefix))
            .collect())
    }

    /// Every package that is not hidden.
    pub async fn package_index(&self) -> Result<PackageIndex> {
        let records = self
            .cache
            .query_packages(PACKAGE_LIST_KEY, "", |record| !record.hide)
            .await?;
        let (packages, commands) = split_commands(records);
        Ok(PackageIndex { packages, commands })
    }

    /// Forget the cached and stored documentation for `import_path` so the
    /// next request rebuilds it.
    pub async fn reload(&self, import_path: &str) -> Result<()> {
        info!("Reloading {}", import_path);
        self.cache.delete(&[doc_key(import_path)]).await?;
        self.cache.remove_doc(import_path).await
    }
}
