//! Import path resolution.
//!
//! [`Resolver::resolve`] picks the adapter for an import path:
//!
//! 1. Standard library packages go to [`StandardService`].
//! 2. Structurally invalid paths are rejected before any request is made.
//! 3. The static services are tried in order. A service whose prefix matches
//!    owns the path: if its pattern then fails, the path is not found.
//! 4. Otherwise the path's host is asked for a `go-import` declaration. The
//!    path is rewritten onto the declared repository and static resolution is
//!    tried again, with [`ProxyService`] as the last resort.
//!
//! ETags handed out by the resolver carry a `"{PACKAGE_VERSION}-"` prefix so
//! that a format change invalidates every stored token at once.

use crate::builder::{DocBuilder, GoSourceBuilder};
use crate::config::Config;
use crate::discovery::get_meta;
use crate::fetcher::{FetchContext, Fetcher};
use crate::path::{is_standard_package, valid_remote_path};
use crate::services::{PathMatch, ProxyService, Service, ServiceContext, StandardService, static_services};
use crate::types::{PACKAGE_VERSION, Resolution};
use crate::{Error, Result};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Dispatches import paths to hosting service adapters.
pub struct Resolver {
    cx: ServiceContext,
    services: Vec<Box<dyn Service>>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.services.iter().map(|s| s.name()).collect();
        f.debug_struct("Resolver")
            .field("cx", &self.cx)
            .field("services", &names)
            .finish()
    }
}

impl Resolver {
    /// Create a resolver over the given collaborators with the default
    /// service order.
    pub fn new(cx: ServiceContext) -> Self {
        Self {
            cx,
            services: static_services(),
        }
    }

    /// Build a resolver from configuration with the default documentation
    /// builder.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_builder(config, Arc::new(GoSourceBuilder))
    }

    /// Build a resolver from configuration with a custom documentation builder.
    pub fn with_builder(config: &Config, builder: Arc<dyn DocBuilder>) -> Result<Self> {
        Ok(Self::new(ServiceContext {
            fetcher: Fetcher::new(&config.http)?,
            builder,
            endpoints: config.services.clone(),
        }))
    }

    /// Resolve `import_path`.
    ///
    /// `etag` is the token stored with the previous record for this path, or
    /// empty. Tokens without the current version prefix are ignored.
    #[instrument(skip(self, ctx))]
    pub async fn resolve(&self, ctx: &FetchContext, import_path: &str, etag: &str) -> Result<Resolution> {
        let version_prefix = format!("{PACKAGE_VERSION}-");
        let saved = etag.strip_prefix(&version_prefix).unwrap_or_default();

        let resolution = if is_standard_package(import_path) {
            StandardService.fetch(&self.cx, ctx, import_path, saved).await?
        } else if !valid_remote_path(import_path) {
            return Err(Error::InvalidImportPath(import_path.to_string()));
        } else if let Some(result) = self.get_static(ctx, import_path, saved).await {
            result?
        } else {
            self.get_dynamic(ctx, import_path, saved).await?
        };

        Ok(match resolution {
            Resolution::Found(mut pkg) => {
                pkg.etag = format!("{version_prefix}{}", pkg.etag);
                Resolution::Found(pkg)
            },
            Resolution::NotModified => Resolution::NotModified,
        })
    }

    /// Try the static services. `None` means no service claims the path.
    async fn get_static(
        &self,
        ctx: &FetchContext,
        import_path: &str,
        saved_etag: &str,
    ) -> Option<Result<Resolution>> {
        let service = self
            .services
            .iter()
            .find(|s| import_path.starts_with(s.prefix()))?;
        let Some(m) = PathMatch::capture(service.pattern(), import_path) else {
            debug!("{} claims {} but the path shape is wrong", service.name(), import_path);
            return Some(Err(Error::PackageNotFound));
        };
        debug!("resolving {} with {}", import_path, service.name());
        Some(service.fetch(&self.cx, ctx, m, saved_etag).await)
    }

    async fn get_dynamic(&self, ctx: &FetchContext, import_path: &str, saved_etag: &str) -> Result<Resolution> {
        let fetcher = &self.cx.fetcher;
        let endpoints = &self.cx.endpoints;
        let mut meta = get_meta(fetcher, ctx, endpoints, import_path).await?;

        if meta.project_root != import_path {
            let root_meta = get_meta(fetcher, ctx, endpoints, &meta.project_root).await?;
            if root_meta.project_root != meta.project_root {
                debug!(
                    "{} declares root {} but the root declares {}",
                    import_path, meta.project_root, root_meta.project_root
                );
                return Err(Error::PackageNotFound);
            }
            meta.project_name = root_meta.project_name;
            meta.project_url = root_meta.project_url;
        }

        let Some((_, repo)) = meta.repo_url.split_once("://") else {
            return Err(Error::PackageNotFound);
        };
        let suffix = import_path.get(meta.project_root.len()..).unwrap_or_default();
        let rewritten = format!("{repo}{suffix}");
        debug!("{} is served from {}", import_path, rewritten);

        match self.get_static(ctx, &rewritten, saved_etag).await {
            Some(Ok(Resolution::Found(mut pkg))) => {
                pkg.import_path = import_path.to_string();
                pkg.project_root = meta.project_root;
                pkg.project_name = meta.project_name;
                pkg.project_url = meta.project_url;
                Ok(Resolution::Found(pkg))
            },
            Some(result) => result,
            None => {
                ProxyService
                    .fetch(&self.cx, ctx, import_path, &meta, saved_etag)
                    .await
            },
        }
    }
}
