//! Configuration management for pkgdoc.
//!
//! Configuration is stored in TOML format. Every section is optional; missing
//! sections and fields fall back to the defaults below.
//!
//! ## Lookup order
//!
//! 1. Explicit path passed to [`Config::load_from`]
//! 2. `PKGDOC_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/pkgdoc/config.toml` on Linux)
//!
//! `PKGDOC_DATA_DIR` overrides `paths.data_dir` regardless of where the file
//! came from.
//!
//! ## Example Configuration File
//!
//! ```toml
//! [http]
//! timeout_secs = 20
//!
//! [cache]
//! doc_ttl_secs = 3600
//! tombstone_ttl_secs = 120
//!
//! [services]
//! github_api = "https://github.example.internal/api/v3"
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Outbound HTTP settings.
    pub http: HttpConfig,
    /// Two-tier cache settings.
    pub cache: CacheConfig,
    /// Base URLs of the hosting services.
    pub services: ServiceEndpoints,
    /// Filesystem locations.
    pub paths: PathsConfig,
}

/// Outbound HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout applied by the HTTP client.
    pub timeout_secs: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("pkgdoc/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    /// Request timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Expirations and size bounds for the cache tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Expiration of documentation records in the ephemeral tier.
    pub doc_ttl_secs: u64,
    /// Expiration of cached package-list queries.
    pub list_ttl_secs: u64,
    /// Expiration of invalidation tombstones.
    pub tombstone_ttl_secs: u64,
    /// Serialized documentation records above this size are truncated.
    pub max_doc_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            doc_ttl_secs: 3600,
            list_ttl_secs: 3600,
            tombstone_ttl_secs: 120,
            max_doc_bytes: 800_000,
        }
    }
}

impl CacheConfig {
    /// Documentation record expiration.
    pub const fn doc_ttl(&self) -> Duration {
        Duration::from_secs(self.doc_ttl_secs)
    }

    /// Package-list expiration.
    pub const fn list_ttl(&self) -> Duration {
        Duration::from_secs(self.list_ttl_secs)
    }

    /// Tombstone expiration.
    pub const fn tombstone_ttl(&self) -> Duration {
        Duration::from_secs(self.tombstone_ttl_secs)
    }
}

/// Base URLs for every hosting backend.
///
/// The defaults are the services' public endpoints. Overriding them points an
/// adapter at a mirror (or, in tests, at a mock server).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceEndpoints {
    /// GitHub REST API root.
    pub github_api: String,
    /// GitHub web root used for browse links.
    pub github_web: String,
    /// Bitbucket REST API root.
    pub bitbucket_api: String,
    /// Bitbucket web root used for browse links.
    pub bitbucket_web: String,
    /// Google Code project pages root.
    pub google_code: String,
    /// Google Code raw repository browser; `{repo}` is replaced with
    /// `[subrepo.]project`.
    pub google_raw: String,
    /// Directory listing root for standard library packages.
    pub standard_listing: String,
    /// Browse root for standard library files.
    pub standard_browse: String,
    /// Launchpad code hosting root (used to probe for series branches).
    pub launchpad_code: String,
    /// Launchpad bazaar root serving branch tarballs.
    pub launchpad_bazaar: String,
    /// Gitorious root.
    pub gitorious: String,
    /// Last-resort proxy serving tarballs for arbitrary import paths.
    pub proxy: String,
    /// Browse root for files served through the proxy.
    pub proxy_browse: String,
    /// When set, dynamic discovery requests go to this origin (with the import
    /// path appended) instead of to the import path's own host.
    pub discovery_origin: Option<String>,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            github_api: "https://api.github.com".to_string(),
            github_web: "https://github.com".to_string(),
            bitbucket_api: "https://api.bitbucket.org/1.0".to_string(),
            bitbucket_web: "https://bitbucket.org".to_string(),
            google_code: "http://code.google.com".to_string(),
            google_raw: "http://{repo}.googlecode.com".to_string(),
            standard_listing: "http://go.googlecode.com/hg-history/release/src/pkg".to_string(),
            standard_browse: "http://code.google.com/p/go/source/browse/src/pkg".to_string(),
            launchpad_code: "https://code.launchpad.net".to_string(),
            launchpad_bazaar: "https://bazaar.launchpad.net".to_string(),
            gitorious: "https://gitorious.org".to_string(),
            proxy: "http://go-get.danga.com".to_string(),
            proxy_browse: "http://gosourcefile.appspot.com".to_string(),
            discovery_origin: None,
        }
    }
}

impl ServiceEndpoints {
    /// Point every endpoint at a single origin, keeping the default paths.
    ///
    /// Used to run all adapters against one mirror or mock server.
    #[must_use]
    pub fn rooted_at(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/');
        Self {
            github_api: format!("{origin}/github-api"),
            github_web: format!("{origin}/github"),
            bitbucket_api: format!("{origin}/bitbucket-api"),
            bitbucket_web: format!("{origin}/bitbucket"),
            google_code: format!("{origin}/google"),
            google_raw: format!("{origin}/googlecode/{{repo}}"),
            standard_listing: format!("{origin}/std"),
            standard_browse: format!("{origin}/std-browse"),
            launchpad_code: format!("{origin}/launchpad-code"),
            launchpad_bazaar: format!("{origin}/bazaar"),
            gitorious: format!("{origin}/gitorious"),
            proxy: format!("{origin}/proxy"),
            proxy_browse: format!("{origin}/proxy-browse"),
            discovery_origin: Some(format!("{origin}/discovery")),
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root directory of the file-backed durable store.
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: directories::ProjectDirs::from("org", "pkgdoc", "pkgdoc").map_or_else(
                || {
                    directories::BaseDirs::new().map_or_else(
                        || PathBuf::from(".pkgdoc"),
                        |base| base.home_dir().join(".pkgdoc"),
                    )
                },
                |dirs| dirs.data_dir().to_path_buf(),
            ),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if absent.
    pub fn load() -> Result<Self> {
        let path = match std::env::var("PKGDOC_CONFIG") {
            Ok(path) => PathBuf::from(path),
            Err(_) => Self::config_path()?,
        };
        Self::load_from(&path)
    }

    /// Load configuration from `path`, or defaults if the file does not exist.
    ///
    /// A file that exists but fails to parse is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        if let Ok(dir) = std::env::var("PKGDOC_DATA_DIR") {
            config.paths.data_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    /// Save the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content).map_err(|e| Error::Config(format!("Failed to write config: {e}")))
    }

    fn config_path() -> Result<PathBuf> {
        let project_dirs = directories::ProjectDirs::from("org", "pkgdoc", "pkgdoc")
            .ok_or_else(|| Error::Config("Failed to determine project directories".into()))?;
        Ok(project_dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache.max_doc_bytes, 800_000);
        assert_eq!(config.cache.tombstone_ttl(), Duration::from_secs(120));
        assert_eq!(config.cache.doc_ttl(), Duration::from_secs(3600));
        assert_eq!(config.services.github_api, "https://api.github.com");
        assert!(config.services.discovery_origin.is_none());
        assert!(config.http.user_agent.starts_with("pkgdoc/"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [cache]
            tombstone_ttl_secs = 5

            [services]
            proxy = "http://proxy.internal"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache.tombstone_ttl_secs, 5);
        assert_eq!(config.cache.doc_ttl_secs, 3600);
        assert_eq!(config.services.proxy, "http://proxy.internal");
        assert_eq!(config.services.github_web, "https://github.com");
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[cache\nfoo").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.http.timeout_secs = 7;
        config.services = ServiceEndpoints::rooted_at("http://127.0.0.1:9999/");
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.http.timeout_secs, 7);
        assert_eq!(loaded.services.github_api, "http://127.0.0.1:9999/github-api");
        assert_eq!(
            loaded.services.google_raw,
            "http://127.0.0.1:9999/googlecode/{repo}"
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.cache.list_ttl_secs, 3600);
    }
}
