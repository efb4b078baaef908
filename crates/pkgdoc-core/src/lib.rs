//! # pkgdoc-core
//!
//! Resolves Go import paths to documentation built from the package source,
//! fetched from whichever hosting service serves the path, and keeps the
//! result in a two-tier cache.
//!
//! ## Architecture
//!
//! - **Resolution**: [`Resolver`] dispatches an import path to a hosting
//!   service adapter, or discovers the repository through `go-import` meta
//!   tags and falls back to a proxy.
//! - **Fetching**: [`Fetcher`] performs ETag-aware GETs and fetches file
//!   bodies concurrently, honoring a [`FetchContext`] deadline and
//!   cancellation token.
//! - **Building**: a [`DocBuilder`] turns source files into a [`Package`]
//!   record; [`GoSourceBuilder`] is the default.
//! - **Caching**: [`CacheManager`] coordinates an ephemeral tier and a durable
//!   tier with compare-and-swap writes, tombstone invalidation and write
//!   suppression for unchanged index records.
//! - **Pipeline**: [`DocService`] ties the above together per request.
//!
//! ## Quick Start
//!
//! ```rust
//! use pkgdoc_core::valid_remote_path;
//!
//! assert!(valid_remote_path("github.com/user/repo"));
//! assert!(!valid_remote_path("github.com/user/repo/testdata/x"));
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]. A package that did not change
//! since the stored ETag is a successful [`Resolution::NotModified`], not an
//! error:
//!
//! ```rust
//! use pkgdoc_core::Error;
//!
//! let err = Error::transport("https://api.github.com/repos/a/b/git/refs", "502");
//! match err {
//!     Error::PackageNotFound => eprintln!("gone"),
//!     e if e.is_recoverable() => eprintln!("serve the stored copy: {e}"),
//!     e => eprintln!("fatal: {e}"),
//! }
//! ```

/// Tar+gzip archive extraction
pub mod archive;
/// Documentation builder contract and the default Go source scanner
pub mod builder;
/// Two-tier cache manager
pub mod cache;
/// Configuration management
pub mod config;
/// `go-import` meta tag discovery
pub mod discovery;
/// Error types and result aliases
pub mod error;
/// HTTP fetching with conditional requests and cancellation
pub mod fetcher;
/// Import path validity and standard library packages
pub mod path;
/// Request-level orchestration
pub mod pipeline;
/// Index records and visibility rules
pub mod projection;
/// Import path dispatch
pub mod resolver;
/// Hosting service adapters
pub mod services;
/// Candidate source files
pub mod source;
/// Cache tier contracts and implementations
pub mod store;
/// Core data types
pub mod types;

pub use builder::{BuildInput, DocBuilder, GoSourceBuilder};
pub use cache::CacheManager;
pub use config::{CacheConfig, Config, HttpConfig, PathsConfig, ServiceEndpoints};
pub use error::{Error, Result};
pub use fetcher::{FetchContext, Fetcher};
pub use path::{is_standard_package, valid_remote_path};
pub use pipeline::{DocPage, DocService, PackageIndex};
pub use projection::project;
pub use resolver::Resolver;
pub use services::ServiceContext;
pub use store::{
    AddOutcome, CacheItem, CasOutcome, DurableStore, EntityKind, EphemeralStore, FileStore,
    MemoryCache, MemoryStore,
};
pub use types::*;
