//! Hosting service adapters.
//!
//! Each adapter turns a matched import path into a documentation record:
//! compute the project root, list the files of the directory the path names,
//! short-circuit when the listing's version token matches the saved one, fetch
//! the file bodies and hand everything to the [`DocBuilder`].
//!
//! The statically known services are tried in [`static_services`] order.
//! [`StandardService`] and [`ProxyService`] are invoked by the resolver
//! directly.

use crate::builder::{BuildInput, DocBuilder};
use crate::config::ServiceEndpoints;
use crate::fetcher::{Fetcher, FetchContext};
use crate::types::Resolution;
use crate::Result;
use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

mod bitbucket;
mod github;
mod gitorious;
mod google;
mod launchpad;
mod proxy;
mod standard;

pub use bitbucket::BitbucketService;
pub use github::GithubService;
pub use gitorious::GitoriousService;
pub use google::GoogleService;
pub use launchpad::LaunchpadService;
pub use proxy::{ProjectMeta, ProxyService};
pub use standard::StandardService;

/// Shared collaborators for every adapter.
#[derive(Clone)]
pub struct ServiceContext {
    pub fetcher: Fetcher,
    pub builder: Arc<dyn DocBuilder>,
    pub endpoints: ServiceEndpoints,
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("fetcher", &self.fetcher)
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl ServiceContext {
    /// Run the builder and wrap the record as a found resolution.
    pub fn build(&self, input: BuildInput) -> Result<Resolution> {
        let pkg = self.builder.build(input)?;
        Ok(Resolution::Found(Box::new(pkg)))
    }
}

/// Capture groups of a service pattern; group 0 is the whole import path.
///
/// Groups that did not participate in the match read as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch(Vec<String>);

impl PathMatch {
    /// Match `path` against `pattern`.
    pub fn capture(pattern: &Regex, path: &str) -> Option<Self> {
        pattern.captures(path).map(|caps| {
            Self(
                caps.iter()
                    .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                    .collect(),
            )
        })
    }

    /// Capture group `i`, or `""`.
    pub fn get(&self, i: usize) -> &str {
        self.0.get(i).map_or("", String::as_str)
    }

    fn set(&mut self, i: usize, value: String) {
        if let Some(slot) = self.0.get_mut(i) {
            *slot = value;
        }
    }
}

/// A statically known hosting service.
#[async_trait]
pub trait Service: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Import path prefix claimed by this service.
    fn prefix(&self) -> &'static str;

    /// Shape an import path must have once the prefix matched.
    fn pattern(&self) -> &'static Regex;

    /// Resolve a matched import path.
    ///
    /// `saved_etag` is the service-level token from the previous resolution
    /// (empty if none); returning [`Resolution::NotModified`] means it is
    /// still current.
    async fn fetch(
        &self,
        cx: &ServiceContext,
        ctx: &FetchContext,
        m: PathMatch,
        saved_etag: &str,
    ) -> Result<Resolution>;
}

/// The statically known services in dispatch order.
pub fn static_services() -> Vec<Box<dyn Service>> {
    vec![
        Box::new(GithubService),
        Box::new(GoogleService),
        Box::new(BitbucketService),
        Box::new(LaunchpadService),
        Box::new(GitoriousService),
    ]
}
