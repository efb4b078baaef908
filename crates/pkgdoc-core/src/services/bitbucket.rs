use super::{PathMatch, Service, ServiceContext};
use crate::builder::BuildInput;
use crate::fetcher::{Conditional, FetchContext};
use crate::source::{SourceFile, is_doc_file, normalize_dir, split_path};
use crate::types::Resolution;
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^bitbucket\.org/([a-z0-9A-Z_.\-]+)/([a-z0-9A-Z_.\-]+)(/[a-z0-9A-Z_.\-/]*)?$")
        .unwrap()
});

#[derive(Debug, Deserialize)]
struct Directory {
    #[serde(default)]
    files: Vec<DirectoryFile>,
}

#[derive(Debug, Deserialize)]
struct DirectoryFile {
    path: String,
}

/// Bitbucket: REST directory listing at `tip` (Mercurial), then `master` (git).
#[derive(Debug, Clone, Copy, Default)]
pub struct BitbucketService;

#[async_trait]
impl Service for BitbucketService {
    fn name(&self) -> &'static str {
        "bitbucket"
    }

    fn prefix(&self) -> &'static str {
        "bitbucket.org/"
    }

    fn pattern(&self) -> &'static Regex {
        &PATTERN
    }

    async fn fetch(
        &self,
        cx: &ServiceContext,
        ctx: &FetchContext,
        m: PathMatch,
        saved_etag: &str,
    ) -> Result<Resolution> {
        let user_repo = format!("{}/{}", m.get(1), m.get(2));
        let dir = normalize_dir(m.get(3));
        let api = &cx.endpoints.bitbucket_api;
        let web = &cx.endpoints.bitbucket_web;
        let listing = |tag: &str| format!("{api}/repositories/{user_repo}/src/{tag}/{dir}");

        let mut tag = "tip";
        let mut result = cx.fetcher.get_compare(ctx, &listing(tag), saved_etag).await;
        if matches!(result, Err(Error::PackageNotFound)) {
            tag = "master";
            result = cx.fetcher.get_compare(ctx, &listing(tag), saved_etag).await;
        }
        let (body, etag) = match result? {
            Conditional::NotModified => return Ok(Resolution::NotModified),
            Conditional::Modified { body, etag } => (body, etag),
        };

        let directory: Directory = serde_json::from_slice(&body)?;
        let mut files: Vec<SourceFile> = directory
            .files
            .iter()
            .filter(|f| is_doc_file(&f.path))
            .map(|f| {
                let (_, name) = split_path(&f.path);
                SourceFile::remote(
                    name,
                    format!("{web}/{user_repo}/src/{tag}/{}", f.path),
                    format!("{api}/repositories/{user_repo}/raw/{tag}/{}", f.path),
                )
            })
            .collect();

        cx.fetcher.fetch_files(ctx, &mut files, &HeaderMap::new()).await?;

        cx.build(BuildInput {
            import_path: m.get(0).to_string(),
            project_root: format!("bitbucket.org/{user_repo}"),
            project_name: m.get(2).to_string(),
            project_url: format!("{web}/{user_repo}/"),
            etag,
            line_anchor: "#cl-",
            files,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetcher::content_hash;
    use crate::services::test_support::{context, found};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn listing() -> serde_json::Value {
        json!({"files": [
            {"path": "pkg/x.go"},
            {"path": "pkg/notes.txt"}
        ]})
    }

    fn matched() -> PathMatch {
        PathMatch::capture(&PATTERN, "bitbucket.org/user/repo/pkg").unwrap()
    }

    #[tokio::test]
    async fn test_falls_back_from_tip_to_master() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bitbucket-api/repositories/user/repo/src/tip/pkg/"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bitbucket-api/repositories/user/repo/src/master/pkg/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(listing()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bitbucket-api/repositories/user/repo/raw/master/pkg/x.go"))
            .respond_with(ResponseTemplate::new(200).set_body_string("package pkg\n\nconst X = 1\n"))
            .mount(&server)
            .await;

        let cx = context(&server.uri());
        let pkg = found(BitbucketService.fetch(&cx, &FetchContext::new(), matched(), "").await?);

        assert_eq!(pkg.name, "pkg");
        assert_eq!(pkg.project_root, "bitbucket.org/user/repo");
        assert_eq!(pkg.files.len(), 1);
        assert_eq!(
            pkg.files[0].url,
            format!("{}/bitbucket/user/repo/src/master/pkg/x.go", server.uri())
        );
        assert!(pkg.consts[0].url.ends_with("x.go#cl-3"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unchanged_listing_is_not_modified() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let body = serde_json::to_vec(&listing())?;
        Mock::given(method("GET"))
            .and(path("/bitbucket-api/repositories/user/repo/src/tip/pkg/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let cx = context(&server.uri());
        let result = BitbucketService
            .fetch(&cx, &FetchContext::new(), matched(), &content_hash(&body))
            .await?;
        assert_eq!(result, Resolution::NotModified);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_repository_is_not_found() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let cx = context(&server.uri());
        let err = BitbucketService
            .fetch(&cx, &FetchContext::new(), matched(), "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PackageNotFound));
        Ok(())
    }
}
