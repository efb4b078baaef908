use super::{PathMatch, Service, ServiceContext};
use crate::archive::{Select, read_tar_gz};
use crate::builder::BuildInput;
use crate::fetcher::{Conditional, FetchContext};
use crate::source::{SourceFile, is_doc_file, normalize_dir};
use crate::types::Resolution;
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^git\.gitorious\.org/([a-z0-9A-Z_.\-]+)/([a-z0-9A-Z_.\-]+)\.git(/[a-z0-9A-Z_.\-/]*)?$")
        .unwrap()
});

/// Gitorious: `master` archive tarball.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitoriousService;

#[async_trait]
impl Service for GitoriousService {
    fn name(&self) -> &'static str {
        "gitorious"
    }

    fn prefix(&self) -> &'static str {
        "git.gitorious.org/"
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
        let (project, repo) = (m.get(1), m.get(2));
        let dir = normalize_dir(m.get(3));
        let root = &cx.endpoints.gitorious;

        let (body, etag) = match cx
            .fetcher
            .get_compare(
                ctx,
                &format!("{root}/{project}/{repo}/archive-tarball/master"),
                saved_etag,
            )
            .await?
        {
            Conditional::NotModified => return Ok(Resolution::NotModified),
            Conditional::Modified { body, etag } => (body, etag),
        };

        let prefix = format!("{project}-{repo}/{dir}");
        let mut in_tree = false;
        let entries = read_tar_gz(&body, |path| {
            let Some(name) = path.strip_prefix(&prefix) else {
                return Select::Skip;
            };
            if !is_doc_file(name) {
                return Select::Skip;
            }
            in_tree = true;
            if name.contains('/') { Select::Skip } else { Select::Read }
        })?;
        if !in_tree {
            return Err(Error::PackageNotFound);
        }

        let files = entries
            .into_iter()
            .map(|entry| {
                let name = entry.path.strip_prefix(&prefix).unwrap_or(&entry.path);
                SourceFile::inline(
                    name,
                    format!("{root}/{project}/{repo}/blobs/master/{dir}{name}"),
                    entry.data,
                )
            })
            .collect();

        cx.build(BuildInput {
            import_path: m.get(0).to_string(),
            project_root: format!("git.gitorious.org/{project}/{repo}.git"),
            project_name: repo.to_string(),
            project_url: format!("{root}/{project}/{repo}/"),
            etag,
            line_anchor: "#line",
            files,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::build_tar_gz;
    use crate::fetcher::content_hash;
    use crate::services::test_support::{context, found};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn matched(import_path: &str) -> PathMatch {
        PathMatch::capture(&PATTERN, import_path).unwrap()
    }

    fn tarball() -> Vec<u8> {
        build_tar_gz(&[
            ("proj-repo/lib/lib.go", "package lib\n\nvar Debug = false\n"),
            ("proj-repo/lib/inner/x.go", "package inner\n"),
            ("proj-repo/main.go", "package main\n"),
        ])
    }

    #[tokio::test]
    async fn test_reads_direct_files_only() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gitorious/proj/repo/archive-tarball/master"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(tarball()))
            .mount(&server)
            .await;

        let cx = context(&server.uri());
        let pkg = found(
            GitoriousService
                .fetch(&cx, &FetchContext::new(), matched("git.gitorious.org/proj/repo.git/lib"), "")
                .await?,
        );

        assert_eq!(pkg.name, "lib");
        assert_eq!(pkg.project_root, "git.gitorious.org/proj/repo.git");
        assert_eq!(pkg.files.len(), 1);
        assert_eq!(
            pkg.files[0].url,
            format!("{}/gitorious/proj/repo/blobs/master/lib/lib.go", server.uri())
        );
        assert!(pkg.vars[0].url.ends_with("lib.go#line3"));
        Ok(())
    }

    #[tokio::test]
    async fn test_same_tarball_is_not_modified() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let body = tarball();
        Mock::given(method("GET"))
            .and(path("/gitorious/proj/repo/archive-tarball/master"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let cx = context(&server.uri());
        let result = GitoriousService
            .fetch(
                &cx,
                &FetchContext::new(),
                matched("git.gitorious.org/proj/repo.git"),
                &content_hash(&body),
            )
            .await?;
        assert_eq!(result, Resolution::NotModified);
        Ok(())
    }
}
