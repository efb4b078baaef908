use super::ServiceContext;
use crate::archive::{Select, read_tar_gz};
use crate::builder::BuildInput;
use crate::fetcher::{Conditional, FetchContext};
use crate::source::{SourceFile, is_doc_file};
use crate::types::Resolution;
use crate::Result;

/// Project identity learned from dynamic discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectMeta {
    pub project_root: String,
    pub project_name: String,
    pub project_url: String,
    /// Repository URL from the `go-import` declaration.
    pub repo_url: String,
}

/// Last resort for discovered projects no static service recognizes: a proxy
/// serving a tarball of the package directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProxyService;

impl ProxyService {
    /// Fetch `import_path` through the proxy.
    pub async fn fetch(
        &self,
        cx: &ServiceContext,
        ctx: &FetchContext,
        import_path: &str,
        meta: &ProjectMeta,
        saved_etag: &str,
    ) -> Result<Resolution> {
        let (body, etag) = match cx
            .fetcher
            .get_compare(ctx, &format!("{}/{import_path}", cx.endpoints.proxy), saved_etag)
            .await?
        {
            Conditional::NotModified => return Ok(Resolution::NotModified),
            Conditional::Modified { body, etag } => (body, etag),
        };

        let entries = read_tar_gz(&body, |path| {
            if is_doc_file(path) { Select::Read } else { Select::Skip }
        })?;
        let browse = &cx.endpoints.proxy_browse;
        let files = entries
            .into_iter()
            .map(|entry| {
                let url = format!("{browse}/{import_path}/{}", entry.path);
                SourceFile::inline(entry.path, url, entry.data)
            })
            .collect();

        cx.build(BuildInput {
            import_path: import_path.to_string(),
            project_root: meta.project_root.clone(),
            project_name: meta.project_name.clone(),
            project_url: meta.project_url.clone(),
            etag,
            line_anchor: "#L",
            files,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::build_tar_gz;
    use crate::services::test_support::{context, found};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_proxy_tarball() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        let tarball = build_tar_gz(&[
            ("thing.go", "// Package thing is proxied.\npackage thing\n"),
            ("thing.c", "int x;"),
        ]);
        Mock::given(method("GET"))
            .and(path("/proxy/example.org/thing"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(tarball))
            .mount(&server)
            .await;

        let cx = context(&server.uri());
        let meta = ProjectMeta {
            project_root: "example.org/thing".to_string(),
            project_name: "thing".to_string(),
            project_url: "https://example.org/thing".to_string(),
            repo_url: "svn://example.org/thing".to_string(),
        };
        let pkg = found(
            ProxyService
                .fetch(&cx, &FetchContext::new(), "example.org/thing", &meta, "")
                .await?,
        );

        assert_eq!(pkg.name, "thing");
        assert_eq!(pkg.project_root, "example.org/thing");
        assert_eq!(pkg.files.len(), 1);
        assert_eq!(
            pkg.files[0].url,
            format!("{}/proxy-browse/example.org/thing/thing.go", server.uri())
        );
        Ok(())
    }
}
