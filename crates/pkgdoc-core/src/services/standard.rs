use super::ServiceContext;
use super::google::listed_files;
use crate::builder::BuildInput;
use crate::fetcher::{Conditional, FetchContext};
use crate::source::{SourceFile, is_doc_file};
use crate::types::Resolution;
use crate::Result;
use reqwest::header::HeaderMap;

/// Standard library packages, scraped from the release directory listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardService;

impl StandardService {
    /// Resolve the standard library package `import_path`.
    pub async fn fetch(
        &self,
        cx: &ServiceContext,
        ctx: &FetchContext,
        import_path: &str,
        saved_etag: &str,
    ) -> Result<Resolution> {
        let listing = &cx.endpoints.standard_listing;
        let browse = &cx.endpoints.standard_browse;

        let (body, etag) = match cx
            .fetcher
            .get_compare(ctx, &format!("{listing}/{import_path}/"), saved_etag)
            .await?
        {
            Conditional::NotModified => return Ok(Resolution::NotModified),
            Conditional::Modified { body, etag } => (body, etag),
        };

        let mut files: Vec<SourceFile> = listed_files(&body)
            .iter()
            .filter_map(|link| link.split('?').next())
            .filter(|name| is_doc_file(name))
            .map(|name| {
                SourceFile::remote(
                    name,
                    format!("{browse}/{import_path}/{name}?name=release"),
                    format!("{listing}/{import_path}/{name}"),
                )
            })
            .collect();

        cx.fetcher.fetch_files(ctx, &mut files, &HeaderMap::new()).await?;

        cx.build(BuildInput {
            import_path: import_path.to_string(),
            project_root: String::new(),
            project_name: "Go".to_string(),
            project_url: format!("{}/p/go", cx.endpoints.google_code),
            etag,
            line_anchor: "#",
            files,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::test_support::{context, found};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_standard_package() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/std/container/list/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<ul><li><a href="list.go?r=release">list.go</a></li><li><a href="list_test.go">t</a></li></ul>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/std/container/list/list.go"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "// Package list implements a doubly linked list.\npackage list\n\ntype List struct{}\n",
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/std/container/list/list_test.go"))
            .respond_with(ResponseTemplate::new(200).set_body_string("package list\n"))
            .mount(&server)
            .await;

        let cx = context(&server.uri());
        let pkg = found(
            StandardService
                .fetch(&cx, &FetchContext::new(), "container/list", "")
                .await?,
        );

        assert_eq!(pkg.name, "list");
        assert!(pkg.project_root.is_empty());
        assert_eq!(pkg.project_name, "Go");
        assert_eq!(pkg.synopsis, "Package list implements a doubly linked list.");
        assert_eq!(
            pkg.files[0].url,
            format!("{}/std-browse/container/list/list.go?name=release", server.uri())
        );
        assert!(pkg.types[0].url.ends_with("list.go?name=release#4"));
        Ok(())
    }
}
