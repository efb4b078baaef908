//! Dynamic discovery through `<meta name="go-import">` declarations.
//!
//! For an import path no static service claims, the path's host is asked for
//! `https://{path}?go-get=1` (falling back to plain HTTP). The page must carry
//! exactly one `go-import` declaration whose project root is a prefix of the
//! import path. Several matching declarations are treated as not found, the
//! same as none.

use crate::config::ServiceEndpoints;
use crate::fetcher::{FetchContext, Fetcher};
use crate::services::ProjectMeta;
use crate::{Error, Result};
use scraper::{Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

#[allow(clippy::unwrap_used)]
static GO_IMPORT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"head meta[name="go-import"]"#).unwrap());

/// Fetch and parse the `go-import` declaration for `import_path`.
pub async fn get_meta(
    fetcher: &Fetcher,
    ctx: &FetchContext,
    endpoints: &ServiceEndpoints,
    import_path: &str,
) -> Result<ProjectMeta> {
    let mut uri = import_path.to_string();
    if !uri.contains('/') {
        uri.push('/');
    }
    uri.push_str("?go-get=1");

    let (scheme, page) = if let Some(origin) = &endpoints.discovery_origin {
        ("https://", fetcher.get(ctx, &format!("{origin}/{uri}")).await?)
    } else {
        match fetcher.get(ctx, &format!("https://{uri}")).await {
            Ok(page) => ("https://", page),
            Err(e @ (Error::Cancelled | Error::Timeout(_))) => return Err(e),
            Err(e) => {
                debug!("https discovery for {} failed ({}), retrying over http", import_path, e);
                ("http://", fetcher.get(ctx, &format!("http://{uri}")).await?)
            },
        }
    };

    let (project_root, repo_url) =
        parse_go_import(&String::from_utf8_lossy(&page), import_path).ok_or(Error::PackageNotFound)?;
    let project_name = project_root.rsplit('/').next().unwrap_or_default().to_string();
    Ok(ProjectMeta {
        project_url: format!("{scheme}{project_root}"),
        project_root,
        project_name,
        repo_url,
    })
}

/// Find the single `go-import` declaration in `html` that covers `import_path`.
///
/// Returns `(project root, repository URL)`.
pub fn parse_go_import(html: &str, import_path: &str) -> Option<(String, String)> {
    let document = Html::parse_document(html);
    let mut found = None;
    for meta in document.select(&GO_IMPORT) {
        let Some(content) = meta.value().attr("content") else {
            continue;
        };
        let fields: Vec<&str> = content.split_whitespace().collect();
        let [root, _vcs, repo] = fields.as_slice() else {
            continue;
        };
        let covers = import_path
            .strip_prefix(root)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        if !covers {
            continue;
        }
        if found.is_some() {
            return None;
        }
        found = Some(((*root).to_string(), (*repo).to_string()));
    }
    found
}
