use super::{PathMatch, Service, ServiceContext};
use crate::builder::BuildInput;
use crate::fetcher::FetchContext;
use crate::source::{SourceFile, is_doc_file, normalize_dir, split_path};
use crate::types::Resolution;
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::sync::LazyLock;
use tracing::debug;

#[allow(clippy::unwrap_used)]
static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^github\.com/([a-z0-9A-Z_.\-]+)/([a-z0-9A-Z_.\-]+)(/[a-z0-9A-Z_.\-/]*)?$").unwrap()
});

const RAW_BLOB: &str = "application/vnd.github-blob.raw";

#[derive(Debug, Deserialize)]
struct GitRef {
    #[serde(rename = "ref")]
    name: String,
    object: GitObject,
}

#[derive(Debug, Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct Tree {
    tree: Vec<TreeNode>,
}

#[derive(Debug, Deserialize)]
struct TreeNode {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: String,
}

/// GitHub: git refs and recursive tree from the REST API, raw blobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GithubService;

/// Pick the tree to document: a `go1` branch or tag wins over `master`.
///
/// Returns `(tree name, etag)`; the etag is empty when neither exists.
fn select_tree(refs: &[GitRef]) -> (&'static str, String) {
    let mut etag = String::new();
    for r in refs {
        match r.name.as_str() {
            "refs/heads/go1" | "refs/tags/go1" => {
                let kind = r.name.strip_prefix("refs").unwrap_or_default();
                return ("go1", format!("{}{kind}", r.object.sha));
            },
            "refs/heads/master" => etag.clone_from(&r.object.sha),
            _ => {},
        }
    }
    ("master", etag)
}

#[async_trait]
impl Service for GithubService {
    fn name(&self) -> &'static str {
        "github"
    }

    fn prefix(&self) -> &'static str {
        "github.com/"
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
        let api = &cx.endpoints.github_api;
        let web = &cx.endpoints.github_web;

        let body = cx
            .fetcher
            .get(ctx, &format!("{api}/repos/{user_repo}/git/refs"))
            .await?;
        let refs: Vec<GitRef> = serde_json::from_slice(&body)?;
        let (tree_name, etag) = select_tree(&refs);
        if !etag.is_empty() && etag == saved_etag {
            debug!("github {} unchanged at {}", user_repo, etag);
            return Ok(Resolution::NotModified);
        }

        let body = cx
            .fetcher
            .get(
                ctx,
                &format!("{api}/repos/{user_repo}/git/trees/{tree_name}?recursive=1"),
            )
            .await?;
        let tree: Tree = serde_json::from_slice(&body)?;

        let mut in_tree = false;
        let mut files = Vec::new();
        for node in tree.tree {
            if node.kind != "blob" || !is_doc_file(&node.path) || !node.path.starts_with(&dir) {
                continue;
            }
            in_tree = true;
            let (node_dir, name) = split_path(&node.path);
            if node_dir == dir {
                files.push(SourceFile::remote(
                    name,
                    format!("{web}/{user_repo}/blob/{tree_name}/{}", node.path),
                    node.url.clone(),
                ));
            }
        }
        if !in_tree {
            return Err(Error::PackageNotFound);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(RAW_BLOB));
        cx.fetcher.fetch_files(ctx, &mut files, &headers).await?;

        cx.build(BuildInput {
            import_path: m.get(0).to_string(),
            project_root: format!("github.com/{user_repo}"),
            project_name: m.get(2).to_string(),
            project_url: format!("{web}/{user_repo}/"),
            etag,
            line_anchor: "#L",
            files,
        })
    }
}
