use super::{PathMatch, Service, ServiceContext};
use crate::builder::BuildInput;
use crate::fetcher::{Conditional, FetchContext};
use crate::source::{SourceFile, is_doc_file, normalize_dir};
use crate::types::Resolution;
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::HeaderMap;
use std::sync::LazyLock;

#[allow(clippy::unwrap_used)]
static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^code\.google\.com/p/([a-z0-9\-]+)(\.[a-z0-9\-]+)?(/[a-z0-9A-Z_.\-/]+)?$").unwrap()
});

/// Version control system named on a project's checkout page.
#[allow(clippy::unwrap_used)]
static CHECKOUT_VCS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"id="checkoutcmd">(hg|git|svn)"#).unwrap());

/// File entries of a repository browser listing.
#[allow(clippy::unwrap_used)]
pub(super) static LISTING_FILE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<li><a href="([^"/]+)""#).unwrap());

/// Names linked from a directory listing page, in page order.
pub(super) fn listed_files(page: &[u8]) -> Vec<String> {
    let page = String::from_utf8_lossy(page);
    LISTING_FILE
        .captures_iter(&page)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Google Code: scrape the checkout page for the VCS, then the raw browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoogleService;

#[async_trait]
impl Service for GoogleService {
    fn name(&self) -> &'static str {
        "google"
    }

    fn prefix(&self) -> &'static str {
        "code.google.com/"
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
        let repo = m.get(1);
        // ".sub" in the path becomes "sub." in the repository host.
        let subrepo = m.get(2).strip_prefix('.').unwrap_or_default();
        let dir = normalize_dir(m.get(3));
        let code = &cx.endpoints.google_code;

        let page = cx
            .fetcher
            .get(ctx, &format!("{code}/p/{repo}/source/checkout"))
            .await?;
        let page = String::from_utf8_lossy(&page);
        let Some(vcs) = CHECKOUT_VCS.captures(&page).map(|caps| caps[1].to_string()) else {
            return Err(Error::PackageNotFound);
        };

        let host = if subrepo.is_empty() {
            repo.to_string()
        } else {
            format!("{subrepo}.{repo}")
        };
        let raw_root = cx.endpoints.google_raw.replace("{repo}", &host);
        let query = if subrepo.is_empty() {
            String::new()
        } else {
            format!("?repo={subrepo}")
        };

        let (body, etag) = match cx
            .fetcher
            .get_compare(ctx, &format!("{raw_root}/{vcs}/{dir}"), saved_etag)
            .await?
        {
            Conditional::NotModified => return Ok(Resolution::NotModified),
            Conditional::Modified { body, etag } => (body, etag),
        };

        let mut files: Vec<SourceFile> = listed_files(&body)
            .into_iter()
            .filter(|name| is_doc_file(name))
            .map(|name| {
                SourceFile::remote(
                    name.clone(),
                    format!("{code}/p/{repo}/source/browse/{dir}{name}{query}"),
                    format!("{raw_root}/{vcs}/{dir}{name}"),
                )
            })
            .collect();

        cx.fetcher.fetch_files(ctx, &mut files, &HeaderMap::new()).await?;

        cx.build(BuildInput {
            import_path: m.get(0).to_string(),
            project_root: format!("code.google.com/p/{repo}{}", m.get(2)),
            project_name: format!("{repo}{}", m.get(2)),
            project_url: format!("{code}/p/{repo}/"),
            etag,
            line_anchor: "#",
            files,
        })
    }
}
