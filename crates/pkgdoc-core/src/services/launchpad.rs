use super::{PathMatch, Service, ServiceContext};
use crate::archive::{Select, read_tar_gz};
use crate::builder::BuildInput;
use crate::fetcher::{Conditional, FetchContext};
use crate::source::{SourceFile, is_doc_file, normalize_dir, split_path};
use crate::types::Resolution;
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

// Groups: 1 branch, 2 project, 3 series-or-dir, 4 personal branch owner part, 5 dir.
#[allow(clippy::unwrap_used)]
static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^launchpad\.net/(([a-z0-9A-Z_.\-]+)(/[a-z0-9A-Z_.\-]+)?|~[a-z0-9A-Z_.\-]+/(\+junk|[a-z0-9A-Z_.\-]+)/[a-z0-9A-Z_.\-]+)(/[a-z0-9A-Z_.\-/]+)*$",
    )
    .unwrap()
});

/// Launchpad: bzr branch tarballs.
///
/// `launchpad.net/{a}/{b}` is ambiguous: `b` is either a series of project `a`
/// or a directory in the project's trunk. A probe for the series branch
/// decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaunchpadService;

#[async_trait]
impl Service for LaunchpadService {
    fn name(&self) -> &'static str {
        "launchpad"
    }

    fn prefix(&self) -> &'static str {
        "launchpad.net/"
    }

    fn pattern(&self) -> &'static Regex {
        &PATTERN
    }

    async fn fetch(
        &self,
        cx: &ServiceContext,
        ctx: &FetchContext,
        mut m: PathMatch,
        saved_etag: &str,
    ) -> Result<Resolution> {
        if !m.get(2).is_empty() && !m.get(3).is_empty() {
            let probe = format!(
                "{}/{}{}/.bzr/branch-format",
                cx.endpoints.launchpad_code,
                m.get(2),
                m.get(3)
            );
            match cx.fetcher.get(ctx, &probe).await {
                Ok(_) => debug!("launchpad series branch {}{}", m.get(2), m.get(3)),
                Err(Error::PackageNotFound) => {
                    let dir = format!("{}{}", m.get(3), m.get(5));
                    let project = m.get(2).to_string();
                    m.set(1, project);
                    m.set(5, dir);
                },
                Err(e) => return Err(e),
            }
        }

        let project_name = if m.get(2).is_empty() { m.get(1) } else { m.get(2) }.to_string();
        let repo = m.get(1).to_string();
        let dir = normalize_dir(m.get(5));
        let bazaar = &cx.endpoints.launchpad_bazaar;

        let (body, etag) = match cx
            .fetcher
            .get_compare(ctx, &format!("{bazaar}/+branch/{repo}/tarball"), saved_etag)
            .await?
        {
            Conditional::NotModified => return Ok(Resolution::NotModified),
            Conditional::Modified { body, etag } => (body, etag),
        };

        let prefix = format!("+branch/{repo}/");
        let mut in_tree = false;
        let entries = read_tar_gz(&body, |path| {
            let Some(name) = path.strip_prefix(&prefix) else {
                return Select::Skip;
            };
            if !is_doc_file(name) || !name.starts_with(&dir) {
                return Select::Skip;
            }
            in_tree = true;
            if split_path(name).0 == dir { Select::Read } else { Select::Skip }
        })?;
        if !in_tree {
            return Err(Error::PackageNotFound);
        }

        let files = entries
            .into_iter()
            .map(|entry| {
                let name = entry.path.strip_prefix(&prefix).unwrap_or(&entry.path);
                SourceFile::inline(
                    split_path(name).1,
                    format!("{bazaar}/+branch/{repo}/view/head:/{name}"),
                    entry.data,
                )
            })
            .collect();

        cx.build(BuildInput {
            import_path: m.get(0).to_string(),
            project_root: format!("launchpad.net/{project_name}"),
            project_url: format!("https://launchpad.net/{project_name}/"),
            project_name,
            etag,
            line_anchor: "#L",
            files,
        })
    }
}
