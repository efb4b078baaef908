//! Index records derived from documentation records.
//!
//! Visibility is decided by an ordered list of rules; the first rule whose
//! predicate holds decides `hide` and contributes index tokens. Every record
//! with a project root carries the lowercased root as its first token.

use crate::types::{IndexRecord, Package};

/// Paths under this prefix belong to a mirror of the standard library that is
/// being retired.
pub const LEGACY_MIRROR_PREFIX: &str = "code.google.com/p/go/";

/// Effect of a matched rule.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Visibility {
    hide: bool,
    tokens: Vec<String>,
}

impl Visibility {
    const fn hidden() -> Self {
        Self {
            hide: true,
            tokens: Vec::new(),
        }
    }
}

struct Rule {
    name: &'static str,
    applies: fn(&str, &Package) -> bool,
    effect: fn(&str, &Package) -> Visibility,
}

const RULES: &[Rule] = &[
    Rule {
        name: "legacy-mirror",
        applies: |import_path, _| import_path.starts_with(LEGACY_MIRROR_PREFIX),
        effect: |_, _| Visibility::hidden(),
    },
    Rule {
        name: "standard",
        applies: |_, pkg| pkg.is_standard(),
        effect: |_, pkg| Visibility {
            hide: true,
            tokens: vec![pkg.name.to_lowercase()],
        },
    },
    Rule {
        name: "command",
        applies: |_, pkg| pkg.is_cmd,
        effect: |_, pkg| {
            if has_more_than_a_fragment(pkg) {
                Visibility {
                    hide: false,
                    tokens: vec![last_segment(&pkg.import_path)],
                }
            } else {
                Visibility::hidden()
            }
        },
    },
    Rule {
        name: "library",
        applies: |_, _| true,
        effect: |_, pkg| {
            if pkg.exports_nothing() {
                return Visibility::hidden();
            }
            let segment = last_segment(&pkg.import_path);
            let name = pkg.name.to_lowercase();
            let mut tokens = vec![segment];
            if tokens[0] != name {
                tokens.push(name);
            }
            Visibility { hide: false, tokens }
        },
    },
];

/// A command is listed only with a synopsis and a doc that continues past its
/// first period.
fn has_more_than_a_fragment(pkg: &Package) -> bool {
    !pkg.synopsis.is_empty()
        && pkg
            .doc
            .find('.')
            .is_some_and(|i| i + 1 != pkg.doc.len())
}

fn last_segment(import_path: &str) -> String {
    import_path
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// Derive the index record for `pkg`, stored under `import_path`.
///
/// Returns `None` when the record has no package name; such paths are removed
/// from the index.
pub fn project(import_path: &str, pkg: &Package) -> Option<IndexRecord> {
    if pkg.name.is_empty() {
        return None;
    }

    let mut index_tokens = Vec::with_capacity(3);
    if !pkg.project_root.is_empty() {
        index_tokens.push(pkg.project_root.to_lowercase());
    }

    let rule = RULES.iter().find(|r| (r.applies)(import_path, pkg))?;
    let visibility = (rule.effect)(import_path, pkg);
    tracing::trace!(rule = rule.name, hide = visibility.hide, "projected {}", import_path);
    index_tokens.extend(visibility.tokens);

    Some(IndexRecord {
        import_path: import_path.to_string(),
        synopsis: pkg.synopsis.clone(),
        package_name: pkg.name.clone(),
        is_cmd: pkg.is_cmd,
        hide: visibility.hide,
        index_tokens,
    })
}
