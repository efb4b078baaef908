//! Candidate source files and the filters that decide which files document a
//! package.

/// A source file handed from a service adapter to the documentation builder.
///
/// Either `data` is filled in directly (archive adapters) or `raw_url` points
/// at the body, which [`crate::Fetcher::fetch_files`] downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// File name without directory.
    pub name: String,
    /// Human-facing URL of the file on the hosting service.
    pub browse_url: String,
    /// URL of the raw file body, when not fetched yet.
    pub raw_url: Option<String>,
    /// File contents.
    pub data: Option<Vec<u8>>,
}

impl SourceFile {
    /// A file whose body still has to be fetched from `raw_url`.
    pub fn remote(
        name: impl Into<String>,
        browse_url: impl Into<String>,
        raw_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            browse_url: browse_url.into(),
            raw_url: Some(raw_url.into()),
            data: None,
        }
    }

    /// A file whose body is already known.
    pub fn inline(name: impl Into<String>, browse_url: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            browse_url: browse_url.into(),
            raw_url: None,
            data: Some(data),
        }
    }

    /// File contents as text, lossily decoded.
    pub fn text(&self) -> String {
        self.data
            .as_deref()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .unwrap_or_default()
    }
}

/// Whether the file at `path` contributes to package documentation.
///
/// Go source files only; names starting with `.` or `_` are ignored by the
/// go tool and are skipped here too.
pub fn is_doc_file(path: &str) -> bool {
    let (_, name) = split_path(path);
    name.ends_with(".go") && !name.starts_with('_') && !name.starts_with('.')
}

/// Turn an import path suffix like `/sub/pkg` into a tree prefix `sub/pkg/`.
///
/// An empty suffix (the repository root) stays empty.
pub fn normalize_dir(suffix: &str) -> String {
    suffix
        .strip_prefix('/')
        .map_or_else(|| suffix.to_string(), |rest| format!("{rest}/"))
}

/// Split `path` after its final slash into `(dir, name)`; `dir` keeps the slash.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => path.split_at(i + 1),
        None => ("", path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_doc_file() {
        assert!(is_doc_file("main.go"));
        assert!(is_doc_file("sub/dir/file_test.go"));
        assert!(!is_doc_file("README.md"));
        assert!(!is_doc_file("sub/_generated.go"));
        assert!(!is_doc_file("sub/.hidden.go"));
        assert!(!is_doc_file("sub/"));
        assert!(!is_doc_file("go"));
    }

    #[test]
    fn test_normalize_dir() {
        assert_eq!(normalize_dir(""), "");
        assert_eq!(normalize_dir("/sub"), "sub/");
        assert_eq!(normalize_dir("/a/b"), "a/b/");
    }

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("a/b/c.go"), ("a/b/", "c.go"));
        assert_eq!(split_path("c.go"), ("", "c.go"));
        assert_eq!(split_path("a/"), ("a/", ""));
    }

    #[test]
    fn test_source_file_text() {
        let file = SourceFile::inline("a.go", "https://x/a.go", b"package a".to_vec());
        assert_eq!(file.text(), "package a");
        let remote = SourceFile::remote("b.go", "https://x/b.go", "https://raw/b.go");
        assert_eq!(remote.text(), "");
        assert_eq!(remote.raw_url.as_deref(), Some("https://raw/b.go"));
    }
}
