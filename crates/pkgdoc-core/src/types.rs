use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Format version of serialized [`Package`] records.
///
/// Bumping it invalidates every cached record and every stored ETag.
pub const PACKAGE_VERSION: &str = "1";

/// Message appended to [`Package::errors`] when exported symbols were dropped
/// to fit the size bound.
pub const TRUNCATION_NOTICE: &str = "Documentation truncated.";

/// Documentation record for one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Import path the record was requested under.
    pub import_path: String,
    /// Repository root; empty for standard library packages.
    pub project_root: String,
    /// Display name of the project.
    pub project_name: String,
    /// Human-facing project URL.
    pub project_url: String,
    /// Version token, prefixed with [`PACKAGE_VERSION`] once resolved.
    pub etag: String,
    /// When the record was built.
    pub updated: DateTime<Utc>,
    /// Package clause name; empty when no source files were found.
    pub name: String,
    /// Whether this is a `main` package.
    pub is_cmd: bool,
    /// First sentence of the package documentation.
    pub synopsis: String,
    /// Package documentation.
    pub doc: String,
    /// Problems found while building the record.
    pub errors: Vec<String>,
    /// Source files the record was built from.
    pub files: Vec<FileRef>,
    /// Imports of the non-test files.
    pub imports: Vec<String>,
    /// Additional imports of the test files.
    pub test_imports: Vec<String>,
    /// Exported constants, one entry per declaration.
    pub consts: Vec<Value>,
    /// Exported variables, one entry per declaration.
    pub vars: Vec<Value>,
    /// Exported functions not attached to a type.
    pub funcs: Vec<Func>,
    /// Exported types.
    pub types: Vec<Type>,
}

/// A source file with its browse link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: String,
    pub url: String,
}

/// A `const` or `var` declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value {
    /// Exported names declared.
    pub names: Vec<String>,
    pub decl: String,
    pub doc: String,
    /// Browse URL with line anchor.
    pub url: String,
}

/// A function or method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Func {
    pub name: String,
    /// Receiver type name for methods, empty otherwise.
    pub recv: String,
    pub decl: String,
    pub doc: String,
    pub url: String,
}

/// A type with its constructors and methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    pub name: String,
    pub decl: String,
    pub doc: String,
    pub url: String,
    /// Functions returning this type.
    pub funcs: Vec<Func>,
    pub methods: Vec<Func>,
}

impl Package {
    /// True when the package exports no constants, functions, types or variables.
    pub fn exports_nothing(&self) -> bool {
        self.consts.is_empty() && self.funcs.is_empty() && self.types.is_empty() && self.vars.is_empty()
    }

    /// Whether this is a standard library package.
    pub fn is_standard(&self) -> bool {
        self.project_root.is_empty()
    }

    /// Drop exported-symbol detail and record the truncation.
    pub fn truncate(&mut self) {
        self.consts.clear();
        self.vars.clear();
        self.funcs.clear();
        self.types.clear();
        self.errors.push(TRUNCATION_NOTICE.to_string());
    }
}

/// Index entry derived from a [`Package`], used for listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub import_path: String,
    pub synopsis: String,
    pub package_name: String,
    pub is_cmd: bool,
    /// Hidden records are kept for lookups but left out of listings.
    pub hide: bool,
    pub index_tokens: Vec<String>,
}

impl IndexRecord {
    /// Whether storing `other` in place of `self` would change a listing.
    ///
    /// Compares synopsis, visibility, command flag and tokens only.
    pub fn same_listing(&self, other: &Self) -> bool {
        self.synopsis == other.synopsis
            && self.hide == other.hide
            && self.is_cmd == other.is_cmd
            && self.index_tokens == other.index_tokens
    }
}

/// Successful outcome of a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Documentation was (re)built.
    Found(Box<Package>),
    /// The saved version token is still current.
    NotModified,
}
