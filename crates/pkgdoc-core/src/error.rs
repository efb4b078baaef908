//! Error types and handling for pkgdoc-core operations.
//!
//! Every fallible operation in the crate returns [`Result<T>`]. The variants map
//! onto the resolution taxonomy:
//!
//! - **`PackageNotFound`**: the host confirmed the path does not exist. Terminal;
//!   the caller removes the package from the index.
//! - **`Transport`**: a network or HTTP failure talking to `host`. Recoverable by
//!   serving a previously stored record when one exists.
//! - **`InvalidImportPath`**: the import path failed the structural check. No
//!   network access was attempted.
//! - **`Build`**: documentation construction failed on otherwise valid source.
//! - **`Cancelled`** / **`Timeout`**: the caller's cancellation token fired or the
//!   deadline elapsed while a request was in flight.
//!
//! "Not modified" is not an error; see [`crate::Resolution::NotModified`].
//!
//! ```rust
//! use pkgdoc_core::Error;
//!
//! let err = Error::Transport {
//!     host: "api.github.com".to_string(),
//!     message: "get https://api.github.com/repos/a/b/git/refs -> 502".to_string(),
//! };
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "transport");
//! ```

use thiserror::Error;

/// The main error type for pkgdoc-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The hosting service confirmed that the package does not exist.
    #[error("package not found")]
    PackageNotFound,

    /// Network operation against a hosting service failed.
    ///
    /// Carries the remote host so callers can report which service is failing
    /// without leaking full URLs into user-facing messages.
    #[error("error getting files from {host}: {message}")]
    Transport {
        /// Host that produced the failure (e.g. `api.github.com`).
        host: String,
        /// Description of the failure.
        message: String,
    },

    /// Import path is structurally invalid; no request was sent.
    #[error("invalid import path: {0}")]
    InvalidImportPath(String),

    /// Documentation could not be built from the fetched source.
    #[error("build error: {0}")]
    Build(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller-supplied deadline elapsed.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Durable store operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration is invalid or inaccessible.
    #[error("configuration error: {0}")]
    Config(String),

    /// A record exceeded a hard size bound even after truncation.
    #[error("resource limited: {0}")]
    ResourceLimited(String),

    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Build a transport error for `url`, extracting the host for diagnostics.
    pub fn transport(url: &str, message: impl Into<String>) -> Self {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| url.to_string());
        Self::Transport {
            host,
            message: message.into(),
        }
    }

    /// Check whether a previously stored record may be served instead of failing.
    ///
    /// Returns `true` for transport failures, timeouts and transient I/O errors.
    /// `PackageNotFound`, validation and build errors are terminal.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier for structured logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::PackageNotFound => "not_found",
            Self::Transport { .. } => "transport",
            Self::InvalidImportPath(_) => "validation",
            Self::Build(_) => "build",
            Self::Cancelled => "cancelled",
            Self::Timeout(_) => "timeout",
            Self::Storage(_) => "storage",
            Self::Serialization(_) => "serialization",
            Self::Config(_) => "config",
            Self::ResourceLimited(_) => "resource_limited",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io;

    #[test]
    fn test_transport_error_extracts_host() {
        let err = Error::transport("https://bitbucket.org/a/b/raw/tip/x.go", "get -> 500");
        match &err {
            Error::Transport { host, message } => {
                assert_eq!(host, "bitbucket.org");
                assert_eq!(message, "get -> 500");
            },
            other => panic!("unexpected variant: {other:?}"),
        }
        assert!(err.to_string().contains("bitbucket.org"));
    }

    #[test]
    fn test_transport_error_keeps_unparseable_url() {
        let err = Error::transport("not a url", "boom");
        assert!(matches!(err, Error::Transport { ref host, .. } if host == "not a url"));
    }

    #[test]
    fn test_error_recoverability() {
        let recoverable = vec![
            Error::transport("https://example.com", "reset"),
            Error::Timeout("deadline".to_string()),
            Error::Io(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
        ];
        for error in recoverable {
            assert!(error.is_recoverable(), "{error} should be recoverable");
        }

        let terminal = vec![
            Error::PackageNotFound,
            Error::InvalidImportPath("foobar".to_string()),
            Error::Build("expected 'package'".to_string()),
            Error::Cancelled,
            Error::Storage("disk full".to_string()),
            Error::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied")),
        ];
        for error in terminal {
            assert!(!error.is_recoverable(), "{error} should be terminal");
        }
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(Error::PackageNotFound.category(), "not_found");
        assert_eq!(Error::InvalidImportPath(String::new()).category(), "validation");
        assert_eq!(Error::Build(String::new()).category(), "build");
        assert_eq!(Error::Cancelled.category(), "cancelled");
        assert_eq!(Error::Storage(String::new()).category(), "storage");
    }

    #[test]
    fn test_error_from_serde_json() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    proptest! {
        #[test]
        fn test_build_error_display_preserves_message(msg in r".{0,200}") {
            let err = Error::Build(msg.clone());
            prop_assert!(err.to_string().contains(&msg));
        }
    }
}
