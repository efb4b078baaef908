//! Command-line arguments for `pkgdoc`.
//!
//! ```bash
//! pkgdoc get github.com/gorilla/mux
//! pkgdoc get net/http --json
//! pkgdoc check github.com/user/repo foobar
//! pkgdoc index
//! pkgdoc reload github.com/gorilla/mux
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Resolve Go import paths to documentation.
#[derive(Parser, Clone, Debug)]
#[command(name = "pkgdoc")]
#[command(version)]
#[command(about = "Resolve Go import paths to source-derived documentation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a configuration file
    #[arg(long, global = true, env = "PKGDOC_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Fetch and print the documentation for a package
    Get {
        /// Import path, e.g. `github.com/user/repo/sub`
        import_path: String,

        /// Print the record as JSON
        #[arg(long)]
        json: bool,

        /// Give up after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Check whether import paths are structurally valid
    Check {
        /// Import paths to check
        #[arg(required = true)]
        import_paths: Vec<String>,
    },

    /// List every visible package and command
    Index {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Drop the cached and stored documentation for a package
    Reload {
        /// Import path to reload
        import_path: String,
    },
}
