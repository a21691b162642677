//! an - AN (安装) Unified Package Manager
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_panics_doc)]
//!
//! Formula-driven package manager for Linux.
//!
//! # Overview
//!
//! AN installs software from declarative TOML formulas: fetch a versioned
//! source archive, verify its SHA-256 checksum, run the formula's install
//! procedure, then run its smoke test. Every step is terminal on failure.
//!
//! # Architecture
//!
//! - **Typestate Pattern**: the pipeline uses `UnresolvedFormula` →
//!   `ResolvedFormula` → `FetchedFormula` → `InstalledFormula` to enforce
//!   correct ordering at compile time.
//! - **Actor Pattern**: database access is serialized through `DbHandle`
//!   for thread safety.
//! - **Newtypes**: `FormulaName`, `Version`, and `Sha256Digest` provide
//!   type-safe identifiers.
//!
//! # Directory Layout
//!
//! ```text
//! ~/.an/
//! ├── bin/        # Symlinks to installed binaries
//! ├── store/      # Installed prefixes by name/version
//! ├── cache/      # Downloaded archives (by digest)
//! ├── formulae/   # Formula index (TOML files)
//! ├── logs/       # Build logs
//! └── state.db    # SQLite database
//! ```

pub mod cmd;
pub mod ops;
pub mod store;
pub mod ui;

// Re-exports from other crates for convenience
pub use crate::store::DbHandle;
pub use an_core::flow;
pub use an_core::index::FormulaIndex;
pub use an_core::paths::*;
pub use an_core::USER_AGENT;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

// The formula smoke test asserts that `an --version` output matches /AN/.
pub const VERSION_STRING: &str = concat!("AN ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Parser)]
#[command(name = "an")]
#[command(author, version = VERSION_STRING)]
#[command(about = "AN (安装) - Unified Package Manager for Linux")]
pub struct Cli {
    /// Show what would happen without making changes
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install one or more formulas
    #[command(visible_alias = "i")]
    Install {
        /// Formula name(s), optionally with version (pkg or pkg@1.0.0),
        /// or a path to a local formula file
        #[arg(required = true)]
        targets: Vec<String>,
        /// Install from the [head] branch instead of the release archive
        #[arg(long)]
        head: bool,
    },
    /// Remove installed formulas
    #[command(visible_aliases = ["rm", "uninstall"])]
    Remove {
        /// Formula name(s)
        #[arg(required = true)]
        packages: Vec<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// List installed formulas
    #[command(visible_alias = "ls")]
    List,
    /// Search the formula index
    #[command(visible_alias = "s")]
    Search {
        /// Search query (name or description)
        query: String,
    },
    /// Show formula details
    Info {
        /// Formula name
        name: String,
    },
    /// Sync the formula index from the upstream repository
    Sync,
    /// Update an itself, then sync the formula index
    Update,
    /// Compute SHA256 digests of files (for formula authoring)
    #[command(hide = true)]
    Hash {
        /// Files to hash
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Formula authoring commands
    Formula {
        #[command(subcommand)]
        command: FormulaCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum FormulaCommands {
    /// Create a new formula template
    New {
        /// Formula name
        name: String,
        /// Directory to save the formula in
        #[arg(long, default_value = "formulae")]
        output_dir: PathBuf,
    },
    /// Validate a formula file
    Check {
        /// Formula file to check
        path: PathBuf,
    },
    /// Bump a formula to a new version (writes a new descriptor)
    Bump {
        /// Formula file to bump
        path: PathBuf,
        /// New version
        #[arg(long)]
        version: String,
        /// New source archive URL
        #[arg(long)]
        url: String,
        /// Checksum of the new archive (placeholder when omitted)
        #[arg(long)]
        sha256: Option<String>,
    },
}
