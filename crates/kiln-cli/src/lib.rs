//! kiln - build, install and smoke-test the Wyn toolchain
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Takes an unpacked Wyn source archive, runs its build, stages the artifacts
//! into a prefix, and proves the installed compiler works.
//!
//! # Prefix Layout
//!
//! ```text
//! <prefix>/
//! ├── bin/wyn
//! └── share/wyn/
//!     ├── src/                # runtime headers and sources
//!     ├── vendor/minicoro/
//!     ├── vendor/tcc/         # lib/, bin/ (optional), tcc_include/
//!     ├── runtime/            # prebuilt archives (optional)
//!     └── INSTALL_RECEIPT.json
//! ```
//!
//! Build logs are kept under `~/.kiln/logs` (or `$KILN_HOME/logs`), never
//! inside the prefix.

pub mod cmd;
pub mod ui;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kiln_schema::Recipe;

#[derive(Debug, Parser)]
#[command(name = "kiln")]
#[command(author, version, about = "kiln - build, install and smoke-test the Wyn toolchain")]
pub struct Cli {
    /// Show debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build an unpacked source tree and install it into a prefix
    Install {
        /// Directory the source archive was unpacked into
        #[arg(long)]
        source: PathBuf,
        /// Installation prefix [default: $KILN_PREFIX or ~/.kiln/prefix]
        #[arg(long)]
        prefix: Option<PathBuf>,
        /// Recipe file to use instead of the built-in Wyn recipe
        #[arg(long)]
        recipe: Option<PathBuf>,
        /// Stop after staging; do not run the smoke test
        #[arg(long)]
        skip_test: bool,
        /// Kill the build or smoke test after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Smoke-test an existing install
    Test {
        /// Installation prefix [default: $KILN_PREFIX or ~/.kiln/prefix]
        #[arg(long)]
        prefix: Option<PathBuf>,
        /// Recipe file to use instead of the built-in Wyn recipe
        #[arg(long)]
        recipe: Option<PathBuf>,
        /// Kill the smoke test after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
    /// Show what staging would copy from a built tree, without copying
    Plan {
        /// Directory the source archive was unpacked into
        #[arg(long)]
        source: PathBuf,
        /// Recipe file to use instead of the built-in Wyn recipe
        #[arg(long)]
        recipe: Option<PathBuf>,
    },
    /// Validate a recipe file
    Check {
        /// Recipe file to check (the built-in recipe if omitted)
        #[arg(long)]
        recipe: Option<PathBuf>,
    },
    /// Print the built-in Wyn recipe
    Recipe,
}

/// Load `path`, or the built-in Wyn recipe when no path is given.
pub fn load_recipe(path: Option<&Path>) -> Result<Recipe> {
    match path {
        Some(path) => Recipe::from_file(path)
            .with_context(|| format!("Failed to load recipe {}", path.display())),
        None => Recipe::wyn().context("Built-in Wyn recipe is invalid"),
    }
}

/// The explicit prefix, else `$KILN_PREFIX`, else `~/.kiln/prefix`, made
/// absolute against the current directory.
pub fn resolve_prefix(prefix: Option<PathBuf>) -> Result<PathBuf> {
    let prefix = match prefix {
        Some(prefix) => prefix,
        None => kiln_core::try_default_prefix()
            .context("Could not determine an install prefix; pass --prefix")?,
    };
    std::path::absolute(&prefix)
        .with_context(|| format!("Failed to resolve prefix {}", prefix.display()))
}

pub(crate) fn timeout(secs: Option<u64>) -> Option<Duration> {
    secs.map(Duration::from_secs)
}
