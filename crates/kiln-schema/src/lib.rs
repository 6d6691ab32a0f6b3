//! Shared recipe types for kiln.
//!
//! A recipe declares everything needed to turn an unpacked source archive
//! into an installed, verified toolchain: package metadata, the build
//! script, the ordered staging plan of artifact buckets, and the smoke test
//! that proves the installed compiler works.

pub mod recipe;
pub mod types;

// Re-exports
pub use recipe::*;
pub use types::*;

/// The built-in Wyn recipe, embedded at compile time.
pub const WYN_RECIPE: &str = include_str!("../recipes/wyn.toml");

/// Placeholder accepted in place of a real checksum for unreleased archives.
pub const CHECKSUM_PLACEHOLDER: &str = "PLACEHOLDER";
