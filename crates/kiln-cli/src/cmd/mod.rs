//! Subcommand implementations.

pub mod check;
pub mod install;
pub mod plan;
pub mod recipe;
pub mod smoke;
