//! Install-and-verify engine for toolchain recipes.
//!
//! The pipeline is strictly linear:
//!
//! ```text
//! Unbuilt --[build]--> Built --[classify]--> Classified --[stage]--> Staged --[verify]--> Verified
//! ```
//!
//! Any failing transition ends the install; see [`install`] for the entry
//! points and [`error::InstallError`] for what can go wrong.

pub mod builder;
pub mod classify;
pub mod error;
pub mod install;
pub mod io;
pub mod paths;
pub mod policy;
pub mod receipt;
pub mod reporter;
pub mod smoke;
pub mod stage;

pub use error::{BuildFailure, InstallError, Phase, SmokeTestFailure};
pub use install::{InstallOptions, install, install_and_verify, plan, verify};
pub use paths::*;
pub use reporter::{NullReporter, Reporter};
