//! Install-time failures.
//!
//! Every variant is fatal: the orchestrator stops at the first one and hands
//! it to the host unchanged. Optional buckets that match nothing are not an
//! error and never show up here.

use std::path::PathBuf;
use thiserror::Error;

/// Position in the install state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unbuilt,
    Built,
    Classified,
    Staged,
    Verified,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unbuilt => "unbuilt",
            Self::Built => "built",
            Self::Classified => "classified",
            Self::Staged => "staged",
            Self::Verified => "verified",
        };
        f.write_str(s)
    }
}

/// The build step did not produce a usable tree.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct BuildFailure {
    pub reason: String,
    pub exit_code: Option<i32>,
    /// Tail of the combined stdout/stderr of the build.
    pub output: String,
    pub log: Option<PathBuf>,
}

impl BuildFailure {
    pub(crate) fn preflight(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            exit_code: None,
            output: String::new(),
            log: None,
        }
    }
}

/// The installed toolchain could not run the smoke program, or its output
/// lacked the expected text.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct SmokeTestFailure {
    pub reason: String,
    pub exit_code: Option<i32>,
    /// Combined stdout/stderr of the invocation.
    pub output: String,
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Build failed: {0}")]
    Build(#[from] BuildFailure),

    #[error("Missing mandatory artifact: bucket '{bucket}' matched no files")]
    MissingArtifact { bucket: String },

    #[error("Failed to stage '{}' for bucket '{bucket}': {source}", path.display())]
    Stage {
        bucket: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Smoke test failed: {0}")]
    SmokeTest(#[from] SmokeTestFailure),

    #[error("Failed to write install receipt {}: {source}", path.display())]
    Receipt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    /// The phase the install was in when it failed.
    pub fn phase(&self) -> Phase {
        match self {
            Self::Build(_) => Phase::Unbuilt,
            Self::MissingArtifact { .. } | Self::Stage { .. } | Self::Receipt { .. } => {
                Phase::Classified
            }
            Self::SmokeTest(_) => Phase::Staged,
        }
    }

    /// Captured process output, for failures that carry one.
    pub fn diagnostic(&self) -> Option<&str> {
        let output = match self {
            Self::Build(f) => f.output.as_str(),
            Self::SmokeTest(f) => f.output.as_str(),
            _ => return None,
        };
        (!output.trim().is_empty()).then_some(output)
    }

    pub(crate) fn stage(bucket: &str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Stage {
            bucket: bucket.to_string(),
            path: path.into(),
            source,
        }
    }
}
