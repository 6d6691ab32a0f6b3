//! Build invocation.
//!
//! Runs the recipe's build script inside the unpacked source tree and
//! reports pass/fail. The build tool itself is opaque: kiln only cares that
//! the script exits zero and leaves artifacts behind for the classifier.
//!
//! ## Environment contract
//!
//! The host environment is inherited, plus:
//!
//! | Variable | Value |
//! |---|---|
//! | `JOBS` | Logical CPU count |
//! | `SOURCE_DATE_EPOCH` | `0` (epoch zero for reproducible timestamps) |
//! | recipe `[build.env]` | As declared; overrides the above |
//!
//! Stdout and stderr go to one build log. On failure the last
//! [`OUTPUT_TAIL_BYTES`] of that log travel with the [`BuildFailure`].

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use kiln_schema::BuildSpec;

use crate::error::BuildFailure;
use crate::io::process::{format_duration, read_tail, run_captured};

/// Fixed epoch for `SOURCE_DATE_EPOCH`.
const SOURCE_DATE_EPOCH: &str = "0";

/// How much of the build log a failure carries.
pub const OUTPUT_TAIL_BYTES: u64 = 16 * 1024;

/// Runs a [`BuildSpec`] against a source tree.
#[derive(Debug)]
pub struct Builder<'a> {
    spec: &'a BuildSpec,
    build_deps: &'a [String],
    timeout: Option<Duration>,
}

impl<'a> Builder<'a> {
    pub fn new(spec: &'a BuildSpec, build_deps: &'a [String]) -> Self {
        Self {
            spec,
            build_deps,
            timeout: None,
        }
    }

    /// Kill the build after `timeout`. No limit by default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute the build script with `tree` as working directory.
    ///
    /// 1. Checks every build dependency resolves on `PATH`.
    /// 2. Runs `script` via `/bin/sh -c`, output to `log_path`.
    /// 3. Fails unless the script exits zero within the timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildFailure`] if the tree is missing, a build dependency
    /// is not installed, the script cannot be spawned, it exits non-zero, or
    /// it runs past the timeout.
    pub fn build(&self, tree: &Path, log_path: &Path) -> Result<(), BuildFailure> {
        if !tree.is_dir() {
            return Err(BuildFailure::preflight(format!(
                "build directory {} does not exist",
                tree.display()
            )));
        }

        for dep in self.build_deps {
            match which::which(dep) {
                Ok(found) => tracing::debug!(dep = %dep, path = %found.display(), "build dependency"),
                Err(e) => {
                    return Err(BuildFailure::preflight(format!(
                        "build dependency '{dep}' not found on PATH: {e}"
                    )));
                }
            }
        }

        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c")
            .arg(&self.spec.script)
            .current_dir(tree)
            .env("JOBS", num_cpus::get().to_string())
            .env("SOURCE_DATE_EPOCH", SOURCE_DATE_EPOCH)
            .envs(&self.spec.env);

        tracing::info!(script = %self.spec.script, dir = %tree.display(), "running build");

        let captured = run_captured(&mut cmd, log_path, self.timeout).map_err(|e| BuildFailure {
            reason: format!("failed to execute build script: {e}"),
            exit_code: None,
            output: String::new(),
            log: Some(log_path.to_path_buf()),
        })?;

        if captured.success() {
            if tracing::enabled!(tracing::Level::DEBUG) {
                let tail = read_tail(log_path, OUTPUT_TAIL_BYTES).unwrap_or_default();
                tracing::debug!(log = %log_path.display(), "build succeeded:\n{tail}");
            }
            return Ok(());
        }

        let output = read_tail(log_path, OUTPUT_TAIL_BYTES).unwrap_or_default();
        let reason = if captured.timed_out {
            format!(
                "build script timed out after {}",
                self.timeout.map_or_else(|| "?".to_string(), format_duration)
            )
        } else {
            format!("build script failed with exit code: {:?}", captured.code())
        };

        Err(BuildFailure {
            reason,
            exit_code: captured.code(),
            output,
            log: Some(log_path.to_path_buf()),
        })
    }
}
