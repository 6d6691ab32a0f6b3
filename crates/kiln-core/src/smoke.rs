//! End-to-end smoke test of an installed toolchain.
//!
//! Writes the recipe's program into a throwaway directory, runs the staged
//! compiler on it, and looks for the expected text in the combined output.
//! The run passes only when the compiler exits zero and the text appears.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use kiln_schema::SmokeSpec;

use crate::error::SmokeTestFailure;
use crate::io::process::{file_contains, format_duration, read_tail, run_captured};

/// How much of the end of the output is kept for diagnostics.
const OUTPUT_LIMIT_BYTES: u64 = 64 * 1024;

/// What a passing smoke test saw.
#[derive(Debug, Clone)]
pub struct SmokeOutcome {
    pub output: String,
    pub exit_code: Option<i32>,
}

#[derive(Debug)]
pub struct SmokeRunner<'a> {
    case: &'a SmokeSpec,
    timeout: Option<Duration>,
}

impl<'a> SmokeRunner<'a> {
    pub fn new(case: &'a SmokeSpec) -> Self {
        Self {
            case,
            timeout: None,
        }
    }

    /// Kill the invocation after `timeout`. No limit by default.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the case against the toolchain installed under `prefix`.
    ///
    /// `root` is exported as the case's root environment variable, if any,
    /// so the compiler resolves its headers and backend from the staged
    /// layout rather than a build tree. Both paths may be relative to the
    /// caller's working directory; the compiler itself runs elsewhere.
    ///
    /// # Errors
    ///
    /// Returns a [`SmokeTestFailure`] if the scratch program cannot be
    /// written, the compiler cannot be started, it times out, exits
    /// non-zero, or its output lacks the expected text.
    pub fn run(&self, prefix: &Path, root: &Path) -> Result<SmokeOutcome, SmokeTestFailure> {
        let case = self.case;
        let failure = |reason: String| SmokeTestFailure {
            reason,
            exit_code: None,
            output: String::new(),
        };

        let prefix = std::path::absolute(prefix)
            .map_err(|e| failure(format!("cannot resolve {}: {e}", prefix.display())))?;
        let root = std::path::absolute(root)
            .map_err(|e| failure(format!("cannot resolve {}: {e}", root.display())))?;

        let scratch = tempfile::Builder::new()
            .prefix("kiln-smoke-")
            .tempdir()
            .map_err(|e| failure(format!("cannot create scratch directory: {e}")))?;
        std::fs::write(scratch.path().join(&case.file), &case.program)
            .map_err(|e| failure(format!("cannot write {}: {e}", case.file)))?;

        let binary = prefix.join(&case.binary);
        let args = case.rendered_args();

        let mut cmd = Command::new(&binary);
        cmd.args(&args).current_dir(scratch.path());
        if let Some(var) = &case.root_env {
            cmd.env(var, &root);
        }

        tracing::info!(binary = %binary.display(), args = ?args, "running smoke test");

        // Removed together with the scratch directory.
        let log_path = scratch.path().join(".kiln-smoke.log");
        let captured = run_captured(&mut cmd, &log_path, self.timeout)
            .map_err(|e| failure(format!("cannot run {}: {e}", binary.display())))?;
        let output = read_tail(&log_path, OUTPUT_LIMIT_BYTES).unwrap_or_default();

        if captured.timed_out {
            return Err(SmokeTestFailure {
                reason: format!(
                    "{} timed out after {}",
                    binary.display(),
                    self.timeout.map_or_else(|| "?".to_string(), format_duration)
                ),
                exit_code: None,
                output,
            });
        }

        if !captured.success() {
            return Err(SmokeTestFailure {
                reason: format!(
                    "{} exited with {}",
                    binary.display(),
                    captured
                        .code()
                        .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"))
                ),
                exit_code: captured.code(),
                output,
            });
        }

        let found = file_contains(&log_path, &case.expect)
            .map_err(|e| failure(format!("cannot read smoke test output: {e}")))?;
        if !found {
            return Err(SmokeTestFailure {
                reason: format!("expected output '{}' not found", case.expect),
                exit_code: captured.code(),
                output,
            });
        }

        Ok(SmokeOutcome {
            output,
            exit_code: captured.code(),
        })
    }
}
