use kiln_core::{Phase, Reporter};

use super::Output;

/// Reports pipeline progress to the terminal and to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalReporter {
    output: Output,
}

impl TerminalReporter {
    pub fn new(output: Output) -> Self {
        Self { output }
    }
}

impl Reporter for TerminalReporter {
    fn phase(&self, phase: Phase) {
        tracing::debug!(%phase, "phase reached");
        let msg = match phase {
            Phase::Unbuilt => return,
            Phase::Built => "build finished",
            Phase::Classified => "artifacts classified",
            Phase::Staged => "artifacts staged",
            Phase::Verified => "smoke test passed",
        };
        self.output.step(msg);
    }

    fn bucket_staged(&self, bucket: &str, files: usize) {
        tracing::debug!(bucket, files, "bucket staged");
        let noun = if files == 1 { "entry" } else { "entries" };
        self.output.detail(bucket, &format!("{files} {noun}"));
    }

    fn bucket_skipped(&self, bucket: &str) {
        self.output.detail(bucket, "skipped (optional, not built)");
    }

    fn info(&self, msg: &str) {
        tracing::debug!("{msg}");
        self.output.step(msg);
    }

    fn warning(&self, msg: &str) {
        tracing::debug!("{msg}");
        self.output.warning(msg);
    }
}
