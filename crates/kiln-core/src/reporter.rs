//! Reporter trait for dependency injection
//!
//! This trait allows the install pipeline to report progress without being
//! coupled to a specific terminal UI.

use crate::error::Phase;

pub trait Reporter: Send + Sync {
    /// The pipeline reached `phase`.
    fn phase(&self, phase: Phase);

    /// A bucket was copied into the prefix.
    fn bucket_staged(&self, bucket: &str, files: usize);

    /// An optional bucket matched nothing and was left out.
    fn bucket_skipped(&self, bucket: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn phase(&self, _: Phase) {}
    fn bucket_staged(&self, _: &str, _: usize) {}
    fn bucket_skipped(&self, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
