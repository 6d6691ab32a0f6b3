//! Terminal output.
//!
//! Everything the user is meant to read goes through [`Output`]; diagnostics
//! for developers go through `tracing` and stay on stderr.

mod reporter;

pub use reporter::TerminalReporter;

use crossterm::style::Stylize;

/// Column width for labels in key/value listings.
pub const LABEL_WIDTH: usize = 12;

/// Cheap handle for printing status lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output;

#[allow(clippy::unused_self)]
impl Output {
    pub fn new() -> Self {
        Self
    }

    /// A blank line followed by a bold heading.
    pub fn section(&self, title: &str) {
        println!();
        println!("  {}", title.white().bold());
    }

    /// One step of an ongoing operation.
    pub fn step(&self, msg: &str) {
        println!("  {} {msg}", "·".dark_grey());
    }

    pub fn detail(&self, label: &str, value: &str) {
        println!("  {}{value}", padded(label).dark_grey());
    }

    /// Like [`Output::detail`], on stderr, for context under an error.
    pub fn error_detail(&self, label: &str, value: &str) {
        eprintln!("  {}{value}", padded(label).dark_grey());
    }

    pub fn info(&self, msg: &str) {
        println!("  {msg}");
    }

    pub fn success(&self, msg: &str) {
        println!("  {} {msg}", "✓".green());
    }

    pub fn warning(&self, msg: &str) {
        eprintln!("  {} {msg}", "!".yellow().bold());
    }

    pub fn error(&self, msg: &str) {
        eprintln!("  {} {msg}", "✗".red().bold());
    }

    /// Indented raw text, e.g. captured process output.
    pub fn block(&self, text: &str) {
        for line in text.lines() {
            eprintln!("    {}", line.dark_grey());
        }
    }

    pub fn summary(&self, action: &str, elapsed_secs: f64) {
        println!();
        println!(
            "  {} {action} {}",
            "✓".green(),
            format!("in {elapsed_secs:.1}s").dark_grey()
        );
    }
}

fn padded(label: &str) -> String {
    format!("{label:<LABEL_WIDTH$}")
}
