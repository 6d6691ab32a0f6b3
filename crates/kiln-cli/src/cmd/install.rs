//! Install command

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use kiln_core::{InstallOptions, try_log_dir};

use crate::ui::{Output, TerminalReporter};

/// Build the tree under `source`, stage it into the prefix, and (unless
/// `skip_test`) run the smoke test against the result.
pub fn install(
    source: &Path,
    prefix: Option<PathBuf>,
    recipe: Option<&Path>,
    skip_test: bool,
    timeout: Option<u64>,
) -> Result<()> {
    let recipe = crate::load_recipe(recipe)?;
    let prefix = crate::resolve_prefix(prefix)?;
    let log_dir = try_log_dir().context("Could not determine kiln home directory")?;
    let source = source
        .canonicalize()
        .with_context(|| format!("Source directory {} not found", source.display()))?;

    let options = InstallOptions {
        source,
        prefix,
        log_dir,
        timeout: crate::timeout(timeout),
    };

    let output = Output::new();
    let reporter = TerminalReporter::new(output);
    let start = Instant::now();

    let version = recipe.version()?;
    output.section(&format!("{} {}", recipe.package.name, version));
    output.detail("prefix", &options.prefix.display().to_string());

    let receipt = if skip_test {
        let receipt = kiln_core::install(&recipe, &options, &reporter)?;
        output.warning("smoke test skipped");
        receipt
    } else {
        let verified = kiln_core::install_and_verify(&recipe, &options, &reporter)?;
        if let Some(line) = verified.smoke.output.lines().find(|l| l.contains(&recipe.smoke.expect)) {
            output.detail("smoke", line.trim());
        }
        verified.receipt
    };

    output.summary(
        &format!(
            "installed {} {} ({} files)",
            receipt.name,
            receipt.version,
            receipt.files.len()
        ),
        start.elapsed().as_secs_f64(),
    );
    Ok(())
}
