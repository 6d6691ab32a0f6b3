//! Test command

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::ui::Output;

/// Run the recipe's smoke test against an existing install.
pub fn smoke(prefix: Option<PathBuf>, recipe: Option<&Path>, timeout: Option<u64>) -> Result<()> {
    let recipe = crate::load_recipe(recipe)?;
    let prefix = crate::resolve_prefix(prefix)?;

    let binary = prefix.join(&recipe.smoke.binary);
    if !binary.exists() {
        bail!(
            "{} is not installed in {} ({} not found)",
            recipe.package.name,
            prefix.display(),
            binary.display()
        );
    }

    let output = Output::new();
    let outcome = kiln_core::verify(&recipe, &prefix, crate::timeout(timeout))?;

    output.block(outcome.output.trim_end());
    output.success(&format!(
        "{} works: output contains '{}'",
        binary.display(),
        recipe.smoke.expect
    ));
    Ok(())
}
