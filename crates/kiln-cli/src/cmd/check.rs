//! Check command

use std::path::Path;

use anyhow::Result;

use crate::ui::Output;

/// Validate a recipe and print a short summary of it.
pub fn check(recipe: Option<&Path>) -> Result<()> {
    let recipe = crate::load_recipe(recipe)?;
    let output = Output::new();

    output.success("Recipe is valid");
    output.detail("name", &recipe.package.name);
    output.detail("version", &recipe.version()?);
    output.detail("source", &recipe.package.url);
    output.detail("build", &recipe.build.script);
    if !recipe.dependencies.build.is_empty() {
        output.detail("requires", &recipe.dependencies.build.join(", "));
    }

    let optional = recipe.buckets.iter().filter(|b| b.is_optional()).count();
    output.detail(
        "buckets",
        &format!("{} ({optional} optional)", recipe.buckets.len()),
    );
    output.detail("smoke", &recipe.smoke.rendered_args().join(" "));

    if recipe.package.has_placeholder_checksum() {
        output.warning("sha256 is a placeholder; the source archive is not pinned");
    }
    Ok(())
}
