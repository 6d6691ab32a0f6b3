//! Plan command

use std::path::Path;

use anyhow::{Result, bail};
use crossterm::style::Stylize;
use kiln_core::install::PlannedBucket;
use kiln_core::policy::Decision;

use crate::ui::Output;

/// Classify an already-built tree and show what would be staged where.
pub fn plan(source: &Path, recipe: Option<&Path>) -> Result<()> {
    let recipe = crate::load_recipe(recipe)?;
    let tree = recipe.build_tree(source);
    if !tree.is_dir() {
        bail!("Build tree {} not found", tree.display());
    }

    let output = Output::new();
    output.section(&format!("{} staging plan", recipe.package.name));
    output.detail("tree", &tree.display().to_string());
    println!();

    let planned = kiln_core::plan(&recipe, source);
    let name_width = planned.iter().map(|p| p.spec.name.len()).max().unwrap_or(0) + 2;

    for row in &planned {
        print_row(row, name_width);
    }

    let missing: Vec<&str> = planned
        .iter()
        .filter(|p| p.decision == Decision::Missing)
        .map(|p| p.spec.name.as_str())
        .collect();

    println!();
    if missing.is_empty() {
        output.success("all mandatory buckets have artifacts");
    } else {
        output.warning(&format!(
            "install would fail: {} matched nothing",
            missing.join(", ")
        ));
    }
    Ok(())
}

fn print_row(row: &PlannedBucket, name_width: usize) {
    let name = format!("{:<name_width$}", row.spec.name);
    let decision = format!("{:<8}", row.decision.as_str());
    let decision = match row.decision {
        Decision::Stage => decision.green(),
        Decision::Skip => decision.dark_grey(),
        Decision::Missing => decision.red().bold(),
    };
    println!(
        "  {}{} {:>3}  {} → {}",
        name.white(),
        decision,
        row.matches.len(),
        row.spec.source.as_str().dark_grey(),
        row.spec.dest
    );
    tracing::debug!(bucket = %row.spec.name, matches = ?row.matches, "planned");
}
