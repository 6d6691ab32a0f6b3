//! Recipe command

/// Print the built-in Wyn recipe, e.g. as a starting point for `--recipe`.
pub fn recipe() {
    print!("{}", kiln_schema::WYN_RECIPE);
}
