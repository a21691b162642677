//! Search command

use anyhow::{bail, Context as _, Result};
use crossterm::style::Stylize;

use an_core::index::FormulaIndex;
use an_core::paths::formula_dir;

/// Search formulas in the local index
pub fn search(query: &str) -> Result<()> {
    let start = std::time::Instant::now();

    let dir = formula_dir();
    let index = FormulaIndex::load(&dir).context("Failed to load formula index")?;
    if index.is_empty() {
        bail!("No formula index found. Run 'an sync' first.");
    }

    let results = index.search(query);

    if results.is_empty() {
        println!();
        println!("  No formulas found matching '{}'", query.white());
        println!();
        return Ok(());
    }

    println!();
    for entry in &results {
        println!(
            "  {:<24}{:<12}{}",
            entry.formula.name.as_str().white().bold(),
            entry.formula.version.as_str().dark_grey(),
            entry.formula.description
        );
    }

    let elapsed = start.elapsed();
    println!();
    println!(
        "SEARCH COMPLETE {}, elapsed {:.2}s",
        results.len(),
        elapsed.as_secs_f64()
    );

    Ok(())
}
