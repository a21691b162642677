//! Info command

use anyhow::{bail, Context as _, Result};
use crossterm::style::Stylize;

use an_core::index::FormulaIndex;
use an_core::paths::formula_dir;
use an_schema::FormulaName;

use crate::store::StateDb;
use crate::ui::format_size;

/// Show info about a specific formula
pub fn info(name_str: &str) -> Result<()> {
    let name = FormulaName::new(name_str);
    let db = StateDb::open().context("Failed to open state database")?;

    let installed = db.get_package(name.as_str())?;
    let index = FormulaIndex::load(&formula_dir())?;
    let entry = index.find(&name);

    if installed.is_none() && entry.is_none() {
        bail!("formula '{name}' not found");
    }

    let lw = 12;

    println!();
    if let Some(f) = entry {
        println!(
            "  {} {}",
            name.as_str().white().bold(),
            f.formula.version.as_str().dark_grey()
        );
        if !f.formula.description.is_empty() {
            println!("  {}", f.formula.description);
        }
        println!();

        println!("  {:<lw$}{}", "homepage", f.formula.homepage);
        println!("  {:<lw$}{}", "license", f.formula.license);
        println!("  {:<lw$}{}", "source", f.source.url);
        if let Some(head) = &f.head {
            println!("  {:<lw$}{} ({})", "head", head.url, head.branch);
        }
        if !f.dependencies.build.is_empty() {
            println!("  {:<lw$}{}", "build deps", f.dependencies.build.join(", "));
        }
        if f.has_placeholder_checksum() {
            println!(
                "  {:<lw$}{}",
                "checksum",
                "placeholder - not installable".yellow()
            );
        }
    } else {
        println!("  {}", name.as_str().white().bold());
    }

    if let Some(pkg) = &installed {
        let dt = chrono::DateTime::from_timestamp(pkg.installed_at, 0)
            .unwrap_or_default()
            .format("%Y-%m-%d")
            .to_string();
        println!(
            "  {:<lw$}{} ({}, {})",
            "installed",
            pkg.version,
            format_size(pkg.size_bytes),
            dt
        );
    }

    Ok(())
}
