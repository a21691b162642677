//! List command

use anyhow::{Context as _, Result};

use crate::store::StateDb;
use crate::ui::format_size;

/// List all installed formulas
pub fn list() -> Result<()> {
    let db = StateDb::open().context("Failed to open state database")?;
    let packages = db.list_packages()?;

    if packages.is_empty() {
        println!();
        println!("  No formulas installed.");
        println!("  Run 'an sync && an install <formula>' to get started.");
        return Ok(());
    }

    println!();
    let mut total_size: u64 = 0;
    for pkg in &packages {
        total_size += pkg.size_bytes;

        let dt = chrono::DateTime::from_timestamp(pkg.installed_at, 0)
            .unwrap_or_default()
            .format("%Y-%m-%d")
            .to_string();

        println!(
            "  {:<24}{:<16}{:<12}{}",
            pkg.name,
            pkg.version,
            format_size(pkg.size_bytes),
            dt
        );
    }

    println!();
    println!("  {} installed, {}", packages.len(), format_size(total_size));

    Ok(())
}
