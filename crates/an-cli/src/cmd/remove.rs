//! Remove command

use anyhow::{bail, Context as _, Result};

use an_core::paths::store_path;
use an_core::Reporter;
use an_schema::{FormulaName, Version};

use crate::ui::{confirm, ConsoleReporter};
use crate::DbHandle;

/// Remove installed formulas: linked binaries, store prefixes, DB rows.
pub async fn remove(packages: &[String], yes: bool, dry_run: bool) -> Result<()> {
    let reporter = ConsoleReporter;
    let db = DbHandle::spawn().context("Failed to open state database")?;

    for package in packages {
        let name = FormulaName::new(package);
        let Some(installed) = db.get_package(name.to_string()).await? else {
            bail!("formula '{name}' is not installed");
        };
        let version = Version::new(&installed.version);

        if dry_run {
            reporter.info(&format!("would remove {name} {version}"));
            continue;
        }

        if !yes && !confirm(&format!("Remove {name} {version}?"))? {
            reporter.warning("removal cancelled");
            continue;
        }

        reporter.removing(&name, &version);

        let files = db.remove_package(name.to_string()).await?;
        for file in files {
            if let Err(e) = std::fs::remove_file(&file) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    reporter.warning(&format!("could not remove {}: {e}", file.display()));
                }
            }
        }

        let prefix_root = store_path().join(&name);
        if prefix_root.exists() {
            std::fs::remove_dir_all(&prefix_root)
                .with_context(|| format!("Failed to remove {}", prefix_root.display()))?;
        }

        reporter.done(&name, &version, "removed");
    }

    Ok(())
}
