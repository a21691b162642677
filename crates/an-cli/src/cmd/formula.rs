//! Formula authoring commands
//!
//! `new` writes a template, `check` validates a descriptor, and `bump`
//! writes the next-version descriptor. Descriptors are immutable per
//! release: bumping never edits the old file.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context as _, Result};

use an_core::Reporter;
use an_schema::{Formula, FormulaError, Version, PLACEHOLDER_SHA256};

use crate::ui::ConsoleReporter;

/// Create a new formula template in `output_dir`.
pub fn new(name: &str, output_dir: &Path) -> Result<()> {
    let reporter = ConsoleReporter;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let path = output_dir.join(format!("{name}.toml"));
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let template = format!(
        r#"[formula]
name = "{name}"
description = ""
homepage = ""
license = ""
version = "0.1.0"

[source]
url = ""
sha256 = "{PLACEHOLDER_SHA256}"

[dependencies]
build = []

[install]
script = ""

[test]
script = "{name} --version"
"#
    );
    fs::write(&path, template)?;

    reporter.success(&format!("created {}", path.display()));
    reporter.info("fill in the fields, then run 'an formula check' on it");
    Ok(())
}

/// Validate a formula file, surfacing placeholder checksums explicitly.
pub fn check(path: &Path) -> Result<()> {
    let reporter = ConsoleReporter;
    let formula = Formula::from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    match formula.validate() {
        Ok(()) => {
            reporter.success(&format!(
                "{} {} is valid",
                formula.formula.name, formula.formula.version
            ));
            Ok(())
        }
        Err(FormulaError::Checksum(e)) if formula.has_placeholder_checksum() => {
            reporter.error(&format!("{}: {e}", path.display()));
            reporter.info("compute the digest with: an hash <archive>");
            bail!("formula has a placeholder checksum");
        }
        Err(e) => {
            reporter.error(&format!("{}: {e}", path.display()));
            bail!("formula is invalid");
        }
    }
}

/// Write the next-version descriptor next to `path`.
pub fn bump(path: &Path, version: &str, url: &str, sha256: Option<&str>) -> Result<()> {
    let reporter = ConsoleReporter;
    let mut formula = Formula::from_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    formula.formula.version = Version::new(version);
    formula.source.url = url.to_string();
    formula.source.sha256 = sha256.unwrap_or(PLACEHOLDER_SHA256).to_string();

    let dir = path.parent().unwrap_or(Path::new("."));
    let new_path = dir.join(format!("{}-{version}.toml", formula.formula.name));
    if new_path.exists() {
        bail!("{} already exists", new_path.display());
    }

    let content = toml::to_string_pretty(&formula)?;
    fs::write(&new_path, content)?;

    reporter.success(&format!("created {}", new_path.display()));
    if sha256.is_none() {
        reporter.warning("checksum is a placeholder; run 'an hash' on the new archive");
    }
    Ok(())
}
