//! Sync command
//!
//! Refreshes the local formula directory from the upstream repository.
//! Prefers a shallow sparse git clone; falls back to fetching known
//! formulas over raw HTTPS when git is unavailable.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context as _, Result};

use an_core::paths::formula_dir;
use an_core::Reporter;

use crate::ui::ConsoleReporter;

/// Upstream repository holding the formula directory.
const REPO_URL: &str = "https://github.com/clearclown/AN.git";

/// Raw-content base URL for the HTTPS fallback.
const RAW_BASE: &str = "https://raw.githubusercontent.com/clearclown/AN/main/formulae";

/// Formulas fetched individually when git is unavailable.
const FALLBACK_FORMULAS: &[&str] = &[
    "firefox",
    "brave",
    "gimp",
    "vlc",
    "obsidian",
    "vscode",
    "discord",
    "keepassxc",
    "neovim",
    "audacity",
    "flameshot",
    "telegram",
    "thunderbird",
    "libreoffice",
];

/// Sync the formula index from upstream.
pub async fn sync() -> Result<()> {
    let reporter = ConsoleReporter;
    reporter.info("syncing formula index...");

    let dir = formula_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create formula directory {}", dir.display()))?;

    let temp_dir = std::env::temp_dir().join("an-sync");
    if temp_dir.exists() {
        fs::remove_dir_all(&temp_dir)?;
    }

    let clone_result = Command::new("git")
        .args(["clone", "--depth=1", "--filter=blob:none", "--sparse", REPO_URL])
        .arg(&temp_dir)
        .output();

    match clone_result {
        Ok(output) if output.status.success() => {
            let _ = Command::new("git")
                .args(["sparse-checkout", "set", "formulae"])
                .current_dir(&temp_dir)
                .output();

            let source = temp_dir.join("formulae");
            if source.exists() {
                let (added, updated) = copy_formulas(&source, &dir)?;
                reporter.success(&format!("sync complete: {added} added, {updated} updated"));
            } else {
                reporter.warning("upstream repository has no formulae directory");
            }

            let _ = fs::remove_dir_all(&temp_dir);
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            reporter.warning(&format!("git clone failed: {}", stderr.trim()));
            reporter.info("falling back to direct download...");
            sync_via_https(&dir).await?;
        }
        Err(e) => {
            reporter.warning(&format!("git unavailable: {e}"));
            reporter.info("falling back to direct download...");
            sync_via_https(&dir).await?;
        }
    }

    let count = count_formulas(&dir);
    reporter.info(&format!("formula index: {count} formulas"));
    Ok(())
}

/// Copy `*.toml` files from `source` into `dest`, counting additions and
/// content changes.
fn copy_formulas(source: &Path, dest: &Path) -> Result<(usize, usize)> {
    let mut added = 0;
    let mut updated = 0;

    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_none_or(|e| e != "toml") {
            continue;
        }

        let target = dest.join(entry.file_name());
        if target.exists() {
            let src_content = fs::read_to_string(&path)?;
            let dest_content = fs::read_to_string(&target)?;
            if src_content != dest_content {
                fs::copy(&path, &target)?;
                updated += 1;
            }
        } else {
            fs::copy(&path, &target)?;
            added += 1;
        }
    }

    Ok((added, updated))
}

/// Fetch the fallback formula set one file at a time over HTTPS.
///
/// Individual failures are skipped; a partially refreshed index is better
/// than none.
async fn sync_via_https(dir: &Path) -> Result<()> {
    let client = reqwest::Client::builder()
        .user_agent(an_core::USER_AGENT)
        .build()?;

    for name in FALLBACK_FORMULAS {
        let url = format!("{RAW_BASE}/{name}.toml");
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body = resp.text().await?;
                fs::write(dir.join(format!("{name}.toml")), body)?;
            }
            Ok(resp) => {
                tracing::debug!("skipping {name}: HTTP {}", resp.status());
            }
            Err(e) => {
                tracing::debug!("skipping {name}: {e}");
            }
        }
    }

    Ok(())
}

/// Count formula files in the index directory.
fn count_formulas(dir: &Path) -> usize {
    if !dir.exists() {
        return 0;
    }
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "toml"))
                .count()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_formulas_nonexistent_dir() {
        assert_eq!(count_formulas(Path::new("/nonexistent/path")), 0);
    }

    #[test]
    fn copy_formulas_counts_added_and_updated() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::write(src.path().join("a.toml"), "a = 1").unwrap();
        fs::write(src.path().join("b.toml"), "b = 1").unwrap();
        fs::write(src.path().join("notes.txt"), "ignored").unwrap();
        fs::write(dst.path().join("b.toml"), "b = 0").unwrap();

        let (added, updated) = copy_formulas(src.path(), dst.path()).unwrap();
        assert_eq!(added, 1);
        assert_eq!(updated, 1);
        assert_eq!(count_formulas(dst.path()), 2);
    }

    #[test]
    fn copy_formulas_skips_identical_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::write(src.path().join("a.toml"), "a = 1").unwrap();
        fs::write(dst.path().join("a.toml"), "a = 1").unwrap();

        let (added, updated) = copy_formulas(src.path(), dst.path()).unwrap();
        assert_eq!((added, updated), (0, 0));
    }
}
