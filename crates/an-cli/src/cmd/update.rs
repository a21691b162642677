//! Update command
//!
//! Self-updates the `an` binary from GitHub releases, then syncs the
//! formula index. A failed self-update never leaves a broken binary: the
//! previous executable is backed up first and restored on error.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde::Deserialize;

use an_core::Reporter;

use crate::cmd::sync;
use crate::ui::ConsoleReporter;

/// Currently running version.
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// GitHub repository publishing release binaries.
const REPO: &str = "clearclown/AN";

/// GitHub Releases API response (the fields we use).
#[derive(Debug, Deserialize)]
struct GitHubRelease {
    tag_name: String,
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
}

fn target_arch() -> &'static str {
    #[cfg(target_arch = "x86_64")]
    {
        "x86_64"
    }
    #[cfg(target_arch = "aarch64")]
    {
        "aarch64"
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        "unknown"
    }
}

/// Strip a leading `v` from a release tag (v0.1.0 -> 0.1.0).
fn parse_version(tag: &str) -> &str {
    tag.trim_start_matches('v')
}

/// Returns `true` when `latest` is strictly newer than `current`.
pub fn should_update(current: &str, latest: &str) -> bool {
    let current =
        semver::Version::parse(current).unwrap_or_else(|_| semver::Version::new(0, 0, 0));
    let latest = semver::Version::parse(parse_version(latest))
        .unwrap_or_else(|_| semver::Version::new(0, 0, 0));
    latest > current
}

async fn check_latest(client: &reqwest::Client) -> Result<GitHubRelease> {
    let url = format!("https://api.github.com/repos/{REPO}/releases/latest");
    let release = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json::<GitHubRelease>()
        .await?;
    Ok(release)
}

async fn download_and_replace(
    client: &reqwest::Client,
    release: &GitHubRelease,
    reporter: &ConsoleReporter,
) -> Result<()> {
    let arch = target_arch();
    let expected_name = format!("an-linux-{arch}");

    let asset = release
        .assets
        .iter()
        .find(|a| a.name == expected_name)
        .with_context(|| format!("no release binary for architecture {arch}"))?;

    reporter.info(&format!("downloading {}", asset.name));

    let bytes = client
        .get(&asset.browser_download_url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    let temp_path: PathBuf = std::env::temp_dir().join("an-update");
    fs::write(&temp_path, &bytes)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&temp_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&temp_path, perms)?;
    }

    let current_exe = std::env::current_exe()?;
    let backup_path = current_exe.with_extension("bak");
    fs::copy(&current_exe, &backup_path)?;

    // rename fails across filesystems; fall back to copy + remove.
    let swap = fs::rename(&temp_path, &current_exe)
        .or_else(|_| fs::copy(&temp_path, &current_exe).map(|_| ()));

    match swap {
        Ok(()) => {
            let _ = fs::remove_file(&backup_path);
            let _ = fs::remove_file(&temp_path);
            reporter.success(&format!("updated an to {}", release.tag_name));
            Ok(())
        }
        Err(e) => {
            if backup_path.exists() {
                let _ = fs::rename(&backup_path, &current_exe);
                reporter.info("restored previous binary from backup");
            }
            Err(e.into())
        }
    }
}

/// Check for a newer release, self-update if found, then sync the index.
pub async fn update(dry_run: bool) -> Result<()> {
    let reporter = ConsoleReporter;
    reporter.info("checking for updates...");

    let client = reqwest::Client::builder()
        .user_agent(an_core::USER_AGENT)
        .build()?;

    let release = match check_latest(&client).await {
        Ok(r) => r,
        Err(e) => {
            reporter.warning(&format!("version check failed: {e}"));
            reporter.info("updating formula index only...");
            return sync::sync().await;
        }
    };

    let latest = parse_version(&release.tag_name);
    reporter.info(&format!("current version: {CURRENT_VERSION}"));
    reporter.info(&format!("latest version:  {latest}"));

    if should_update(CURRENT_VERSION, &release.tag_name) {
        if dry_run {
            reporter.info(&format!("would update an to {latest}"));
        } else if let Err(e) = download_and_replace(&client, &release, &reporter).await {
            reporter.error(&format!("update failed: {e}"));
            reporter.info("update manually from the project releases page");
        }
    } else {
        reporter.success(&format!("an is up to date (v{CURRENT_VERSION})"));
    }

    sync::sync().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_update_newer() {
        assert!(should_update("0.1.0", "0.2.0"));
        assert!(should_update("0.9.9", "1.0.0"));
        assert!(should_update("1.0.0", "1.0.1"));
    }

    #[test]
    fn should_update_same_or_older() {
        assert!(!should_update("0.1.0", "0.1.0"));
        assert!(!should_update("0.2.0", "0.1.0"));
    }

    #[test]
    fn should_update_handles_v_prefix() {
        assert!(should_update("0.1.0", "v0.2.0"));
    }

    #[test]
    fn parse_version_strips_prefix() {
        assert_eq!(parse_version("v0.1.0"), "0.1.0");
        assert_eq!(parse_version("0.1.0"), "0.1.0");
    }
}
