//! On-disk layout under the AN home directory.

use dirs::home_dir;
use std::path::PathBuf;

/// Returns the primary AN directory, or None if the user's home cannot be resolved.
pub fn try_an_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("AN_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".an"))
}

/// Returns the canonical AN home directory (`~/.an`).
///
/// # Panics
///
/// Panics if neither `AN_HOME` is set nor the user's home directory can be
/// resolved. On Linux this should never happen in normal use.
pub fn an_home() -> PathBuf {
    try_an_home().expect("Could not determine home directory. Set AN_HOME to override.")
}

/// `SQLite` database path: ~/.an/state.db
pub fn db_path() -> PathBuf {
    an_home().join("state.db")
}

/// Installed package prefixes: ~/.an/store/<name>/<version>
pub fn store_path() -> PathBuf {
    an_home().join("store")
}

/// Symlink target for installed binaries: ~/.an/bin
pub fn bin_path() -> PathBuf {
    an_home().join("bin")
}

/// Downloaded archive cache (keyed by digest): ~/.an/cache
pub fn cache_path() -> PathBuf {
    an_home().join("cache")
}

/// Logs directory: ~/.an/logs
pub fn log_dir() -> PathBuf {
    an_home().join("logs")
}

/// Formula index directory.
///
/// `AN_DB_DIR` overrides the default `~/.an/formulae`; the variable name is
/// kept for compatibility with existing deployments.
pub fn formula_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("AN_DB_DIR") {
        return PathBuf::from(dir);
    }
    an_home().join("formulae")
}

/// Generate a build log path for a formula
pub fn build_log_path(name: &str, version: &str) -> PathBuf {
    let timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    log_dir().join(format!("build-{name}-{version}-{timestamp}.log"))
}

/// Temp path: ~/.an/tmp (guaranteed same volume as store)
pub fn tmp_path() -> PathBuf {
    an_home().join("tmp")
}

/// Extract the filename from a URL.
pub fn filename_from_url(url: &str) -> &str {
    url.split('/').next_back().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_from_url_takes_last_segment() {
        assert_eq!(
            filename_from_url("https://example.com/archive/v0.1.1.tar.gz"),
            "v0.1.1.tar.gz"
        );
        assert_eq!(filename_from_url(""), "");
    }
}
