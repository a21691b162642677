//! Installation Flow Typestate Pattern
//!
//! Models the host pipeline as a series of explicit state transitions:
//!
//! ```text
//! UnresolvedFormula --[resolve()]--> ResolvedFormula --[fetch()]--> FetchedFormula
//!     --[install()]--> InstalledFormula --[verify()]--> VerifyReport
//! ```
//!
//! This enforces at compile-time that a formula cannot be installed before
//! its archive has been fetched and verified, and cannot be smoke-tested
//! before installation. Every step is terminal on failure: there are no
//! retries and no partial-failure recovery.

use std::path::{Path, PathBuf};

use reqwest::Client;
use tempfile::TempDir;
use thiserror::Error;

use an_schema::{Formula, FormulaError, FormulaName, Sha256Digest, Version};

use crate::fetch::FetchError;
use crate::index::{FormulaIndex, IndexError};
use crate::script::{self, ExecEnv, ScriptError};
use crate::Reporter;

/// Errors surfaced by the pipeline, one per terminal failure mode.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No descriptor in the index matches the requested name/version.
    #[error("formula '{name}' not found in the index")]
    NotFound {
        /// The requested formula name.
        name: FormulaName,
    },

    /// The fetched archive does not match the declared checksum.
    #[error("integrity mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch {
        /// Digest declared in the formula.
        expected: String,
        /// Digest computed from the downloaded bytes.
        actual: String,
    },

    /// The install procedure failed (missing build dep, non-zero exit,
    /// or deadline expiry).
    #[error("build failure: {0}")]
    BuildFailure(String),

    /// The post-install smoke test failed.
    #[error("smoke test failure: {0}")]
    SmokeTestFailure(String),

    /// The descriptor itself is invalid (placeholder checksum, bad URL, ...).
    #[error("invalid formula: {0}")]
    Validation(#[from] FormulaError),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The formula index could not be loaded.
    #[error(transparent)]
    Index(#[from] IndexError),
}

impl From<FetchError> for PipelineError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Http(e) => Self::Http(e),
            FetchError::Io(e) => Self::Io(e),
            FetchError::IntegrityMismatch { expected, actual } => {
                Self::IntegrityMismatch { expected, actual }
            }
            FetchError::Git(msg) => Self::BuildFailure(format!("head clone failed: {msg}")),
        }
    }
}

impl From<ScriptError> for PipelineError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::MissingBuildDep(_) | ScriptError::BuildFailure(_) => {
                Self::BuildFailure(err.to_string())
            }
            ScriptError::SmokeTestFailure(reason) => Self::SmokeTestFailure(reason),
            ScriptError::Io(e) => Self::Io(e),
        }
    }
}

/// What the fetch step will retrieve.
#[derive(Debug, Clone)]
pub enum FetchTarget {
    /// A versioned source archive verified against its digest.
    Archive {
        /// Download URL.
        url: String,
        /// Expected digest, already validated.
        sha256: Sha256Digest,
    },
    /// A development branch cloned directly, bypassing checksum verification.
    Head {
        /// Git repository URL.
        url: String,
        /// Branch to clone.
        branch: String,
    },
}

/// State 1: a formula that has been requested but not yet resolved.
#[derive(Debug)]
pub struct UnresolvedFormula {
    /// Requested name, or a path to a local formula file.
    pub spec: String,
    /// Optional requested version (None = newest).
    pub requested: Option<Version>,
    /// Install from the `[head]` branch instead of the release archive.
    pub head: bool,
}

/// State 2: a formula whose descriptor and fetch target are known.
#[derive(Debug)]
pub struct ResolvedFormula {
    /// The resolved formula name.
    pub name: FormulaName,
    /// The resolved version.
    pub version: Version,
    /// Full descriptor.
    pub formula: Formula,
    /// What fetch will retrieve.
    pub target: FetchTarget,
}

/// State 3: sources fetched, verified, and unpacked.
#[derive(Debug)]
pub struct FetchedFormula {
    /// The resolved formula.
    pub resolved: ResolvedFormula,
    /// Directory the install script runs in.
    pub source_root: PathBuf,
    /// Digest of the fetched archive (None for head installs).
    pub digest: Option<Sha256Digest>,
    /// Holds the unpacked sources alive until install completes.
    temp_dir: TempDir,
}

/// State 4: install procedure completed, files in the store.
#[derive(Debug)]
pub struct InstalledFormula {
    /// The installed formula name.
    pub name: FormulaName,
    /// The installed version.
    pub version: Version,
    /// Full descriptor.
    pub formula: Formula,
    /// Store prefix the install script populated.
    pub prefix: PathBuf,
    /// Digest of the source archive (None for head installs).
    pub digest: Option<Sha256Digest>,
    /// Symlinks created in the bin directory.
    pub linked: Vec<PathBuf>,
    /// Total size of the installed prefix in bytes.
    pub size_bytes: u64,
}

/// Outcome of the smoke test.
#[derive(Debug)]
pub struct VerifyReport {
    /// Combined stdout/stderr of the test command.
    pub output: String,
}

impl UnresolvedFormula {
    /// Parse an install spec of the form `name` or `name@version`.
    ///
    /// A spec that names an existing file is kept verbatim and resolved
    /// from disk instead of the index.
    pub fn parse(spec: &str, head: bool) -> Self {
        if !Path::new(spec).exists() {
            if let Some((name, version)) = spec.split_once('@') {
                return Self {
                    spec: name.to_string(),
                    requested: Some(Version::new(version)),
                    head,
                };
            }
        }
        Self {
            spec: spec.to_string(),
            requested: None,
            head,
        }
    }

    /// Resolve the request against the index or a local formula file.
    ///
    /// The descriptor is validated here, before any network I/O: a
    /// placeholder or malformed checksum stops the pipeline at this step
    /// unless this is a head install, whose checksum requirement is waived.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NotFound`] for unknown names, or
    /// [`PipelineError::Validation`] for invalid descriptors.
    pub fn resolve(self, index: &FormulaIndex) -> Result<ResolvedFormula, PipelineError> {
        let path = Path::new(&self.spec);
        let formula = if path.exists() {
            Formula::from_file(path).map_err(PipelineError::Validation)?
        } else {
            let name = FormulaName::new(&self.spec);
            match &self.requested {
                Some(version) => index.find_version(&name, version),
                None => index.find(&name),
            }
            .ok_or(PipelineError::NotFound { name })?
            .clone()
        };

        let target = if self.head {
            formula.validate_head()?;
            let head = formula.head.as_ref().ok_or(FormulaError::NoHead)?;
            FetchTarget::Head {
                url: head.url.clone(),
                branch: head.branch.clone(),
            }
        } else {
            formula.validate()?;
            let sha256 = Sha256Digest::parse(&formula.source.sha256)
                .map_err(FormulaError::Checksum)?;
            FetchTarget::Archive {
                url: formula.source.url.clone(),
                sha256,
            }
        };

        Ok(ResolvedFormula {
            name: formula.formula.name.clone(),
            version: formula.formula.version.clone(),
            formula,
            target,
        })
    }
}

impl ResolvedFormula {
    /// Fetch and unpack the sources.
    ///
    /// Archives are cached under `~/.an/cache/<digest>` and re-verified on
    /// reuse; a cache entry that fails re-verification is discarded and
    /// downloaded fresh. Head targets are shallow-cloned.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::IntegrityMismatch`] (fail closed, partial
    /// artifact deleted) or the transport/I/O error that stopped the fetch.
    pub async fn fetch<R: Reporter>(
        self,
        client: &Client,
        reporter: &R,
    ) -> Result<FetchedFormula, PipelineError> {
        let tmp_root = crate::tmp_path();
        std::fs::create_dir_all(&tmp_root)?;
        let temp_dir = tempfile::Builder::new().prefix("an-").tempdir_in(tmp_root)?;

        let src_dir = temp_dir.path().join("src");
        std::fs::create_dir_all(&src_dir)?;

        let (source_root, digest) = match &self.target {
            FetchTarget::Archive { url, sha256 } => {
                let cache_dir = crate::cache_path();
                std::fs::create_dir_all(&cache_dir)?;
                let cache_file = cache_dir.join(sha256.as_str());

                let cached = cache_file.exists()
                    && Sha256Digest::compute_file(&cache_file)
                        .map(|d| d == *sha256)
                        .unwrap_or(false);

                if cached {
                    tracing::debug!("cache hit for {}", sha256);
                } else {
                    crate::fetch::download_and_verify(
                        client,
                        &self.name,
                        &self.version,
                        url,
                        &cache_file,
                        sha256,
                        reporter,
                    )
                    .await?;
                }

                crate::extract::unpack_tar_gz(&cache_file, &src_dir).await?;
                (crate::extract::source_root(&src_dir)?, Some(sha256.clone()))
            }
            FetchTarget::Head { url, branch } => {
                reporter.downloading(&self.name, &self.version, 0, None);
                let checkout = src_dir.join(&*self.name);
                crate::fetch::clone_head(url, branch, &checkout)?;
                (checkout, None)
            }
        };

        Ok(FetchedFormula {
            resolved: self,
            source_root,
            digest,
            temp_dir,
        })
    }
}

impl FetchedFormula {
    /// Run the install procedure into the store prefix and link binaries.
    ///
    /// Build-time dependencies are checked for presence first. On any
    /// failure the partially-populated prefix is removed so that the store
    /// never holds a half-installed release.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::BuildFailure`].
    pub fn install<R: Reporter>(self, reporter: &R) -> Result<InstalledFormula, PipelineError> {
        let resolved = self.resolved;
        script::check_build_deps(&resolved.formula.dependencies.build)?;

        reporter.installing(&resolved.name, &resolved.version);

        let prefix = crate::store_path()
            .join(&resolved.name)
            .join(&resolved.version);
        std::fs::create_dir_all(&prefix)?;

        let log_path =
            crate::build_log_path(resolved.name.as_str(), resolved.version.as_str());
        let env = ExecEnv {
            cwd: &self.source_root,
            prefix: &prefix,
            version: &resolved.version,
            timeout: script::INSTALL_TIMEOUT,
        };

        if let Err(err) = script::run_install(&resolved.formula.install.script, &env, &log_path) {
            std::fs::remove_dir_all(&prefix).ok();
            return Err(err.into());
        }

        let linked = match link_binaries(&prefix) {
            Ok(linked) => linked,
            Err(err) => {
                std::fs::remove_dir_all(&prefix).ok();
                return Err(err.into());
            }
        };

        let size_bytes = dir_size(&prefix);

        Ok(InstalledFormula {
            name: resolved.name,
            version: resolved.version,
            formula: resolved.formula,
            prefix,
            digest: self.digest,
            linked,
            size_bytes,
        })
    }
}

impl InstalledFormula {
    /// Run the post-install smoke test.
    ///
    /// Success is exit code 0 and, when the formula declares an expected
    /// substring, output containing it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SmokeTestFailure`]; the install is left in
    /// place but must not be recorded as verified.
    pub fn verify<R: Reporter>(&self, reporter: &R) -> Result<VerifyReport, PipelineError> {
        reporter.verifying(&self.name, &self.version);

        let env = ExecEnv {
            cwd: &self.prefix,
            prefix: &self.prefix,
            version: &self.version,
            timeout: script::TEST_TIMEOUT,
        };
        let output = script::run_smoke_test(
            &self.formula.test.script,
            self.formula.test.expect.as_deref(),
            &env,
        )?;

        Ok(VerifyReport { output })
    }
}

/// Symlink every regular file in `<prefix>/bin` into the shared bin dir.
fn link_binaries(prefix: &Path) -> std::io::Result<Vec<PathBuf>> {
    let src_bin = prefix.join("bin");
    let mut linked = Vec::new();
    if !src_bin.is_dir() {
        return Ok(linked);
    }

    let bin_dir = crate::bin_path();
    std::fs::create_dir_all(&bin_dir)?;

    for entry in std::fs::read_dir(&src_bin)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let link = bin_dir.join(entry.file_name());
        if link.symlink_metadata().is_ok() {
            std::fs::remove_file(&link)?;
        }
        #[cfg(unix)]
        std::os::unix::fs::symlink(entry.path(), &link)?;
        linked.push(link);
    }
    Ok(linked)
}

fn dir_size(dir: &Path) -> u64 {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|e| e.metadata().ok())
        .filter(std::fs::Metadata::is_file)
        .map(|m| m.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    // Pipeline tests mutate AN_HOME; serialize them.
    fn env_lock() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(Mutex::default)
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn formula_toml(name: &str, version: &str, url: &str, sha256: &str) -> String {
        format!(
            r#"
[formula]
name = "{name}"
description = "demo formula"
homepage = "https://example.com"
license = "MIT"
version = "{version}"

[source]
url = "{url}"
sha256 = "{sha256}"

[head]
url = "https://example.com/demo.git"

[install]
script = "mkdir -p $PREFIX/bin && printf '#!/bin/sh\necho AN %s\n' $AN_VERSION > $PREFIX/bin/{name} && chmod +x $PREFIX/bin/{name}"

[test]
script = "{name}"
expect = "AN"
"#
        )
    }

    fn index_with(dir: &Path, files: &[(&str, &str)]) -> FormulaIndex {
        for (file, content) in files {
            std::fs::write(dir.join(file), content).unwrap();
        }
        FormulaIndex::load(dir).unwrap()
    }

    #[test]
    fn parse_splits_name_and_version() {
        let req = UnresolvedFormula::parse("jq@1.7.1", false);
        assert_eq!(req.spec, "jq");
        assert_eq!(req.requested, Some(Version::new("1.7.1")));

        let req = UnresolvedFormula::parse("jq", false);
        assert!(req.requested.is_none());
    }

    #[test]
    fn resolve_unknown_name_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let index = index_with(dir.path(), &[]);

        let err = UnresolvedFormula::parse("ghost", false)
            .resolve(&index)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound { name } if name == "ghost"));
    }

    #[test]
    fn resolve_picks_requested_version() {
        let dir = tempfile::tempdir().unwrap();
        let sha = "a".repeat(64);
        let index = index_with(
            dir.path(),
            &[
                (
                    "demo-1.toml",
                    &formula_toml("demo", "1.0.0", "https://example.com/v1.0.0.tar.gz", &sha),
                ),
                (
                    "demo-2.toml",
                    &formula_toml("demo", "2.0.0", "https://example.com/v2.0.0.tar.gz", &sha),
                ),
            ],
        );

        let latest = UnresolvedFormula::parse("demo", false).resolve(&index).unwrap();
        assert_eq!(latest.version, "2.0.0");

        let pinned = UnresolvedFormula::parse("demo@1.0.0", false)
            .resolve(&index)
            .unwrap();
        assert_eq!(pinned.version, "1.0.0");
    }

    #[test]
    fn resolve_rejects_placeholder_checksum_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let index = index_with(
            dir.path(),
            &[(
                "demo.toml",
                &formula_toml("demo", "1.0.0", "https://example.com/v1.0.0.tar.gz", ""),
            )],
        );

        let err = UnresolvedFormula::parse("demo", false)
            .resolve(&index)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn head_resolve_waives_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let index = index_with(
            dir.path(),
            &[(
                "demo.toml",
                &formula_toml("demo", "1.0.0", "https://example.com/v1.0.0.tar.gz", ""),
            )],
        );

        let resolved = UnresolvedFormula::parse("demo", true).resolve(&index).unwrap();
        assert!(matches!(resolved.target, FetchTarget::Head { .. }));
    }

    #[test]
    fn resolve_from_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let sha = "b".repeat(64);
        let path = dir.path().join("local.toml");
        std::fs::write(
            &path,
            formula_toml("local", "1.2.3", "https://example.com/v1.2.3.tar.gz", &sha),
        )
        .unwrap();

        let index = FormulaIndex::default();
        let resolved = UnresolvedFormula::parse(path.to_str().unwrap(), false)
            .resolve(&index)
            .unwrap();
        assert_eq!(resolved.name, "local");
        assert_eq!(resolved.version, "1.2.3");
    }

    fn make_tar_gz(entries: &[(&str, &str)]) -> Vec<u8> {
        let encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn full_pipeline_fetch_install_verify() {
        let _guard = env_lock();
        let home = tempfile::tempdir().unwrap();
        std::env::set_var("AN_HOME", home.path());

        let mut server = mockito::Server::new_async().await;
        let archive = make_tar_gz(&[("demo-1.0.0/README", "demo sources")]);
        let sha = Sha256Digest::compute(&archive);

        let _get = server
            .mock("GET", "/v1.0.0.tar.gz")
            .with_status(200)
            .with_body(archive)
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/v1.0.0.tar.gz")
            .with_status(200)
            .create_async()
            .await;

        let formula_dir = tempfile::tempdir().unwrap();
        let url = format!("{}/v1.0.0.tar.gz", server.url());
        let index = index_with(
            formula_dir.path(),
            &[("demo.toml", &formula_toml("demo", "1.0.0", &url, sha.as_str()))],
        );

        let resolved = UnresolvedFormula::parse("demo", false).resolve(&index).unwrap();
        let fetched = resolved
            .fetch(&Client::new(), &NullReporter)
            .await
            .unwrap();
        assert!(fetched.source_root.join("README").exists());

        let installed = fetched.install(&NullReporter).unwrap();
        assert!(installed.prefix.join("bin/demo").exists());
        assert_eq!(installed.linked.len(), 1);
        assert!(installed.size_bytes > 0);

        let report = installed.verify(&NullReporter).unwrap();
        assert!(report.output.contains("AN 1.0.0"));

        std::env::remove_var("AN_HOME");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn integrity_mismatch_aborts_before_install() {
        let _guard = env_lock();
        let home = tempfile::tempdir().unwrap();
        std::env::set_var("AN_HOME", home.path());

        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/v1.0.0.tar.gz")
            .with_status(200)
            .with_body(b"tampered".to_vec())
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/v1.0.0.tar.gz")
            .with_status(200)
            .create_async()
            .await;

        let formula_dir = tempfile::tempdir().unwrap();
        let url = format!("{}/v1.0.0.tar.gz", server.url());
        let sha = Sha256Digest::compute(b"the real archive");
        let index = index_with(
            formula_dir.path(),
            &[("demo.toml", &formula_toml("demo", "1.0.0", &url, sha.as_str()))],
        );

        let resolved = UnresolvedFormula::parse("demo", false).resolve(&index).unwrap();
        let err = resolved
            .fetch(&Client::new(), &NullReporter)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::IntegrityMismatch { .. }));
        // Nothing reached the store.
        assert!(!home.path().join("store/demo").exists());

        std::env::remove_var("AN_HOME");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_install_cleans_up_prefix() {
        let _guard = env_lock();
        let home = tempfile::tempdir().unwrap();
        std::env::set_var("AN_HOME", home.path());

        let mut server = mockito::Server::new_async().await;
        let archive = make_tar_gz(&[("demo-1.0.0/README", "demo sources")]);
        let sha = Sha256Digest::compute(&archive);

        let _get = server
            .mock("GET", "/v1.0.0.tar.gz")
            .with_status(200)
            .with_body(archive)
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/v1.0.0.tar.gz")
            .with_status(200)
            .create_async()
            .await;

        let formula_dir = tempfile::tempdir().unwrap();
        let url = format!("{}/v1.0.0.tar.gz", server.url());
        let toml = formula_toml("demo", "1.0.0", &url, sha.as_str())
            .replace("mkdir -p $PREFIX/bin", "exit 7; mkdir -p $PREFIX/bin");
        let index = index_with(formula_dir.path(), &[("demo.toml", &toml)]);

        let resolved = UnresolvedFormula::parse("demo", false).resolve(&index).unwrap();
        let fetched = resolved
            .fetch(&Client::new(), &NullReporter)
            .await
            .unwrap();
        let err = fetched.install(&NullReporter).unwrap_err();

        assert!(matches!(err, PipelineError::BuildFailure(_)));
        assert!(!home.path().join("store/demo/1.0.0").exists());

        std::env::remove_var("AN_HOME");
    }
}
