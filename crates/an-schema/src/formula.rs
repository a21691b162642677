//! TOML formula definition parsing.
//!
//! A formula is the static declarative record the host consumes: identity
//! metadata, a versioned source archive with its expected checksum, optional
//! head (branch) coordinates, build-time dependencies, an install procedure,
//! and a post-install smoke test. Formulas are immutable per release; a
//! version bump produces a new descriptor.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::{DigestError, PLACEHOLDER_SHA256};
use crate::types::{FormulaName, Version};

/// Errors that can occur when loading or validating a formula.
#[derive(Error, Debug)]
pub enum FormulaError {
    /// An I/O error occurred while reading a formula file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML content could not be deserialized into a valid formula.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required field is empty.
    #[error("empty field: {0}")]
    EmptyField(&'static str),

    /// The source or homepage URL is malformed or uses an unsupported scheme.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The source URL does not end in a recognized archive suffix.
    #[error("source URL must point at a .tar.gz/.tgz archive: {0}")]
    UnsupportedArchive(String),

    /// The declared version does not appear in the source URL.
    #[error("declared version {version} is not embedded in source URL {url}")]
    VersionMismatch {
        /// Declared release version.
        version: Version,
        /// Offending source URL.
        url: String,
    },

    /// The checksum is missing, a placeholder, or malformed hex.
    #[error("source checksum: {0}")]
    Checksum(#[from] DigestError),

    /// A head section is required but absent.
    #[error("formula has no [head] section")]
    NoHead,
}

/// The `[formula]` table: identity and provenance metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaInfo {
    /// Unique name identifying this formula in the index.
    pub name: FormulaName,
    /// Short human-readable summary.
    pub description: String,
    /// URL of the project's homepage.
    pub homepage: String,
    /// SPDX license identifier.
    pub license: String,
    /// Declared release version.
    pub version: Version,
}

/// The `[source]` table: archive location and integrity data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Download URL for the versioned source archive.
    pub url: String,
    /// Expected SHA-256 digest of the downloaded archive.
    ///
    /// Kept as a raw string so authoring-time placeholders can be loaded and
    /// reported; [`Formula::validate`] rejects them before any fetch.
    pub sha256: String,
}

/// The optional `[head]` table: development-branch coordinates.
///
/// Head installs clone the branch directly and bypass checksum verification,
/// the one host-sanctioned exemption from the integrity invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Head {
    /// Git repository URL.
    pub url: String,
    /// Branch to clone.
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

/// The `[dependencies]` table, grouped by phase.
///
/// Only the build phase exists in the descriptor contract: these packages
/// must be present while the install procedure runs, not at runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dependencies {
    /// Tools required on PATH during the install procedure.
    #[serde(default)]
    pub build: Vec<String>,
}

/// The `[install]` table: the opaque build/install procedure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallSpec {
    /// Command sequence executed via `sh -c` in the unpacked source tree.
    pub script: String,
}

/// The `[test]` table: the post-install smoke test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    /// Command executed via `sh -c` after installation.
    pub script: String,
    /// Substring the command output must contain for the check to pass.
    #[serde(default)]
    pub expect: Option<String>,
}

/// Complete formula descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Identity metadata.
    pub formula: FormulaInfo,
    /// Source archive location and integrity data.
    pub source: Source,
    /// Optional development-branch coordinates.
    #[serde(default)]
    pub head: Option<Head>,
    /// Build-time dependency list.
    #[serde(default)]
    pub dependencies: Dependencies,
    /// Install procedure.
    pub install: InstallSpec,
    /// Post-install smoke test.
    pub test: TestSpec,
}

impl Formula {
    /// Parse a formula from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::Io` if the file cannot be read, or
    /// `FormulaError::Parse` if the TOML content is invalid.
    pub fn from_file(path: &Path) -> Result<Self, FormulaError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a formula from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::Parse` if the TOML content does not match the
    /// expected schema.
    pub fn parse(content: &str) -> Result<Self, FormulaError> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the descriptor for an archive install.
    ///
    /// Checks everything the fetch step depends on: non-empty identity
    /// fields, an HTTPS archive URL embedding the declared version, and a
    /// real (64-hex, non-placeholder) checksum. Fetch must not start while
    /// any of these fail.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), FormulaError> {
        self.validate_metadata()?;

        let url = &self.source.url;
        if !url.starts_with("https://") {
            return Err(FormulaError::InvalidUrl(url.clone()));
        }
        if !(url.ends_with(".tar.gz") || url.ends_with(".tgz")) {
            return Err(FormulaError::UnsupportedArchive(url.clone()));
        }
        if !url.contains(self.formula.version.as_str()) {
            return Err(FormulaError::VersionMismatch {
                version: self.formula.version.clone(),
                url: url.clone(),
            });
        }

        crate::hash::Sha256Digest::parse(&self.source.sha256)?;

        Ok(())
    }

    /// Validate the descriptor for a head (branch) install.
    ///
    /// Identity fields must still hold, and a `[head]` section must exist,
    /// but the checksum requirement is waived: a branch clone has no stable
    /// archive to verify.
    ///
    /// # Errors
    ///
    /// Returns `FormulaError::NoHead` when no `[head]` section is present,
    /// or the first violated metadata invariant.
    pub fn validate_head(&self) -> Result<(), FormulaError> {
        self.validate_metadata()?;

        let head = self.head.as_ref().ok_or(FormulaError::NoHead)?;
        if head.url.is_empty() {
            return Err(FormulaError::EmptyField("head.url"));
        }
        if head.branch.is_empty() {
            return Err(FormulaError::EmptyField("head.branch"));
        }
        Ok(())
    }

    /// Returns `true` when the checksum is still an authoring placeholder.
    pub fn has_placeholder_checksum(&self) -> bool {
        self.source.sha256.is_empty() || self.source.sha256 == PLACEHOLDER_SHA256
    }

    fn validate_metadata(&self) -> Result<(), FormulaError> {
        if self.formula.name.as_str().is_empty() {
            return Err(FormulaError::EmptyField("name"));
        }
        if self.formula.description.is_empty() {
            return Err(FormulaError::EmptyField("description"));
        }
        if self.formula.license.is_empty() {
            return Err(FormulaError::EmptyField("license"));
        }
        if self.formula.version.as_str().is_empty() {
            return Err(FormulaError::EmptyField("version"));
        }
        if self.formula.homepage.is_empty() {
            return Err(FormulaError::EmptyField("homepage"));
        }
        if !self.formula.homepage.starts_with("http") {
            return Err(FormulaError::InvalidUrl(self.formula.homepage.clone()));
        }
        if self.install.script.trim().is_empty() {
            return Err(FormulaError::EmptyField("install.script"));
        }
        if self.test.script.trim().is_empty() {
            return Err(FormulaError::EmptyField("test.script"));
        }
        Ok(())
    }
}
