//! The formula index: a directory of formula TOML files.
//!
//! Resolve-time lookups run against an in-memory snapshot of the directory.
//! Multiple descriptors may share a name (one per release version); lookups
//! without a version constraint pick the newest by semver-aware ordering.

use std::path::Path;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use thiserror::Error;

use an_schema::{Formula, FormulaName, Version};

/// Errors that can occur when loading the index directory.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The index directory could not be read.
    #[error("failed to read formula directory {dir}: {source}")]
    Io {
        /// Directory that failed to read.
        dir: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// In-memory snapshot of the formula directory.
#[derive(Debug, Default)]
pub struct FormulaIndex {
    formulas: Vec<Formula>,
}

impl FormulaIndex {
    /// Load every `*.toml` file in `dir` into the index.
    ///
    /// A missing directory yields an empty index so that first-run behaves
    /// the same as post-sync. Unparsable files are skipped with a warning;
    /// one broken descriptor must not take the whole index down.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Io`] if the directory exists but cannot be read.
    pub fn load(dir: &Path) -> Result<Self, IndexError> {
        let mut formulas = Vec::new();

        if !dir.exists() {
            return Ok(Self { formulas });
        }

        let entries = std::fs::read_dir(dir).map_err(|source| IndexError::Io {
            dir: dir.display().to_string(),
            source,
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|e| e != "toml") {
                continue;
            }
            match Formula::from_file(&path) {
                Ok(formula) => formulas.push(formula),
                Err(e) => {
                    tracing::warn!("skipping {}: {e}", path.display());
                }
            }
        }

        formulas.sort_by(|a, b| {
            a.formula
                .name
                .cmp(&b.formula.name)
                .then(b.formula.version.cmp(&a.formula.version))
        });

        Ok(Self { formulas })
    }

    /// Number of descriptors in the index.
    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    /// Returns `true` when the index holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// All descriptors, sorted by name then descending version.
    pub fn formulas(&self) -> &[Formula] {
        &self.formulas
    }

    /// Find the newest descriptor for `name`.
    pub fn find(&self, name: &FormulaName) -> Option<&Formula> {
        // Sorted by name then descending version, so the first hit is newest.
        self.formulas.iter().find(|f| f.formula.name == *name)
    }

    /// Find the descriptor for an exact `name`/`version` pair.
    pub fn find_version(&self, name: &FormulaName, version: &Version) -> Option<&Formula> {
        self.formulas
            .iter()
            .find(|f| f.formula.name == *name && f.formula.version == *version)
    }

    /// Fuzzy-search descriptors by name and description.
    ///
    /// Newest-version descriptors only; results are sorted by match score,
    /// best first.
    pub fn search(&self, query: &str) -> Vec<&Formula> {
        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, &Formula)> = self
            .formulas
            .iter()
            .filter(|f| {
                // Only the newest release of each name.
                self.find(&f.formula.name)
                    .is_some_and(|newest| newest.formula.version == f.formula.version)
            })
            .filter_map(|f| {
                let name_score = matcher.fuzzy_match(f.formula.name.as_str(), query);
                let desc_score = matcher
                    .fuzzy_match(&f.formula.description, query)
                    // Name hits should outrank description hits.
                    .map(|s| s / 2);
                name_score.max(desc_score).map(|score| (score, f))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, f)| f).collect()
    }
}
