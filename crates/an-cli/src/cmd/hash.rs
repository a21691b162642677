//! Hash command (hidden; for formula authoring)

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use an_schema::Sha256Digest;

/// Print the SHA256 digest of each file, shasum-style.
pub fn hash(files: &[PathBuf]) -> Result<()> {
    for file in files {
        let digest = Sha256Digest::compute_file(file)
            .with_context(|| format!("Failed to hash {}", file.display()))?;
        println!("{digest}  {}", file.display());
    }
    Ok(())
}
