//! Archive download with streaming checksum verification, and head clones.
//!
//! The integrity contract fails closed: on a digest mismatch the partial
//! artifact is deleted and [`FetchError::IntegrityMismatch`] is returned, so
//! an unverified archive can never reach the install step. There is no retry
//! and no mirror fallback; every failure is terminal.

use std::path::Path;

use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use an_schema::{FormulaName, Sha256Digest, Version};

use crate::Reporter;

/// Errors raised by the fetch step.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local I/O failure while writing the artifact.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The downloaded archive does not match the declared checksum.
    #[error("integrity mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch {
        /// Digest declared in the formula.
        expected: String,
        /// Digest computed from the downloaded bytes.
        actual: String,
    },

    /// `git clone` of a head branch failed.
    #[error("git clone failed: {0}")]
    Git(String),
}

/// Download `url` to `dest`, hashing the stream as it arrives.
///
/// The computed digest is compared against `expected` once the stream ends;
/// on mismatch `dest` is removed before the error is returned.
///
/// # Errors
///
/// Returns [`FetchError::IntegrityMismatch`] on digest mismatch, or the
/// transport/I/O error that interrupted the download.
pub async fn download_and_verify<R: Reporter>(
    client: &Client,
    name: &FormulaName,
    version: &Version,
    url: &str,
    dest: &Path,
    expected: &Sha256Digest,
    reporter: &R,
) -> Result<Sha256Digest, FetchError> {
    let head_resp = client
        .head(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?;
    let total_size = head_resp.content_length();

    reporter.downloading(name, version, 0, total_size);

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?
        .error_for_status()?;

    let mut file = File::create(dest).await?;
    let mut stream = response.bytes_stream();
    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
        reporter.downloading(name, version, downloaded, total_size);
    }

    file.flush().await?;
    let actual = hex::encode(hasher.finalize());

    if actual != expected.as_str() {
        reporter.failed(name, version, "integrity mismatch");
        tokio::fs::remove_file(dest).await.ok();
        return Err(FetchError::IntegrityMismatch {
            expected: expected.as_str().to_string(),
            actual,
        });
    }

    // The digest was just validated against a well-formed expectation.
    Ok(Sha256Digest::parse(&actual).expect("computed digest is 64 hex chars"))
}

/// Shallow-clone a head branch into `dest`.
///
/// Head installs are the one sanctioned checksum exemption: a moving branch
/// has no stable archive to verify, so the clone is trusted as-is.
///
/// # Errors
///
/// Returns [`FetchError::Git`] when git is unavailable or exits non-zero.
pub fn clone_head(url: &str, branch: &str, dest: &Path) -> Result<(), FetchError> {
    let output = std::process::Command::new("git")
        .args(["clone", "--depth=1", "--branch", branch, url])
        .arg(dest)
        .output()
        .map_err(|e| FetchError::Git(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FetchError::Git(stderr.trim().to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;

    fn client() -> Client {
        Client::new()
    }

    #[tokio::test]
    async fn download_verifies_matching_digest() {
        let mut server = mockito::Server::new_async().await;
        let body = b"archive bytes".to_vec();
        let expected = Sha256Digest::compute(&body);

        let _m = server
            .mock("GET", "/src.tar.gz")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/src.tar.gz")
            .with_status(200)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("src.tar.gz");
        let url = format!("{}/src.tar.gz", server.url());

        let digest = download_and_verify(
            &client(),
            &FormulaName::new("demo"),
            &Version::new("1.0.0"),
            &url,
            &dest,
            &expected,
            &NullReporter,
        )
        .await
        .unwrap();

        assert_eq!(digest, expected);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
    }

    #[tokio::test]
    async fn mismatch_fails_closed_and_removes_artifact() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/src.tar.gz")
            .with_status(200)
            .with_body(b"tampered bytes".to_vec())
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/src.tar.gz")
            .with_status(200)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("src.tar.gz");
        let url = format!("{}/src.tar.gz", server.url());
        let expected = Sha256Digest::compute(b"original bytes");

        let err = download_and_verify(
            &client(),
            &FormulaName::new("demo"),
            &Version::new("1.0.0"),
            &url,
            &dest,
            &expected,
            &NullReporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FetchError::IntegrityMismatch { .. }));
        assert!(!dest.exists(), "partial artifact must be deleted");
    }

    #[tokio::test]
    async fn http_error_is_terminal() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/src.tar.gz")
            .with_status(404)
            .create_async()
            .await;
        let _head = server
            .mock("HEAD", "/src.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("src.tar.gz");
        let url = format!("{}/src.tar.gz", server.url());
        let expected = Sha256Digest::compute(b"whatever");

        let err = download_and_verify(
            &client(),
            &FormulaName::new("demo"),
            &Version::new("1.0.0"),
            &url,
            &dest,
            &expected,
            &NullReporter,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, FetchError::Http(_)));
    }
}
