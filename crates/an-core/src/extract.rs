//! Gzip-compressed tar unpacking.

use std::path::{Path, PathBuf};

/// Unpack a `.tar.gz`/`.tgz` archive into `dest` on a blocking thread.
///
/// # Errors
///
/// Returns an I/O error if the archive is corrupt or `dest` is not writable.
pub async fn unpack_tar_gz(archive: &Path, dest: &Path) -> std::io::Result<()> {
    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&archive)?;
        let decoder = flate2::read::GzDecoder::new(file);
        let mut tar = tar::Archive::new(decoder);
        tar.unpack(&dest)?;
        Ok::<(), std::io::Error>(())
    })
    .await
    .map_err(std::io::Error::other)?
}

/// Resolve the effective source root after extraction.
///
/// Forge archives (GitHub et al.) wrap the tree in a single
/// `<name>-<version>/` directory; build scripts expect to run inside it.
/// When `dir` contains exactly one entry and it is a directory, that entry
/// is the root; otherwise `dir` itself is.
///
/// # Errors
///
/// Returns an I/O error if `dir` cannot be read.
pub fn source_root(dir: &Path) -> std::io::Result<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();

    if entries.len() == 1 {
        let only = entries.remove(0);
        if only.is_dir() {
            return Ok(only);
        }
    }
    Ok(dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_tar_gz(dest: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(dest).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap().flush().unwrap();
    }

    #[tokio::test]
    async fn unpacks_archive_contents() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("src.tar.gz");
        make_tar_gz(&archive, &[("an-0.1.1/Cargo.toml", "[package]")]);

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        unpack_tar_gz(&archive, &out).await.unwrap();

        assert!(out.join("an-0.1.1/Cargo.toml").exists());
    }

    #[tokio::test]
    async fn source_root_strips_single_forge_directory() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("src.tar.gz");
        make_tar_gz(&archive, &[("an-0.1.1/Cargo.toml", "[package]")]);

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        unpack_tar_gz(&archive, &out).await.unwrap();

        let root = source_root(&out).unwrap();
        assert!(root.ends_with("an-0.1.1"));
    }

    #[test]
    fn source_root_keeps_flat_trees() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();

        let root = source_root(dir.path()).unwrap();
        assert_eq!(root, dir.path());
    }

    #[test]
    fn corrupt_archive_errors() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("bad.tar.gz");
        std::fs::write(&archive, b"definitely not gzip").unwrap();

        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        let rt = tokio::runtime::Runtime::new().unwrap();
        assert!(rt.block_on(unpack_tar_gz(&archive, &out)).is_err());
    }
}
