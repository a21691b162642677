//! SQLite state database.
//!
//! Tracks which formulas are installed, the files they linked into the bin
//! directory, and an append-only history of install/remove operations.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

/// Errors produced by state-database operations.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database actor died")]
    ActorDied,
}

/// A row in the `packages` table.
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub sha256: Option<String>,
    pub size_bytes: u64,
    pub installed_at: i64,
}

/// Synchronous connection wrapper; host it behind [`crate::DbHandle`]
/// outside of tests.
#[derive(Debug)]
pub struct StateDb {
    conn: Connection,
}

impl StateDb {
    /// Open (and initialize) the database at the default location.
    pub fn open() -> Result<Self, DbError> {
        Self::open_at(&an_core::paths::db_path())
    }

    /// Open (and initialize) the database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS packages (
                name         TEXT PRIMARY KEY,
                version      TEXT NOT NULL,
                sha256       TEXT,
                size_bytes   INTEGER NOT NULL DEFAULT 0,
                installed_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS files (
                package TEXT NOT NULL,
                path    TEXT NOT NULL,
                PRIMARY KEY (package, path)
            );
            CREATE TABLE IF NOT EXISTS history (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                package   TEXT NOT NULL,
                action    TEXT NOT NULL,
                version   TEXT,
                success   INTEGER NOT NULL,
                timestamp INTEGER NOT NULL
            );",
        )?;
        Ok(Self { conn })
    }

    /// Fetch the installed record for `name`, if any.
    pub fn get_package(&self, name: &str) -> Result<Option<InstalledPackage>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT name, version, sha256, size_bytes, installed_at
                 FROM packages WHERE name = ?1",
                params![name],
                |row| {
                    Ok(InstalledPackage {
                        name: row.get(0)?,
                        version: row.get(1)?,
                        sha256: row.get(2)?,
                        size_bytes: row.get::<_, i64>(3)?.unsigned_abs(),
                        installed_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// All installed packages, alphabetical.
    pub fn list_packages(&self) -> Result<Vec<InstalledPackage>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, version, sha256, size_bytes, installed_at
             FROM packages ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(InstalledPackage {
                name: row.get(0)?,
                version: row.get(1)?,
                sha256: row.get(2)?,
                size_bytes: row.get::<_, i64>(3)?.unsigned_abs(),
                installed_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Files linked for `name`.
    pub fn get_package_files(&self, name: &str) -> Result<Vec<PathBuf>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM files WHERE package = ?1")?;
        let rows = stmt.query_map(params![name], |row| row.get::<_, String>(0))?;
        Ok(rows
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(PathBuf::from)
            .collect())
    }

    /// Record a completed installation: package row, linked files, history.
    ///
    /// Runs in one transaction so a crash cannot leave the record half
    /// written.
    pub fn install_complete(
        &mut self,
        pkg: &InstalledPackage,
        files: &[PathBuf],
    ) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO packages (name, version, sha256, size_bytes, installed_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                pkg.name,
                pkg.version,
                pkg.sha256,
                i64::try_from(pkg.size_bytes).unwrap_or(i64::MAX),
                pkg.installed_at
            ],
        )?;
        tx.execute("DELETE FROM files WHERE package = ?1", params![pkg.name])?;
        for file in files {
            tx.execute(
                "INSERT OR REPLACE INTO files (package, path) VALUES (?1, ?2)",
                params![pkg.name, file.display().to_string()],
            )?;
        }
        tx.execute(
            "INSERT INTO history (package, action, version, success, timestamp)
             VALUES (?1, 'install', ?2, 1, ?3)",
            params![pkg.name, pkg.version, chrono::Utc::now().timestamp()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Remove a package's rows, returning the files that were tracked.
    pub fn remove_package(&mut self, name: &str) -> Result<Vec<PathBuf>, DbError> {
        let files = self.get_package_files(name)?;
        let version: Option<String> = self
            .conn
            .query_row(
                "SELECT version FROM packages WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM packages WHERE name = ?1", params![name])?;
        tx.execute("DELETE FROM files WHERE package = ?1", params![name])?;
        tx.execute(
            "INSERT INTO history (package, action, version, success, timestamp)
             VALUES (?1, 'remove', ?2, 1, ?3)",
            params![name, version, chrono::Utc::now().timestamp()],
        )?;
        tx.commit()?;
        Ok(files)
    }

    /// Append a history entry (used for failed operations).
    pub fn add_history(
        &self,
        name: &str,
        action: &str,
        version: Option<&str>,
        success: bool,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO history (package, action, version, success, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                name,
                action,
                version,
                i32::from(success),
                chrono::Utc::now().timestamp()
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, StateDb) {
        let dir = tempfile::tempdir().unwrap();
        let db = StateDb::open_at(&dir.path().join("state.db")).unwrap();
        (dir, db)
    }

    fn sample(name: &str, version: &str) -> InstalledPackage {
        InstalledPackage {
            name: name.to_string(),
            version: version.to_string(),
            sha256: Some("a".repeat(64)),
            size_bytes: 1024,
            installed_at: 1_700_000_000,
        }
    }

    #[test]
    fn install_then_get_roundtrip() {
        let (_dir, mut db) = open_temp();
        db.install_complete(&sample("jq", "1.7.1"), &[PathBuf::from("/tmp/bin/jq")])
            .unwrap();

        let pkg = db.get_package("jq").unwrap().unwrap();
        assert_eq!(pkg.version, "1.7.1");
        assert_eq!(pkg.size_bytes, 1024);

        let files = db.get_package_files("jq").unwrap();
        assert_eq!(files, vec![PathBuf::from("/tmp/bin/jq")]);
    }

    #[test]
    fn reinstall_replaces_files() {
        let (_dir, mut db) = open_temp();
        db.install_complete(&sample("jq", "1.6.0"), &[PathBuf::from("/tmp/bin/old")])
            .unwrap();
        db.install_complete(&sample("jq", "1.7.1"), &[PathBuf::from("/tmp/bin/jq")])
            .unwrap();

        assert_eq!(db.get_package("jq").unwrap().unwrap().version, "1.7.1");
        assert_eq!(
            db.get_package_files("jq").unwrap(),
            vec![PathBuf::from("/tmp/bin/jq")]
        );
    }

    #[test]
    fn remove_returns_tracked_files() {
        let (_dir, mut db) = open_temp();
        db.install_complete(&sample("jq", "1.7.1"), &[PathBuf::from("/tmp/bin/jq")])
            .unwrap();

        let files = db.remove_package("jq").unwrap();
        assert_eq!(files, vec![PathBuf::from("/tmp/bin/jq")]);
        assert!(db.get_package("jq").unwrap().is_none());
    }

    #[test]
    fn list_is_alphabetical() {
        let (_dir, mut db) = open_temp();
        db.install_complete(&sample("zoxide", "0.9.0"), &[]).unwrap();
        db.install_complete(&sample("bat", "0.24.0"), &[]).unwrap();

        let names: Vec<String> = db
            .list_packages()
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["bat", "zoxide"]);
    }

    #[test]
    fn missing_package_is_none() {
        let (_dir, db) = open_temp();
        assert!(db.get_package("ghost").unwrap().is_none());
    }
}
