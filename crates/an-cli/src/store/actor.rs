//! DB Actor - Thread-safe access to SQLite
//!
//! This module implements the actor pattern for the state database.
//! Since SQLite connections are not thread-safe (not Sync), we host
//! the database handle in a dedicated background thread and communicate
//! via message passing.

use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use tokio::sync::oneshot;

use super::db::{DbError, InstalledPackage, StateDb};

/// Events that can be sent to the DB actor
pub enum DbEvent {
    /// Get the installed record for a formula
    GetPackage {
        name: String,
        resp: oneshot::Sender<Result<Option<InstalledPackage>, DbError>>,
    },
    /// Get all files tracked for a formula
    GetPackageFiles {
        name: String,
        resp: oneshot::Sender<Result<Vec<PathBuf>, DbError>>,
    },
    /// List all installed formulas
    ListPackages {
        resp: oneshot::Sender<Result<Vec<InstalledPackage>, DbError>>,
    },
    /// Remove a formula and its file records
    RemovePackage {
        name: String,
        resp: oneshot::Sender<Result<Vec<PathBuf>, DbError>>,
    },
    /// Append an entry to the operation history
    AddHistory {
        name: String,
        action: String,
        version: Option<String>,
        success: bool,
        resp: oneshot::Sender<Result<(), DbError>>,
    },
    /// Record a complete formula installation
    InstallComplete {
        pkg: InstalledPackage,
        files: Vec<PathBuf>,
        resp: oneshot::Sender<Result<(), DbError>>,
    },
    /// Shutdown the actor
    Shutdown,
}

impl fmt::Debug for DbEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetPackage { name, .. } => f
                .debug_struct("GetPackage")
                .field("name", name)
                .finish_non_exhaustive(),
            Self::GetPackageFiles { name, .. } => f
                .debug_struct("GetPackageFiles")
                .field("name", name)
                .finish_non_exhaustive(),
            Self::ListPackages { .. } => f.debug_struct("ListPackages").finish_non_exhaustive(),
            Self::RemovePackage { name, .. } => f
                .debug_struct("RemovePackage")
                .field("name", name)
                .finish_non_exhaustive(),
            Self::AddHistory { name, action, .. } => f
                .debug_struct("AddHistory")
                .field("name", name)
                .field("action", action)
                .finish_non_exhaustive(),
            Self::InstallComplete { pkg, .. } => f
                .debug_struct("InstallComplete")
                .field("name", &pkg.name)
                .field("version", &pkg.version)
                .finish_non_exhaustive(),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// A handle to the Database Actor that is Send + Sync and Clone.
#[derive(Clone)]
pub struct DbHandle {
    sender: mpsc::Sender<DbEvent>,
}

impl fmt::Debug for DbHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbHandle").finish_non_exhaustive()
    }
}

impl DbHandle {
    /// Spawn a new DB actor thread
    pub fn spawn() -> Result<Self, DbError> {
        let (sender, receiver) = mpsc::channel();
        let db = StateDb::open()?;

        thread::spawn(move || {
            run_db_event_loop(db, receiver);
        });

        Ok(Self { sender })
    }

    /// Helper to send a request and wait for the response
    async fn request<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(oneshot::Sender<Result<T, DbError>>) -> DbEvent,
    {
        let (tx, rx) = oneshot::channel();
        self.sender.send(f(tx)).map_err(|_| DbError::ActorDied)?;
        rx.await.map_err(|_| DbError::ActorDied)?
    }

    pub async fn get_package(&self, name: String) -> Result<Option<InstalledPackage>, DbError> {
        self.request(|resp| DbEvent::GetPackage { name, resp })
            .await
    }

    pub async fn get_package_files(&self, name: String) -> Result<Vec<PathBuf>, DbError> {
        self.request(|resp| DbEvent::GetPackageFiles { name, resp })
            .await
    }

    pub async fn list_packages(&self) -> Result<Vec<InstalledPackage>, DbError> {
        self.request(|resp| DbEvent::ListPackages { resp }).await
    }

    pub async fn remove_package(&self, name: String) -> Result<Vec<PathBuf>, DbError> {
        self.request(|resp| DbEvent::RemovePackage { name, resp })
            .await
    }

    pub async fn add_history(
        &self,
        name: String,
        action: String,
        version: Option<String>,
        success: bool,
    ) -> Result<(), DbError> {
        self.request(|resp| DbEvent::AddHistory {
            name,
            action,
            version,
            success,
            resp,
        })
        .await
    }

    pub async fn install_complete(
        &self,
        pkg: InstalledPackage,
        files: Vec<PathBuf>,
    ) -> Result<(), DbError> {
        self.request(|resp| DbEvent::InstallComplete { pkg, files, resp })
            .await
    }
}

/// The actual event loop running in the background thread
// The db and receiver are intentionally moved into this thread to ensure
// exclusive ownership for the actor pattern.
#[allow(clippy::needless_pass_by_value)]
fn run_db_event_loop(mut db: StateDb, receiver: mpsc::Receiver<DbEvent>) {
    while let Ok(event) = receiver.recv() {
        match event {
            DbEvent::GetPackage { name, resp } => {
                let _ = resp.send(db.get_package(&name));
            }
            DbEvent::GetPackageFiles { name, resp } => {
                let _ = resp.send(db.get_package_files(&name));
            }
            DbEvent::ListPackages { resp } => {
                let _ = resp.send(db.list_packages());
            }
            DbEvent::RemovePackage { name, resp } => {
                let _ = resp.send(db.remove_package(&name));
            }
            DbEvent::AddHistory {
                name,
                action,
                version,
                success,
                resp,
            } => {
                let _ = resp.send(db.add_history(&name, &action, version.as_deref(), success));
            }
            DbEvent::InstallComplete { pkg, files, resp } => {
                let _ = resp.send(db.install_complete(&pkg, &files));
            }
            DbEvent::Shutdown => break,
        }
    }
}
