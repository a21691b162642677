//! Reporter trait for dependency injection
//!
//! This trait allows core logic to report progress and status without
//! being coupled to a specific console implementation.

use an_schema::{FormulaName, Version};

/// Progress and status sink for pipeline operations.
pub trait Reporter: Send + Sync {
    /// Indicates a new pipeline phase has started (e.g. "Fetching", "Installing").
    fn section(&self, title: &str);

    /// Updates the progress of a download.
    fn downloading(&self, name: &FormulaName, version: &Version, current: u64, total: Option<u64>);

    /// Updates the state of a formula to 'installing' (build script running).
    fn installing(&self, name: &FormulaName, version: &Version);

    /// Updates the state of a formula to 'verifying' (smoke test running).
    fn verifying(&self, name: &FormulaName, version: &Version);

    /// Updates the state of a formula to 'removing'.
    fn removing(&self, name: &FormulaName, version: &Version);

    /// Marks a formula operation as successfully completed.
    fn done(&self, name: &FormulaName, version: &Version, detail: &str);

    /// Marks a formula operation as failed with a specific reason.
    fn failed(&self, name: &FormulaName, version: &Version, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a success message.
    fn success(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Log an error message.
    fn error(&self, msg: &str);

    /// Display a final summary of multiple operations.
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn downloading(&self, name: &FormulaName, version: &Version, current: u64, total: Option<u64>) {
        (**self).downloading(name, version, current, total);
    }
    fn installing(&self, name: &FormulaName, version: &Version) {
        (**self).installing(name, version);
    }
    fn verifying(&self, name: &FormulaName, version: &Version) {
        (**self).verifying(name, version);
    }
    fn removing(&self, name: &FormulaName, version: &Version) {
        (**self).removing(name, version);
    }
    fn done(&self, name: &FormulaName, version: &Version, detail: &str) {
        (**self).done(name, version, detail);
    }
    fn failed(&self, name: &FormulaName, version: &Version, reason: &str) {
        (**self).failed(name, version, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn success(&self, msg: &str) {
        (**self).success(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn error(&self, msg: &str) {
        (**self).error(msg);
    }
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        (**self).summary(count, action, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn downloading(&self, _: &FormulaName, _: &Version, _: u64, _: Option<u64>) {}
    fn installing(&self, _: &FormulaName, _: &Version) {}
    fn verifying(&self, _: &FormulaName, _: &Version) {}
    fn removing(&self, _: &FormulaName, _: &Version) {}
    fn done(&self, _: &FormulaName, _: &Version, _: &str) {}
    fn failed(&self, _: &FormulaName, _: &Version, _: &str) {}
    fn info(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn error(&self, _: &str) {}
    fn summary(&self, _: usize, _: &str, _: f64) {}
}
