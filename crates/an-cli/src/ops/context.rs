//! Shared installation context.
//!
//! Groups common state references used throughout the install/remove
//! commands to reduce argument fatigue.

use std::fmt;
use std::sync::Arc;

use an_core::index::FormulaIndex;
use an_core::Reporter;

use crate::DbHandle;

/// Groups common state used during formula operations.
#[derive(Clone)]
pub struct Context {
    pub db: DbHandle,
    pub index: Arc<FormulaIndex>,
    pub client: reqwest::Client,
    pub reporter: Arc<dyn Reporter>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("index_len", &self.index.len())
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(
        db: DbHandle,
        index: FormulaIndex,
        client: reqwest::Client,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            db,
            index: Arc::new(index),
            client,
            reporter,
        }
    }
}
