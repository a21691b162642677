//! Core host logic for AN.
//!
//! Implements the four operations the host performs on a formula
//! descriptor — Resolve, Fetch, Install, Verify — as a typestate pipeline
//! ([`flow`]), backed by the formula index ([`index`]), streaming
//! download-and-verify ([`fetch`]), archive unpacking ([`extract`]), and
//! script execution ([`script`]).

pub mod extract;
pub mod fetch;
pub mod flow;
pub mod index;
pub mod paths;
pub mod reporter;
pub mod script;

pub use paths::*;
pub use reporter::{NullReporter, Reporter};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("an/", env!("CARGO_PKG_VERSION"));
