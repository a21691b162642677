//! Shared operation plumbing.

pub mod context;

pub use context::Context;
