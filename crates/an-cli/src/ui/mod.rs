//! Console output.

pub mod console;

pub use console::{confirm, format_size, ConsoleReporter};
