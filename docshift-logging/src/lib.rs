//! Logging setup for docshift
//!
//! Installs a `tracing` subscriber writing to stderr so that command output on
//! stdout stays machine-readable.

pub mod init;

pub use init::{init_logging, resolve_filter};
