//! Command layer of the `docshift` binary
//!
//! Each subcommand checks its preconditions, then hands off to `docshift-core`.
//! Commands take a [`CommandContext`] so they can run against any
//! [`docshift_storage::Connector`].

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod template;

pub use cli::{Cli, Commands, DowngradeArgs, UpgradeArgs};
pub use context::CommandContext;
pub use error::CommandError;
