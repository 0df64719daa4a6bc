//! Migration lineage and apply engine
//!
//! Migration units are discovered in a directory, linked into a single chain
//! ([`MigrationHistory`]) and walked forward or backward by the [`Migrator`],
//! which persists the current version through a [`VersionStore`] after every
//! completed step.

pub mod action;
pub mod engine;
pub mod error;
pub mod history;
pub mod node;
pub mod status;
pub mod version_store;

pub use action::{ActionError, MigrationAction, Operation, Operations};
pub use engine::{ApplyReport, Direction, DowngradeTarget, Migrator, UpgradeTarget};
pub use error::{EngineError, HistoryError, VersionStoreError};
pub use history::MigrationHistory;
pub use node::MigrationNode;
pub use status::{render_history, EntryState, HistoryEntry};
pub use version_store::VersionStore;
