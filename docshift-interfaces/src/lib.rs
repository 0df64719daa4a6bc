//! # docshift interfaces
//!
//! The document database seam shared across the docshift workspace.
//!
//! Migration actions and the version store only ever talk to a [`DocumentDatabase`]
//! trait object, which keeps the lineage and apply engines independent of the
//! driver that backs them. `docshift-storage` provides the MongoDB and in-memory
//! implementations.

pub mod database;

// Re-export commonly used types
pub use bson::{doc, Bson, Document};
pub use database::{DatabaseError, DocumentDatabase, IndexSpec, UpdateResult};
