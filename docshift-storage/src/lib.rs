//! Database backends for docshift
//!
//! [`MongoDatabase`] talks to a real server through the official driver;
//! [`MemoryDatabase`] keeps everything in process and backs the test suite.
//! Command code opens either through a [`Connector`].

pub mod connector;
pub mod memory;

#[cfg(feature = "mongodb")]
pub mod mongo;

pub use connector::{Connector, MemoryConnector};
pub use memory::MemoryDatabase;

#[cfg(feature = "mongodb")]
pub use connector::MongoConnector;
#[cfg(feature = "mongodb")]
pub use mongo::MongoDatabase;
