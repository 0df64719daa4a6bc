//! `docshift init`

use std::fmt;

use colored::Colorize;

use crate::context::CommandContext;
use crate::error::CommandError;

/// What `init` had to create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOutcome {
    pub created_collection: bool,
    pub created_directory: bool,
}

impl fmt::Display for InitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.created_collection && !self.created_directory {
            return write!(f, "{} Already initialized", "[+]".green());
        }
        write!(f, "{} Initialized docshift", "[+]".green())
    }
}

/// Create the version collection, then the migrations directory
///
/// Nothing is written to disk when the database cannot be reached. An
/// existing collection without the version document is reported, not repaired.
pub async fn run(ctx: &CommandContext) -> Result<InitOutcome, CommandError> {
    let db = ctx.connect().await?;
    let store = ctx.version_store();
    let created_collection = store.initialize(db.as_ref()).await?;
    if !created_collection && !store.is_initialized(db.as_ref()).await? {
        return Err(CommandError::VersionDocumentMissing {
            collection: store.collection().to_string(),
        });
    }

    let dir = ctx.migrations_dir();
    let created_directory = !dir.is_dir();
    if created_directory {
        std::fs::create_dir_all(&dir).map_err(|source| CommandError::Io {
            path: dir.clone(),
            source,
        })?;
        tracing::info!("Created migrations directory {}", dir.display());
    }

    Ok(InitOutcome {
        created_collection,
        created_directory,
    })
}
