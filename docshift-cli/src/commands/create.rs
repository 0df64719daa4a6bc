//! `docshift create`

use std::io::Write;
use std::path::PathBuf;

use docshift_core::history::migration_file_name;

use crate::context::{load_valid_history, CommandContext};
use crate::error::CommandError;
use crate::template::{next_version, render_migration};

/// Write a new migration file that follows the current last migration
///
/// Only the filesystem is touched; the database is never contacted.
pub async fn run(ctx: &CommandContext, title: &str) -> Result<PathBuf, CommandError> {
    let dir = ctx.require_migrations_dir()?;

    let title = title.trim();
    if title.is_empty() {
        return Err(CommandError::MissingTitle);
    }

    let history = load_valid_history(&dir)?;
    let last_version = history.get_last_version();
    let version = next_version(chrono::Utc::now(), last_version);

    let path = dir.join(migration_file_name(&version, title));
    let content = render_migration(title, &version, last_version);

    let io_error = |source| CommandError::Io {
        path: path.clone(),
        source,
    };
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .map_err(io_error)?;
    file.write_all(content.as_bytes()).map_err(io_error)?;

    tracing::info!("Created migration {} ({})", version, title);
    Ok(path)
}
