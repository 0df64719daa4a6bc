//! `docshift history`

use docshift_core::{render_history, Migrator};

use crate::context::CommandContext;
use crate::error::CommandError;

/// Render the chain with each migration tagged APPLIED, CURRENT or PENDING
pub async fn run(ctx: &CommandContext) -> Result<String, CommandError> {
    let prepared = ctx.prepare().await?;
    let migrator = Migrator::new(&prepared.history, prepared.db.as_ref(), &prepared.store);
    let entries = migrator.status().await?;
    Ok(render_history(&entries))
}
