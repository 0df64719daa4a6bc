//! `docshift downgrade`

use docshift_core::{ApplyReport, DowngradeTarget, Migrator};

use crate::context::CommandContext;
use crate::error::CommandError;

pub async fn run(ctx: &CommandContext, target: DowngradeTarget) -> Result<ApplyReport, CommandError> {
    let prepared = ctx.prepare().await?;
    let migrator = Migrator::new(&prepared.history, prepared.db.as_ref(), &prepared.store);
    Ok(migrator.downgrade(target).await?)
}
