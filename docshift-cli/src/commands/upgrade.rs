//! `docshift upgrade`

use docshift_core::{ApplyReport, Migrator, UpgradeTarget};

use crate::context::CommandContext;
use crate::error::CommandError;

pub async fn run(ctx: &CommandContext, target: UpgradeTarget) -> Result<ApplyReport, CommandError> {
    let prepared = ctx.prepare().await?;
    let migrator = Migrator::new(&prepared.history, prepared.db.as_ref(), &prepared.store);
    Ok(migrator.upgrade(target).await?)
}
