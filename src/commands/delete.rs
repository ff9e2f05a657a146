use anyhow::Result;

use super::{connect, finish_batch, normalize_usernames};
use crate::Context;
use crate::cli::ConnectionArgs;
use crate::ui;

pub fn run(ctx: &Context, usernames: &[String], connection: &ConnectionArgs) -> Result<()> {
    let usernames = normalize_usernames(usernames);
    if usernames.is_empty() {
        anyhow::bail!("no usernames given (use --username a,b,c)");
    }

    let session = connect(ctx, connection)?;

    if !ctx.quiet {
        ui::header(&format!("Deleting {} account(s)", usernames.len()));
    }

    let summary = session.orchestrator.delete_accounts(&usernames);
    finish_batch(ctx, &summary)
}
