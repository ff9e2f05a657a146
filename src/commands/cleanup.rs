use anyhow::Result;
use std::path::Path;

use super::{connect, finish_batch, load_spec};
use crate::Context;
use crate::cli::ConnectionArgs;
use crate::ui;

pub fn run(ctx: &Context, file: &Path, days_old: u32, connection: &ConnectionArgs) -> Result<()> {
    let spec = load_spec(file)?;
    let session = connect(ctx, connection)?;

    if !ctx.quiet {
        ui::header(&format!("Cleaning up {} account(s)", spec.users.len()));
        if days_old > 0 {
            ui::dim(&format!(
                "only accounts created at least {} day(s) ago are deleted",
                days_old
            ));
        }
    }

    let summary = session.orchestrator.cleanup_all(&spec, days_old);
    finish_batch(ctx, &summary)
}
