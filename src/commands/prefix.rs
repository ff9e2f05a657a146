use anyhow::Result;
use provision::PrefixDeleteReport;

use super::{connect, finish_batch, with_advice};
use crate::Context;
use crate::cli::ConnectionArgs;
use crate::ui;

pub fn run(
    ctx: &Context,
    prefix: &str,
    days_old: u32,
    dry_run: bool,
    connection: &ConnectionArgs,
) -> Result<()> {
    let session = connect(ctx, connection)?;

    if !ctx.quiet {
        let mode = if dry_run { " (dry run)" } else { "" };
        ui::header(&format!("Deleting accounts starting with '{}'{}", prefix, mode));
    }

    let report = session
        .orchestrator
        .delete_by_prefix(prefix, days_old, dry_run)
        .map_err(|e| with_advice(e, &format!("delete accounts starting with '{}'", prefix)))?;

    if !ctx.quiet {
        print_selection(&report, days_old);
    }

    if report.dry_run {
        if !ctx.quiet && !report.selected.is_empty() {
            ui::dim("re-run without --dry-run to delete");
        }
        return Ok(());
    }

    if report.selected.is_empty() {
        return Ok(());
    }
    finish_batch(ctx, &report.summary)
}

fn print_selection(report: &PrefixDeleteReport, days_old: u32) {
    ui::kv("Matched", &report.matched.len().to_string());
    if !report.too_recent.is_empty() {
        ui::kv(
            &format!("Newer than {}d", days_old),
            &report.too_recent.len().to_string(),
        );
    }
    if !report.age_unknown.is_empty() {
        ui::kv("Unknown age", &report.age_unknown.len().to_string());
    }
    ui::kv("Selected", &report.selected.len().to_string());

    if report.selected.is_empty() {
        ui::info("nothing to delete");
    }
}
