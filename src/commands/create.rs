use anyhow::Result;
use std::path::Path;

use super::{connect, load_spec, with_advice};
use crate::Context;
use crate::cli::ConnectionArgs;
use crate::render::{OutputDocument, write_output};
use crate::ui;

pub fn run(
    ctx: &Context,
    file: &Path,
    output: Option<&Path>,
    template: Option<&Path>,
    connection: &ConnectionArgs,
) -> Result<()> {
    // Spec errors should surface before any network traffic
    let spec = load_spec(file)?;
    let session = connect(ctx, connection)?;

    let total = spec.users.len();
    if !ctx.quiet {
        ui::header(&format!("Creating {} account(s)", total));
    }

    let mut results = Vec::with_capacity(total);
    for (i, account) in spec.users.iter().enumerate() {
        if !ctx.quiet {
            ui::step(i + 1, total, &account.username);
        }
        let result = session
            .orchestrator
            .create_account(account)
            .map_err(|e| with_advice(e, &format!("provision account {}", account.username)))?;
        results.push(result);
    }

    let document = OutputDocument::new(&session.credentials.endpoint, results);
    let rendered = document.render(template)?;

    match output {
        Some(path) => {
            write_output(path, &rendered)?;
            if !ctx.quiet {
                ui::success(&format!("results saved to {}", path.display()));
            }
        }
        None => {
            if !ctx.quiet {
                ui::section("Result");
            }
            print!("{}", rendered);
        }
    }

    Ok(())
}
