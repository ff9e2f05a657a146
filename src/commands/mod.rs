pub mod cleanup;
pub mod create;
pub mod delete;
pub mod list;
pub mod prefix;

use anyhow::{Context as _, Result};
use provision::{BatchSummary, Orchestrator};

use crate::Context;
use crate::cli::{ConnectionArgs, UserCommand};
use crate::config::Credentials;
use crate::console::ConsoleObserver;
use crate::ui;

/// An authenticated admin connection plus the orchestrator driving it.
pub struct Session {
    pub credentials: Credentials,
    pub orchestrator: Orchestrator,
}

/// Resolve credentials, authenticate, and check the caller is an admin.
pub fn connect(ctx: &Context, args: &ConnectionArgs) -> Result<Session> {
    let credentials = Credentials::resolve(args)?;
    let base_url = credentials.base_url.clone();

    if ctx.verbose > 0 && !ctx.quiet {
        ui::kv("GitLab", &base_url);
    }
    log::info!("checking connection and permissions on {}", base_url);

    let backend = labkit::connect(&base_url, &credentials.token).map_err(|e| {
        let category = e.category();
        anyhow::Error::new(e).context(format!(
            "connect to {} ({}: {})",
            base_url,
            category,
            category.advice()
        ))
    })?;

    let orchestrator = Orchestrator::new(backend).with_observer(ConsoleObserver::new(ctx.quiet));
    Ok(Session {
        credentials,
        orchestrator,
    })
}

pub fn run_user(ctx: &Context, cmd: UserCommand) -> Result<()> {
    match cmd {
        UserCommand::Create {
            file,
            output,
            template,
            connection,
        } => create::run(ctx, &file, output.as_deref(), template.as_deref(), &connection),
        UserCommand::Cleanup {
            file,
            days_old,
            connection,
        } => cleanup::run(ctx, &file, days_old, &connection),
        UserCommand::Delete {
            usernames,
            connection,
        } => delete::run(ctx, &usernames, &connection),
        UserCommand::List {
            prefix,
            json,
            connection,
        } => list::run(ctx, prefix.as_deref(), json, &connection),
        UserCommand::DeleteByPrefix {
            prefix,
            dry_run,
            days_old,
            connection,
        } => prefix::run(ctx, &prefix, days_old, dry_run, &connection),
    }
}

/// Print a cleanup summary; fail if any account could not be processed.
pub fn finish_batch(ctx: &Context, summary: &BatchSummary) -> Result<()> {
    if !ctx.quiet {
        ui::section("Summary");
        ui::kv("Deleted", &summary.deleted().len().to_string());
        ui::kv("Skipped", &summary.skipped().to_string());
        ui::kv("Failed", &summary.failures.len().to_string());
    }

    for (username, message) in &summary.failures {
        ui::error(&format!("{}: {}", username, message));
    }

    if !summary.is_success() {
        anyhow::bail!("{} account(s) could not be cleaned up", summary.failures.len());
    }
    Ok(())
}

/// Wrap a provisioning failure, adding advice when the gateway caused it.
pub fn with_advice(err: provision::Error, action: &str) -> anyhow::Error {
    let message = match err.gateway_error() {
        Some(source) => format!("{} ({})", action, source.category().advice()),
        None => action.to_string(),
    };
    anyhow::Error::new(err).context(message)
}

/// Usernames from `--username`, trimmed, without blanks or duplicates.
pub fn normalize_usernames(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

/// Load a spec file with a path-bearing error.
pub fn load_spec(path: &std::path::Path) -> Result<provision::SpecFile> {
    provision::SpecFile::load(path).with_context(|| format!("load spec file {}", path.display()))
}
