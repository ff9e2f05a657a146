use anyhow::Result;
use chrono::{DateTime, Utc};
use labkit::Account;

use super::{connect, with_advice};
use crate::Context;
use crate::cli::ConnectionArgs;
use crate::ui;

pub fn run(ctx: &Context, prefix: Option<&str>, json: bool, connection: &ConnectionArgs) -> Result<()> {
    let session = connect(ctx, connection)?;
    let accounts = match prefix {
        Some(prefix) => session.orchestrator.accounts_with_prefix(prefix),
        None => session.orchestrator.list_accounts(None),
    }
    .map_err(|e| with_advice(e, "list accounts"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
        return Ok(());
    }

    if !ctx.quiet {
        let title = match prefix {
            Some(p) => format!("Accounts starting with '{}'", p),
            None => "Accounts".to_string(),
        };
        ui::header(&title);
    }

    if accounts.is_empty() {
        ui::info("no accounts found");
        return Ok(());
    }

    println!("{}", table_header());
    let now = Utc::now();
    for account in &accounts {
        println!("{}", table_row(account, now));
    }
    println!();
    ui::dim(&format!("{} account(s)", accounts.len()));

    Ok(())
}

fn table_header() -> String {
    format!(
        "  {:>6}  {:<24}  {:<32}  {:<10}  {}",
        "ID", "USERNAME", "EMAIL", "STATE", "AGE"
    )
}

fn table_row(account: &Account, now: DateTime<Utc>) -> String {
    format!(
        "  {:>6}  {:<24}  {:<32}  {:<10}  {}",
        account.id,
        ui::fit(&account.username, 24),
        ui::fit(account.email.as_deref().unwrap_or("-"), 32),
        account.state.as_deref().unwrap_or("-"),
        ui::format_age(account.age_in_days(now)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_table_row_columns() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).unwrap();
        let account = Account {
            id: 42,
            username: "qa-alice".into(),
            name: "Alice".into(),
            email: None,
            is_admin: false,
            state: Some("active".into()),
            created_at: Some(now - Duration::days(3)),
            web_url: None,
        };

        let row = table_row(&account, now);
        assert!(row.contains("42"));
        assert!(row.contains("qa-alice"));
        assert!(row.contains("active"));
        assert!(row.contains(&ui::format_age(Some(3))));
        assert!(table_header().contains("USERNAME"));
    }
}
