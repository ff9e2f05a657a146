//! Listing and delete-by-prefix.
//!
//! The platform's account search is a substring match, so every prefix
//! operation lists by substring and re-filters locally with `starts_with`.

use super::Orchestrator;
use crate::error::{Error, Result};
use crate::observer::Event;
use crate::report::{CleanupOutcome, PrefixDeleteReport};
use crate::spec::AccountSpec;
use labkit::Account;

impl Orchestrator {
    /// Every account whose username contains `search` (all accounts when `None`).
    pub fn list_accounts(&self, search: Option<&str>) -> Result<Vec<Account>> {
        Ok(self.gateway.list_all_accounts(search)?)
    }

    /// Every account whose username starts with `prefix`.
    pub fn accounts_with_prefix(&self, prefix: &str) -> Result<Vec<Account>> {
        let mut accounts = self.list_accounts(Some(prefix))?;
        accounts.retain(|account| account.username.starts_with(prefix));
        Ok(accounts)
    }

    /// Delete every account whose username starts with `prefix`.
    ///
    /// With `days_old > 0`, accounts younger than that many days and accounts
    /// with no known creation time are left alone. With `dry_run`, the
    /// selected accounts are only reported.
    ///
    /// # Errors
    ///
    /// Fails if `prefix` is empty or the listing fails. Per-account cleanup
    /// failures are collected in the report instead.
    pub fn delete_by_prefix(
        &self,
        prefix: &str,
        days_old: u32,
        dry_run: bool,
    ) -> Result<PrefixDeleteReport> {
        if prefix.is_empty() {
            return Err(Error::EmptyPrefix);
        }

        let matched = self.accounts_with_prefix(prefix)?;
        log::info!("{} account(s) start with '{}'", matched.len(), prefix);

        let mut report = PrefixDeleteReport {
            dry_run,
            ..PrefixDeleteReport::default()
        };
        let mut selected: Vec<&Account> = Vec::new();
        for account in &matched {
            report.matched.push(account.username.clone());
            match self.age_gate(account, days_old) {
                Some(CleanupOutcome::AgeUnknown) => report.age_unknown.push(account.username.clone()),
                Some(_) => report.too_recent.push(account.username.clone()),
                None => selected.push(account),
            }
        }
        report.selected = selected.iter().map(|a| a.username.clone()).collect();

        if dry_run {
            let now = self.clock.now();
            for account in &selected {
                self.emit(Event::WouldDelete {
                    username: account.username.clone(),
                    age_days: account.age_in_days(now),
                });
            }
            return Ok(report);
        }

        // Already filtered by age above, so cleanup runs ungated.
        let specs: Vec<AccountSpec> = report
            .selected
            .iter()
            .map(|username| AccountSpec::bare(username))
            .collect();
        report.summary = self.cleanup_batch(specs.iter(), 0);
        Ok(report)
    }
}
