//! Cleanup path: tear an account down, children first.
//!
//! Order per account: user-level projects, configured groups (their projects
//! first), verification that configured groups are gone, every other group
//! the account owns, a settle pause, the account itself, and a final
//! re-lookup. Verification never fails the run; it only reports.
//!
//! Names from the spec are used verbatim here. Prefix-mode resources carry a
//! timestamp that cleanup cannot reconstruct, so only the account's owned
//! groups catch those.

use super::Orchestrator;
use crate::error::{Error, Result};
use crate::observer::{Event, Resource};
use crate::poll::poll_until;
use crate::report::{BatchSummary, CleanupOutcome};
use crate::spec::{AccountSpec, SpecFile};
use labkit::Account;

impl Orchestrator {
    /// Clean up every account in `spec`, continuing past per-account errors.
    pub fn cleanup_all(&self, spec: &SpecFile, days_old: u32) -> BatchSummary {
        self.cleanup_batch(spec.users.iter(), days_old)
    }

    /// Delete the named accounts and every group they own.
    pub fn delete_accounts(&self, usernames: &[String]) -> BatchSummary {
        let bare: Vec<AccountSpec> = usernames.iter().map(|name| AccountSpec::bare(name)).collect();
        self.cleanup_batch(bare.iter(), 0)
    }

    pub(crate) fn cleanup_batch<'a>(
        &self,
        accounts: impl ExactSizeIterator<Item = &'a AccountSpec>,
        days_old: u32,
    ) -> BatchSummary {
        let total = accounts.len();
        let mut summary = BatchSummary::default();
        for (i, spec) in accounts.enumerate() {
            log::info!("cleaning up account [{}/{}]: {}", i + 1, total, spec.username);
            match self.cleanup_account(spec, days_old) {
                Ok(outcome) => summary.outcomes.push((spec.username.clone(), outcome)),
                Err(e) => {
                    self.emit(Event::AccountFailed {
                        username: spec.username.clone(),
                        message: e.to_string(),
                    });
                    summary.failures.push((spec.username.clone(), e.to_string()));
                }
            }
        }
        summary
    }

    /// Tear down one account and what it owns.
    ///
    /// `days_old > 0` leaves accounts younger than that many whole days, and
    /// accounts with no known creation time, untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountLookup`] if the account cannot be looked up and
    /// [`Error::AccountDeletion`] if the delete call fails. Project and group
    /// failures are reported to the observer only.
    pub fn cleanup_account(&self, spec: &AccountSpec, days_old: u32) -> Result<CleanupOutcome> {
        let account = self
            .gateway
            .lookup_account(&spec.username)
            .map_err(|source| Error::AccountLookup {
                username: spec.username.clone(),
                source,
            })?;

        let Some(account) = account else {
            self.emit(Event::AccountMissing {
                username: spec.username.clone(),
            });
            return Ok(CleanupOutcome::NotFound);
        };

        if let Some(skipped) = self.age_gate(&account, days_old) {
            return Ok(skipped);
        }

        self.teardown(spec, &account)
    }

    /// `Some` when the account must be left alone because of its age.
    pub(crate) fn age_gate(&self, account: &Account, days_old: u32) -> Option<CleanupOutcome> {
        if days_old == 0 {
            return None;
        }
        match account.age_in_days(self.clock.now()) {
            None => {
                self.emit(Event::AgeUnknown {
                    username: account.username.clone(),
                });
                Some(CleanupOutcome::AgeUnknown)
            }
            Some(age_days) if age_days < i64::from(days_old) => {
                self.emit(Event::TooRecent {
                    username: account.username.clone(),
                    age_days,
                    days_old,
                });
                Some(CleanupOutcome::TooRecent { age_days })
            }
            Some(_) => None,
        }
    }

    fn teardown(&self, spec: &AccountSpec, account: &Account) -> Result<CleanupOutcome> {
        for project in &spec.projects {
            self.delete_project_at(&format!("{}/{}", spec.username, project.declared_path()));
        }

        let mut configured = Vec::with_capacity(spec.groups.len());
        for group in &spec.groups {
            let group_path = group.declared_path();
            for project in &group.projects {
                self.delete_project_at(&format!("{}/{}", group_path, project.declared_path()));
            }
            self.delete_group_at(group_path);
            configured.push(group_path.to_string());
        }
        if !configured.is_empty() {
            self.verify_groups_gone(&configured);
        }

        self.purge_owned_groups(&account.username);

        self.emit(Event::Settling {
            duration: self.timings.settle,
        });
        self.sleeper.sleep(self.timings.settle);

        self.gateway
            .delete_account(account.id)
            .map_err(|source| Error::AccountDeletion {
                username: account.username.clone(),
                source,
            })?;
        self.emit(Event::Deleted {
            resource: Resource::Account,
            path: account.username.clone(),
        });

        self.sleeper.sleep(self.timings.account_verify_delay);
        let verified = match self.gateway.lookup_account(&account.username) {
            Ok(None) => {
                self.emit(Event::AccountRemoved {
                    username: account.username.clone(),
                });
                true
            }
            Ok(Some(_)) => {
                self.emit(Event::AccountStillPresent {
                    username: account.username.clone(),
                });
                false
            }
            Err(e) => {
                self.emit(Event::LookupFailed {
                    resource: Resource::Account,
                    path: account.username.clone(),
                    message: e.to_string(),
                });
                false
            }
        };

        Ok(CleanupOutcome::Deleted { verified })
    }

    fn delete_project_at(&self, full_path: &str) {
        let project = match self.gateway.lookup_project(full_path) {
            Ok(Some(project)) => project,
            Ok(None) => {
                log::debug!("project {} not found, skipping", full_path);
                return;
            }
            Err(e) => {
                self.emit(Event::LookupFailed {
                    resource: Resource::Project,
                    path: full_path.to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        match self.gateway.delete_project(project.id) {
            Ok(()) => self.emit(Event::Deleted {
                resource: Resource::Project,
                path: full_path.to_string(),
            }),
            Err(e) => self.emit(Event::DeleteFailed {
                resource: Resource::Project,
                path: full_path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    fn delete_group_at(&self, path: &str) {
        let group = match self.gateway.lookup_group(path) {
            Ok(Some(group)) => group,
            Ok(None) => {
                log::debug!("group {} not found, skipping", path);
                return;
            }
            Err(e) => {
                self.emit(Event::LookupFailed {
                    resource: Resource::Group,
                    path: path.to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };
        self.delete_group(group.id, path);
    }

    fn delete_group(&self, id: u64, path: &str) {
        match self.gateway.delete_group(id) {
            Ok(()) => self.emit(Event::Deleted {
                resource: Resource::Group,
                path: path.to_string(),
            }),
            Err(e) => self.emit(Event::DeleteFailed {
                resource: Resource::Group,
                path: path.to_string(),
                message: e.to_string(),
            }),
        }
    }

    /// Poll until none of `paths` resolves to a group. A failed lookup counts
    /// as still present.
    fn verify_groups_gone(&self, paths: &[String]) -> bool {
        let target = "configured group deletion".to_string();
        let policy = self.timings.group_verify;
        let mut remaining: Vec<String> = Vec::new();

        let converged = poll_until(&*self.sleeper, policy, |attempt| {
            remaining.clear();
            let mut check_failed = false;
            for path in paths {
                match self.gateway.lookup_group(path) {
                    Ok(None) => {}
                    Ok(Some(_)) => remaining.push(path.clone()),
                    Err(e) => {
                        log::debug!("lookup of group {} failed during verification: {}", path, e);
                        check_failed = true;
                        remaining.push(path.clone());
                    }
                }
            }
            if remaining.is_empty() {
                return true;
            }
            self.emit(Event::VerifyAttempt {
                target: target.clone(),
                attempt,
                max_attempts: policy.max_attempts,
                remaining: (!check_failed).then_some(remaining.len()),
            });
            false
        });

        self.finish_verify(target, converged, remaining)
    }

    /// Delete every group `username` owns, then poll until the list is empty.
    fn purge_owned_groups(&self, username: &str) {
        let owned = match self.gateway.list_owned_groups(username) {
            Ok(groups) => groups,
            Err(e) => {
                self.emit(Event::LookupFailed {
                    resource: Resource::Group,
                    path: format!("groups owned by {}", username),
                    message: e.to_string(),
                });
                return;
            }
        };
        if owned.is_empty() {
            log::debug!("{} owns no other groups", username);
            return;
        }

        for group in &owned {
            self.delete_group(group.id, &group.full_path);
        }

        let target = format!("groups owned by {}", username);
        let policy = self.timings.owned_group_verify;
        let mut remaining: Vec<String> = Vec::new();

        let converged = poll_until(&*self.sleeper, policy, |attempt| {
            let count = match self.gateway.list_owned_groups(username) {
                Ok(groups) if groups.is_empty() => return true,
                Ok(groups) => {
                    remaining = groups.into_iter().map(|g| g.full_path).collect();
                    Some(remaining.len())
                }
                Err(e) => {
                    log::debug!("listing groups owned by {} failed: {}", username, e);
                    None
                }
            };
            self.emit(Event::VerifyAttempt {
                target: target.clone(),
                attempt,
                max_attempts: policy.max_attempts,
                remaining: count,
            });
            false
        });

        self.finish_verify(target, converged, remaining);
    }

    fn finish_verify(&self, target: String, converged: bool, remaining: Vec<String>) -> bool {
        if converged {
            self.emit(Event::VerifyConverged { target });
        } else {
            self.emit(Event::VerifyTimedOut { target, remaining });
        }
        converged
    }
}
