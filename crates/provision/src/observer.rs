//! Progress reporting for orchestrator runs.
//!
//! The orchestrator never prints. Every step it takes becomes an [`Event`]
//! handed to an [`Observer`]; the CLI installs one that writes to the
//! terminal, tests install a [`RecordingObserver`].

use chrono::NaiveDate;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Kind of platform resource an event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// A user account.
    Account,
    /// A personal access token.
    Token,
    /// A group.
    Group,
    /// A project.
    Project,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Account => "account",
            Self::Token => "token",
            Self::Group => "group",
            Self::Project => "project",
        };
        write!(f, "{}", name)
    }
}

/// How loudly an event should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Routine progress.
    Info,
    /// Something was created or removed.
    Success,
    /// Something failed or could not be confirmed; the run continues.
    Warn,
}

/// One step of a create, cleanup or bulk run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A resource did not exist and was created.
    Created {
        /// Resource kind.
        resource: Resource,
        /// Username or full path.
        path: String,
        /// Platform ID.
        id: u64,
    },
    /// A resource already existed and is reused as-is.
    Reused {
        /// Resource kind.
        resource: Resource,
        /// Username or full path.
        path: String,
        /// Platform ID.
        id: u64,
    },
    /// A resource could not be created (or looked up before creating).
    CreateFailed {
        /// Resource kind.
        resource: Resource,
        /// Username or full path.
        path: String,
        /// Cause.
        message: String,
    },
    /// A token was issued.
    TokenIssued {
        /// Account the token belongs to.
        username: String,
        /// Token name.
        name: String,
        /// Expiry date.
        expires_at: NaiveDate,
    },
    /// Unblocking or approving a new account failed.
    ActivationFailed {
        /// Account.
        username: String,
        /// `unblock` or `approve`.
        action: &'static str,
        /// Cause.
        message: String,
    },
    /// A delete call succeeded.
    Deleted {
        /// Resource kind.
        resource: Resource,
        /// Username or full path.
        path: String,
    },
    /// A delete call failed.
    DeleteFailed {
        /// Resource kind.
        resource: Resource,
        /// Username or full path.
        path: String,
        /// Cause.
        message: String,
    },
    /// A lookup failed, so the resource was skipped.
    LookupFailed {
        /// Resource kind.
        resource: Resource,
        /// Username or full path.
        path: String,
        /// Cause.
        message: String,
    },
    /// The account to clean up does not exist.
    AccountMissing {
        /// Account.
        username: String,
    },
    /// The account is younger than the age threshold and was left alone.
    TooRecent {
        /// Account.
        username: String,
        /// Age in whole days.
        age_days: i64,
        /// Threshold in days.
        days_old: u32,
    },
    /// The platform did not report a creation time, so the account was left alone.
    AgeUnknown {
        /// Account.
        username: String,
    },
    /// One verification check found resources still present.
    VerifyAttempt {
        /// What is being verified.
        target: String,
        /// 1-indexed attempt.
        attempt: u32,
        /// Attempt cap.
        max_attempts: u32,
        /// Resources still present, or `None` if the check itself failed.
        remaining: Option<usize>,
    },
    /// Verification saw everything gone.
    VerifyConverged {
        /// What was verified.
        target: String,
    },
    /// Verification gave up with resources still present.
    VerifyTimedOut {
        /// What was verified.
        target: String,
        /// Paths last seen present.
        remaining: Vec<String>,
    },
    /// Waiting for the platform to propagate deletions.
    Settling {
        /// Wait length.
        duration: Duration,
    },
    /// The account is confirmed gone after deletion.
    AccountRemoved {
        /// Account.
        username: String,
    },
    /// The account still exists after deletion was requested.
    AccountStillPresent {
        /// Account.
        username: String,
    },
    /// Dry run: the account would be deleted.
    WouldDelete {
        /// Account.
        username: String,
        /// Age in whole days, if known.
        age_days: Option<i64>,
    },
    /// Processing of one account failed; the batch moves on.
    AccountFailed {
        /// Account.
        username: String,
        /// Cause.
        message: String,
    },
}

impl Event {
    /// Severity used for display.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Event::Created { .. }
            | Event::TokenIssued { .. }
            | Event::Deleted { .. }
            | Event::VerifyConverged { .. }
            | Event::AccountRemoved { .. } => Severity::Success,

            Event::CreateFailed { .. }
            | Event::ActivationFailed { .. }
            | Event::DeleteFailed { .. }
            | Event::LookupFailed { .. }
            | Event::AgeUnknown { .. }
            | Event::VerifyTimedOut { .. }
            | Event::AccountStillPresent { .. }
            | Event::AccountFailed { .. } => Severity::Warn,

            Event::Reused { .. }
            | Event::AccountMissing { .. }
            | Event::TooRecent { .. }
            | Event::VerifyAttempt { .. }
            | Event::Settling { .. }
            | Event::WouldDelete { .. } => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Created { resource, path, id } => {
                write!(f, "created {} {} (ID {})", resource, path, id)
            }
            Event::Reused { resource, path, id } => {
                write!(f, "{} {} already exists (ID {}), reusing", resource, path, id)
            }
            Event::CreateFailed {
                resource,
                path,
                message,
            } => write!(f, "failed to create {} {}: {}", resource, path, message),
            Event::TokenIssued {
                username,
                name,
                expires_at,
            } => write!(
                f,
                "issued token {} for {} (expires {})",
                name,
                username,
                expires_at.format("%Y-%m-%d")
            ),
            Event::ActivationFailed {
                username,
                action,
                message,
            } => write!(f, "failed to {} account {}: {}", action, username, message),
            Event::Deleted { resource, path } => write!(f, "deleted {} {}", resource, path),
            Event::DeleteFailed {
                resource,
                path,
                message,
            } => write!(f, "failed to delete {} {}: {}", resource, path, message),
            Event::LookupFailed {
                resource,
                path,
                message,
            } => write!(f, "could not look up {} {}, skipping: {}", resource, path, message),
            Event::AccountMissing { username } => {
                write!(f, "account {} not found, skipping", username)
            }
            Event::TooRecent {
                username,
                age_days,
                days_old,
            } => write!(
                f,
                "account {} is {} day(s) old (threshold {}), skipping",
                username, age_days, days_old
            ),
            Event::AgeUnknown { username } => {
                write!(f, "account {} has no creation time, skipping", username)
            }
            Event::VerifyAttempt {
                target,
                attempt,
                max_attempts,
                remaining,
            } => match remaining {
                Some(count) => write!(
                    f,
                    "verifying {} ({}/{}): {} still present",
                    target, attempt, max_attempts, count
                ),
                None => write!(
                    f,
                    "verifying {} ({}/{}): check failed",
                    target, attempt, max_attempts
                ),
            },
            Event::VerifyConverged { target } => write!(f, "verified {}", target),
            Event::VerifyTimedOut { target, remaining } => write!(
                f,
                "gave up verifying {}; still present: {}",
                target,
                if remaining.is_empty() {
                    "unknown".to_string()
                } else {
                    remaining.join(", ")
                }
            ),
            Event::Settling { duration } => {
                write!(f, "waiting {}s for deletions to propagate", duration.as_secs())
            }
            Event::AccountRemoved { username } => {
                write!(f, "account {} confirmed deleted", username)
            }
            Event::AccountStillPresent { username } => {
                write!(f, "account {} still exists after deletion", username)
            }
            Event::WouldDelete { username, age_days } => match age_days {
                Some(days) => write!(f, "would delete {} ({} day(s) old)", username, days),
                None => write!(f, "would delete {}", username),
            },
            Event::AccountFailed { username, message } => {
                write!(f, "account {} failed: {}", username, message)
            }
        }
    }
}

/// Receives orchestrator events.
pub trait Observer: Send + Sync {
    /// Called once per step, in order.
    fn on_step(&self, event: &Event);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn on_step(&self, _event: &Event) {}
}

/// Keeps every event in memory. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event seen so far.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events at `severity`.
    #[must_use]
    pub fn with_severity(&self, severity: Severity) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.severity() == severity)
            .collect()
    }
}

impl Observer for RecordingObserver {
    fn on_step(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
