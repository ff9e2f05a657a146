//! Results produced by orchestrator runs.
//!
//! The create path yields one [`AccountResult`] per account, mirroring the
//! spec tree with resolved identifiers filled in. Cleanup and bulk runs
//! yield per-account outcomes.

use chrono::NaiveDate;
use labkit::Visibility;
use serde::{Serialize, Serializer};

/// What the create path produced for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountResult {
    /// Resolved username.
    pub username: String,
    /// Resolved email.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Platform user ID.
    pub user_id: u64,
    /// Password from the spec, so the output is enough to log in.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Issued token, omitted when none was requested or issuance failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenResult>,
    /// Groups that were created or reused.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupResult>,
    /// User-level projects that were created or reused.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<ProjectResult>,
}

/// An issued personal access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResult {
    /// Secret value.
    pub value: String,
    /// Granted scopes.
    #[serde(rename = "scope")]
    pub scopes: Vec<String>,
    /// Expiry date.
    #[serde(serialize_with = "serialize_date")]
    pub expires_at: NaiveDate,
}

/// A created or reused group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupResult {
    /// Display name.
    pub name: String,
    /// Full path.
    pub path: String,
    /// Platform group ID.
    pub group_id: u64,
    /// Visibility requested for the group.
    pub visibility: Visibility,
    /// Projects in the group.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<ProjectResult>,
}

/// A created or reused project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectResult {
    /// Display name.
    pub name: String,
    /// `<namespace>/<path>`.
    pub path: String,
    /// Platform project ID.
    pub project_id: u64,
    /// Description.
    pub description: String,
    /// Visibility requested for the project.
    pub visibility: Visibility,
    /// Project URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
}

fn serialize_date<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&crate::naming::format_date(*date))
}

/// What cleanup did with one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// The account was deleted. `verified` is whether a re-lookup saw it gone.
    Deleted {
        /// Re-lookup confirmed removal.
        verified: bool,
    },
    /// The account did not exist.
    NotFound,
    /// The account is younger than the threshold.
    TooRecent {
        /// Age in whole days.
        age_days: i64,
    },
    /// The account's creation time is unknown, so the age gate skipped it.
    AgeUnknown,
}

impl CleanupOutcome {
    /// Whether a delete call was issued for the account.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}

/// Outcome of a multi-account cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Accounts processed without error, with what happened to each.
    pub outcomes: Vec<(String, CleanupOutcome)>,
    /// Accounts whose processing failed, with the error message.
    pub failures: Vec<(String, String)>,
}

impl BatchSummary {
    /// Usernames that were deleted.
    #[must_use]
    pub fn deleted(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_deleted())
            .map(|(username, _)| username.as_str())
            .collect()
    }

    /// Number of accounts left alone (absent or filtered by age).
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_deleted())
            .count()
    }

    /// Whether every account was processed without error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of a delete-by-prefix run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixDeleteReport {
    /// Usernames that start with the prefix.
    pub matched: Vec<String>,
    /// Matched accounts younger than the threshold.
    pub too_recent: Vec<String>,
    /// Matched accounts with no creation time.
    pub age_unknown: Vec<String>,
    /// Accounts selected for deletion (in a dry run, nothing was deleted).
    pub selected: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// Per-account cleanup results; empty in a dry run.
    pub summary: BatchSummary,
}
