//! Core types for GitLab resource management.
//!
//! Resolved entities ([`Account`], [`Group`], [`Project`]) mirror the subset of
//! the GitLab API payloads the provisioning flow needs. Request types
//! (`New*`) describe what to create.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Visibility level for groups and projects.
///
/// # Example
///
/// ```
/// use labkit::Visibility;
///
/// assert_eq!(Visibility::default(), Visibility::Private);
/// assert_eq!("internal".parse::<Visibility>().unwrap(), Visibility::Internal);
/// assert_eq!(Visibility::Public.as_str(), "public");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only members can see the resource.
    #[default]
    Private,
    /// Any signed-in user can see the resource.
    Internal,
    /// Anyone can see the resource.
    Public,
}

impl Visibility {
    /// Get the API string for this visibility.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Internal => "internal",
            Self::Public => "public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(Self::Private),
            "internal" => Ok(Self::Internal),
            "public" => Ok(Self::Public),
            other => Err(format!(
                "unknown visibility '{}' (expected private, internal or public)",
                other
            )),
        }
    }
}

/// A GitLab user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Numeric user ID.
    pub id: u64,
    /// Unique username.
    pub username: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Primary email (only visible to admins).
    #[serde(default)]
    pub email: Option<String>,
    /// Whether the user is an instance administrator.
    #[serde(default)]
    pub is_admin: bool,
    /// Account state (`active`, `blocked`, ...).
    #[serde(default)]
    pub state: Option<String>,
    /// When the account was created, if the platform reported it.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Profile URL.
    #[serde(default)]
    pub web_url: Option<String>,
}

impl Account {
    /// Whole days elapsed between creation and `now`, if creation time is known.
    #[must_use]
    pub fn age_in_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.created_at.map(|created| (now - created).num_days())
    }
}

/// A GitLab group (namespace).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Numeric group ID.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Last path segment.
    pub path: String,
    /// Full path including parent namespaces.
    pub full_path: String,
    /// Group URL.
    #[serde(default)]
    pub web_url: Option<String>,
}

/// A GitLab project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Numeric project ID.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Last path segment.
    pub path: String,
    /// `<namespace>/<path>`.
    pub path_with_namespace: String,
    /// Project URL.
    #[serde(default)]
    pub web_url: Option<String>,
}

/// One page of an account listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPage {
    /// Accounts on this page.
    pub accounts: Vec<Account>,
    /// Next page number, `None` on the last page.
    pub next_page: Option<u32>,
}

/// Request to create a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewAccount {
    /// Username.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Initial password.
    pub password: String,
}

/// Request to issue a personal access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewToken {
    /// Token name.
    pub name: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Expiry date.
    pub expires_at: NaiveDate,
}

/// Request to create a top-level group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGroup {
    /// Display name.
    pub name: String,
    /// Path.
    pub path: String,
    /// Visibility.
    pub visibility: Visibility,
}

/// Where a new project lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ProjectNamespace {
    /// A group namespace, by group ID.
    Group(u64),
    /// The personal namespace of the user with this account ID.
    User(u64),
}

/// Request to create a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProject {
    /// Owning namespace.
    pub namespace: ProjectNamespace,
    /// Path of the owning namespace, used to build the full path.
    pub namespace_path: String,
    /// Display name.
    pub name: String,
    /// Path.
    pub path: String,
    /// Description.
    pub description: String,
    /// Visibility.
    pub visibility: Visibility,
}

impl NewProject {
    /// `<namespace_path>/<path>`.
    #[must_use]
    pub fn full_path(&self) -> String {
        format!("{}/{}", self.namespace_path, self.path)
    }
}
