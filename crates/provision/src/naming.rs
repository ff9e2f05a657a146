//! Naming policy: how a declared name becomes an on-platform identifier.
//!
//! In [`NamingMode::Name`] identifiers are used verbatim. In
//! [`NamingMode::Prefix`] (the default) a second-granularity timestamp is
//! appended and the result is sanitized, so repeated runs produce fresh
//! resources. Two calls within the same second collide; that is accepted.
//!
//! Every function here is pure given the `now` it is handed.

use crate::error::NamingError;
use chrono::{DateTime, Days, NaiveDate, Utc};
use labkit::Visibility;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Longest identifier the platform accepts.
pub const MAX_IDENTIFIER_LEN: usize = 255;

/// Characters trimmed from both ends of a generated identifier.
const SEPARATORS: &[char] = &['-', '_', '.'];

/// Domain used when a prefix-mode email is not a valid two-part address.
pub const FALLBACK_EMAIL_DOMAIN: &str = "example.com";

/// Days a token stays valid when the spec does not say.
pub const DEFAULT_TOKEN_VALIDITY_DAYS: u64 = 2;

/// Policy controlling whether identifiers get a timestamp suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingMode {
    /// Append a timestamp and sanitize.
    #[default]
    Prefix,
    /// Use the declared value verbatim.
    Name,
}

impl NamingMode {
    /// Effective mode for an entity: explicit, else inherited, else `Prefix`.
    #[must_use]
    pub fn resolve_effective(explicit: Option<Self>, inherited: Option<Self>) -> Self {
        explicit.or(inherited).unwrap_or_default()
    }

    /// Mode for a child of an entity already resolved to `self`.
    #[must_use]
    pub fn for_child(self, explicit: Option<Self>) -> Self {
        Self::resolve_effective(explicit, Some(self))
    }

    /// Spec-file spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prefix => "prefix",
            Self::Name => "name",
        }
    }
}

impl fmt::Display for NamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NamingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prefix" => Ok(Self::Prefix),
            "name" => Ok(Self::Name),
            other => Err(format!(
                "unknown nameMode '{}' (expected prefix or name)",
                other
            )),
        }
    }
}

/// Which character set an identifier must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// Usernames: `[A-Za-z0-9_.-]`.
    Username,
    /// Group and project paths: `[a-z0-9_-]`.
    Path,
}

impl IdentifierKind {
    fn allows(self, c: char) -> bool {
        match self {
            Self::Username => c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'),
            Self::Path => {
                c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-')
            }
        }
    }
}

/// Second-granularity suffix appended in prefix mode.
#[must_use]
pub fn timestamp_suffix(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

/// Lowercase, drop disallowed characters, truncate, and trim separators.
#[must_use]
pub fn sanitize(kind: IdentifierKind, raw: &str) -> String {
    let truncated: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| kind.allows(*c))
        .take(MAX_IDENTIFIER_LEN)
        .collect();
    truncated.trim_matches(SEPARATORS).to_string()
}

/// Map a declared name (and optional path) to the identifier used on the platform.
///
/// The declared path wins when non-empty, otherwise the name is used.
#[must_use]
pub fn resolve_identifier(
    mode: NamingMode,
    kind: IdentifierKind,
    raw_name: &str,
    raw_path: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let base = declared_identifier(raw_name, raw_path);
    match mode {
        NamingMode::Name => base.to_string(),
        NamingMode::Prefix => sanitize(kind, &format!("{}-{}", base, timestamp_suffix(now))),
    }
}

/// The declared path if non-empty, else the declared name.
#[must_use]
pub fn declared_identifier<'a>(raw_name: &'a str, raw_path: Option<&'a str>) -> &'a str {
    match raw_path {
        Some(path) if !path.is_empty() => path,
        _ => raw_name,
    }
}

/// Map a declared email to the address used on the platform.
#[must_use]
pub fn resolve_email(mode: NamingMode, raw_email: &str, now: DateTime<Utc>) -> String {
    if mode == NamingMode::Name {
        return raw_email.to_string();
    }

    let suffix = timestamp_suffix(now);
    match raw_email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            format!("{}-{}@{}", local, suffix, domain)
        }
        _ => {
            let local = sanitize(IdentifierKind::Username, &format!("{}-{}", raw_email, suffix));
            format!("{}@{}", local, FALLBACK_EMAIL_DOMAIN)
        }
    }
}

/// Visibility for an entity, `private` when unspecified.
#[must_use]
pub fn default_visibility(declared: Option<Visibility>) -> Visibility {
    declared.unwrap_or_default()
}

/// `today` plus [`DEFAULT_TOKEN_VALIDITY_DAYS`].
#[must_use]
pub fn default_token_expiry(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_days(Days::new(DEFAULT_TOKEN_VALIDITY_DAYS))
        .unwrap_or(today)
}

/// Token expiry: the declared date, or [`default_token_expiry`].
#[must_use]
pub fn resolve_token_expiry(declared: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    declared.unwrap_or_else(|| default_token_expiry(today))
}

/// `YYYY-MM-DD`.
#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Name for a generated token: `<username>-token-<unix seconds>`.
#[must_use]
pub fn token_name(username: &str, now: DateTime<Utc>) -> String {
    format!("{}-token-{}", username, now.timestamp())
}

/// Reject empty scope lists and scopes outside `[a-z0-9_]+`.
pub fn validate_scopes(scopes: &[String]) -> Result<(), NamingError> {
    if scopes.is_empty() {
        return Err(NamingError::NoScopes);
    }
    for scope in scopes {
        let valid = !scope.is_empty() && scope
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            return Err(NamingError::InvalidScope(scope.clone()));
        }
    }
    Ok(())
}
