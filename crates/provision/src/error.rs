//! Error types for provisioning runs.
//!
//! Only failures that abort a whole account surface as [`Error`]. Per-entity
//! failures below the account (tokens, groups, projects, verification) are
//! reported through the observer and the run continues.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures while loading or validating a spec file.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The spec file could not be read.
    #[error("read spec file {path}: {source}")]
    Read {
        /// Path of the spec file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The spec file is not valid YAML for the expected shape.
    #[error("parse spec file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The spec parsed but violates a rule.
    #[error("invalid spec: {0}")]
    Invalid(String),
}

/// Naming-layer failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    /// A token scope is empty or contains characters outside `[a-z0-9_]`.
    #[error("invalid token scope '{0}'")]
    InvalidScope(String),

    /// A token was requested with no scopes at all.
    #[error("token requires at least one scope")]
    NoScopes,
}

/// Errors that abort processing of an account (or the whole run).
#[derive(Debug, Error)]
pub enum Error {
    /// Spec loading or validation failed.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Naming policy rejected a value.
    #[error(transparent)]
    Naming(#[from] NamingError),

    /// The account lookup itself failed (not the same as "absent").
    #[error("look up account {username}: {source}")]
    AccountLookup {
        /// Username that was looked up.
        username: String,
        /// Gateway error.
        #[source]
        source: labkit::Error,
    },

    /// The account did not exist and could not be created.
    #[error("create account {username}: {source}")]
    AccountCreation {
        /// Username that was being created.
        username: String,
        /// Gateway error.
        #[source]
        source: labkit::Error,
    },

    /// The account delete call failed.
    #[error("delete account {username}: {source}")]
    AccountDeletion {
        /// Username that was being deleted.
        username: String,
        /// Gateway error.
        #[source]
        source: labkit::Error,
    },

    /// Delete-by-prefix was asked to match every account.
    #[error("prefix must not be empty")]
    EmptyPrefix,

    /// Any other gateway failure that aborts the operation.
    #[error(transparent)]
    Gateway(#[from] labkit::Error),
}

impl Error {
    /// The gateway error underneath, if any.
    #[must_use]
    pub fn gateway_error(&self) -> Option<&labkit::Error> {
        match self {
            Error::AccountLookup { source, .. }
            | Error::AccountCreation { source, .. }
            | Error::AccountDeletion { source, .. } => Some(source),
            Error::Gateway(source) => Some(source),
            Error::Spec(_) | Error::Naming(_) | Error::EmptyPrefix => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_creation_display() {
        let err = Error::AccountCreation {
            username: "alice".to_string(),
            source: labkit::Error::api(400, "Email has already been taken"),
        };
        let display = err.to_string();
        assert!(display.contains("alice"));
        assert!(display.contains("Email has already been taken"));
        assert!(err.gateway_error().is_some());
    }

    #[test]
    fn test_spec_error_is_not_gateway() {
        let err: Error = SpecError::Invalid("users[0]: username is empty".to_string()).into();
        assert!(err.gateway_error().is_none());
        assert!(err.to_string().contains("username is empty"));
    }

    #[test]
    fn test_naming_error_display() {
        assert_eq!(
            NamingError::InvalidScope("read api".to_string()).to_string(),
            "invalid token scope 'read api'"
        );
    }
}
