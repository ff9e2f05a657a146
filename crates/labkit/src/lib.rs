//! # labkit
//!
//! Blocking GitLab REST client for the resources a provisioning run touches:
//! users, personal access tokens, groups and projects.
//!
//! This crate provides:
//! - The [`Gateway`] trait, a synchronous request/response façade
//! - [`GitLabBackend`], the `ureq`-backed implementation for API v4
//! - [`MockGateway`], an in-memory platform with a call log for tests
//! - Typed errors with categories ([`Error`], [`ErrorCategory`])
//!
//! ## Example
//!
//! ```no_run
//! use labkit::Gateway;
//!
//! // Fails unless the token belongs to an administrator
//! let gateway = labkit::connect("https://gitlab.example.com", "glpat-xxxx")
//!     .expect("authentication failed");
//!
//! if let Some(user) = gateway.lookup_account("alice").unwrap() {
//!     println!("alice has ID {}", user.id);
//! }
//! ```
//!
//! ## Lookups
//!
//! Every `lookup_*` method returns `Ok(None)` when the platform answers 404
//! and `Err` for anything else. A network failure is never reported as
//! "does not exist".

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::gitlab::GitLabBackend;
pub use backend::{Call, Gateway, MockGateway, Op};
pub use error::{Error, ErrorCategory, Result};
pub use types::{
    Account, AccountPage, Group, NewAccount, NewGroup, NewProject, NewToken, Project,
    ProjectNamespace, Visibility,
};

/// Build a backend and verify the token belongs to an administrator.
///
/// # Errors
///
/// Returns the API error if authentication fails, or [`Error::NotAdmin`] if
/// the token owner lacks admin rights.
pub fn connect(base_url: &str, token: &str) -> Result<GitLabBackend> {
    let backend = GitLabBackend::new(base_url, token);
    verify_admin(&backend)?;
    Ok(backend)
}

/// Check that the gateway's token owner is an administrator.
///
/// Returns the token owner on success.
pub fn verify_admin(gateway: &dyn Gateway) -> Result<Account> {
    let user = gateway.current_user()?;
    if !user.is_admin {
        return Err(Error::NotAdmin {
            username: user.username,
        });
    }
    log::info!("authenticated as {} (admin)", user.username);
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_admin_accepts_admin() {
        let mock = MockGateway::new();
        let user = verify_admin(&mock).unwrap();
        assert_eq!(user.username, "root");
    }

    #[test]
    fn test_verify_admin_rejects_regular_user() {
        let mock = MockGateway::new();
        mock.set_current_user(Account {
            id: 9,
            username: "dev".to_string(),
            name: "Dev".to_string(),
            email: None,
            is_admin: false,
            state: None,
            created_at: None,
            web_url: None,
        });
        let err = verify_admin(&mock).unwrap_err();
        assert!(matches!(err, Error::NotAdmin { .. }));
    }

    #[test]
    fn test_verify_admin_propagates_auth_failure() {
        let mock = MockGateway::new();
        mock.fail_all(Op::CurrentUser, "401 Unauthorized");
        let err = verify_admin(&mock).unwrap_err();
        assert!(matches!(err, Error::Api { .. }));
    }
}
