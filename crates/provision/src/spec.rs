//! Declarative spec file model and loader.
//!
//! A spec file lists accounts, each with an optional token, groups (with
//! projects) and user-level projects:
//!
//! ```yaml
//! users:
//!   - username: alice
//!     email: alice@example.com
//!     name: Alice
//!     password: s3cret-pass
//!     nameMode: name
//!     token:
//!       scope: [api]
//!     groups:
//!       - name: Team
//!         projects:
//!           - name: Proj
//! ```
//!
//! Optional enum and date fields treat an empty string the same as an absent
//! key, so `nameMode: ""` inherits from the parent.

use crate::error::SpecError;
use crate::naming::{validate_scopes, NamingMode};
use chrono::NaiveDate;
use labkit::Visibility;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Root of a spec file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SpecFile {
    /// Accounts to provision or tear down, in order.
    #[serde(default)]
    pub users: Vec<AccountSpec>,
}

/// One account and everything it owns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccountSpec {
    /// Naming mode for the account; children inherit it.
    #[serde(rename = "nameMode", default, deserialize_with = "empty_as_none")]
    pub naming_mode: Option<NamingMode>,
    /// Declared username.
    pub username: String,
    /// Declared email.
    #[serde(default)]
    pub email: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Initial password.
    #[serde(default)]
    pub password: String,
    /// Personal access token to issue.
    #[serde(default)]
    pub token: Option<TokenSpec>,
    /// Groups owned by the account.
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    /// Projects in the account's personal namespace.
    #[serde(default)]
    pub projects: Vec<ProjectSpec>,
}

impl AccountSpec {
    /// An account with nothing configured under it, used when deleting by username.
    #[must_use]
    pub fn bare(username: &str) -> Self {
        Self {
            naming_mode: Some(NamingMode::Name),
            username: username.to_string(),
            ..Self::default()
        }
    }

    /// Effective naming mode for this account.
    #[must_use]
    pub fn effective_mode(&self) -> NamingMode {
        NamingMode::resolve_effective(self.naming_mode, None)
    }
}

/// Personal access token request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenSpec {
    /// Scopes to grant.
    #[serde(rename = "scope", alias = "scopes", default)]
    pub scopes: Vec<String>,
    /// Expiry date; two days from now when absent.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub expires_at: Option<NaiveDate>,
}

/// A group and the projects inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GroupSpec {
    /// Naming mode override.
    #[serde(rename = "nameMode", default, deserialize_with = "empty_as_none")]
    pub naming_mode: Option<NamingMode>,
    /// Display name.
    pub name: String,
    /// Path; defaults to the name.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub path: Option<String>,
    /// Visibility; private when absent.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub visibility: Option<Visibility>,
    /// Projects in the group.
    #[serde(default)]
    pub projects: Vec<ProjectSpec>,
}

impl GroupSpec {
    /// The path as written in the spec, or the name when no path is given.
    #[must_use]
    pub fn declared_path(&self) -> &str {
        crate::naming::declared_identifier(&self.name, self.path.as_deref())
    }
}

/// A project under a group or an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectSpec {
    /// Naming mode override.
    #[serde(rename = "nameMode", default, deserialize_with = "empty_as_none")]
    pub naming_mode: Option<NamingMode>,
    /// Display name.
    pub name: String,
    /// Path; defaults to the name.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub path: Option<String>,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Visibility; private when absent.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub visibility: Option<Visibility>,
}

impl ProjectSpec {
    /// The path as written in the spec, or the name when no path is given.
    #[must_use]
    pub fn declared_path(&self) -> &str {
        crate::naming::declared_identifier(&self.name, self.path.as_deref())
    }
}

fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

impl SpecFile {
    /// Parse and validate a spec from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, SpecError> {
        let spec: SpecFile = serde_yaml::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Read, parse and validate a spec file.
    pub fn load(path: &Path) -> Result<Self, SpecError> {
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded spec file {}", path.display());
        Self::from_yaml(&text)
    }

    /// Check the rules serde cannot express.
    pub fn validate(&self) -> Result<(), SpecError> {
        for (i, user) in self.users.iter().enumerate() {
            let at = format!("users[{}]", i);
            if user.username.trim().is_empty() {
                return Err(SpecError::Invalid(format!("{}: username is empty", at)));
            }
            if user.email.trim().is_empty() {
                return Err(SpecError::Invalid(format!(
                    "{} ({}): email is empty",
                    at, user.username
                )));
            }
            if let Some(token) = &user.token {
                validate_scopes(&token.scopes)
                    .map_err(|e| SpecError::Invalid(format!("{}.token: {}", at, e)))?;
            }
            for (j, group) in user.groups.iter().enumerate() {
                if group.name.trim().is_empty() {
                    return Err(SpecError::Invalid(format!("{}.groups[{}]: name is empty", at, j)));
                }
                for (k, project) in group.projects.iter().enumerate() {
                    if project.name.trim().is_empty() {
                        return Err(SpecError::Invalid(format!(
                            "{}.groups[{}].projects[{}]: name is empty",
                            at, j, k
                        )));
                    }
                }
            }
            for (j, project) in user.projects.iter().enumerate() {
                if project.name.trim().is_empty() {
                    return Err(SpecError::Invalid(format!(
                        "{}.projects[{}]: name is empty",
                        at, j
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
users:
  - username: alice
    email: alice@example.com
    name: Alice
    password: s3cret-pass
    nameMode: name
    token:
      scope: [api, read_repository]
      expires_at: 2030-01-01
    groups:
      - name: Team
        path: team
        visibility: internal
        nameMode: prefix
        projects:
          - name: Proj
            path: proj
            description: demo
    projects:
      - name: personal
"#;

    #[test]
    fn test_parse_full_spec() {
        let spec = SpecFile::from_yaml(FULL).unwrap();
        assert_eq!(spec.users.len(), 1);

        let alice = &spec.users[0];
        assert_eq!(alice.naming_mode, Some(NamingMode::Name));
        assert_eq!(alice.effective_mode(), NamingMode::Name);

        let token = alice.token.as_ref().unwrap();
        assert_eq!(token.scopes, vec!["api", "read_repository"]);
        assert_eq!(token.expires_at, NaiveDate::from_ymd_opt(2030, 1, 1));

        let team = &alice.groups[0];
        assert_eq!(team.naming_mode, Some(NamingMode::Prefix));
        assert_eq!(team.visibility, Some(Visibility::Internal));
        assert_eq!(team.declared_path(), "team");
        assert_eq!(team.projects[0].description, "demo");

        assert_eq!(alice.projects[0].declared_path(), "personal");
        assert_eq!(alice.projects[0].visibility, None);
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let spec = SpecFile::from_yaml(
            r#"
users:
  - username: bob
    email: bob@example.com
    nameMode: ""
    token:
      scope: [api]
      expires_at: ""
    groups:
      - name: Ops
        path: ""
        visibility: ""
"#,
        )
        .unwrap();
        let bob = &spec.users[0];
        assert_eq!(bob.naming_mode, None);
        assert_eq!(bob.effective_mode(), NamingMode::Prefix);
        assert_eq!(bob.token.as_ref().unwrap().expires_at, None);
        assert_eq!(bob.groups[0].path, None);
        assert_eq!(bob.groups[0].declared_path(), "Ops");
        assert_eq!(bob.groups[0].visibility, None);
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let err = SpecFile::from_yaml(
            "users:\n  - username: a\n    email: a@example.com\n    nameMode: random\n",
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::Parse(_)));
    }

    #[test]
    fn test_unknown_visibility_rejected() {
        let err = SpecFile::from_yaml(
            "users:\n  - username: a\n    email: a@example.com\n    groups:\n      - name: g\n        visibility: secret\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("secret"));
    }

    #[test]
    fn test_empty_username_invalid() {
        let err = SpecFile::from_yaml("users:\n  - username: ''\n    email: a@example.com\n")
            .unwrap_err();
        assert!(matches!(err, SpecError::Invalid(_)));
    }

    #[test]
    fn test_bad_scope_invalid() {
        let err = SpecFile::from_yaml(
            "users:\n  - username: a\n    email: a@example.com\n    token:\n      scope: [API]\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("API"));
    }

    #[test]
    fn test_scope_with_digits_accepted() {
        let spec = SpecFile::from_yaml(
            "users:\n  - username: a\n    email: a@example.com\n    token:\n      scope: [k8s_proxy]\n",
        )
        .unwrap();
        let token = spec.users[0].token.as_ref().unwrap();
        assert_eq!(token.scopes, vec!["k8s_proxy"]);
    }

    #[test]
    fn test_empty_group_project_name_invalid() {
        let err = SpecFile::from_yaml(
            "users:\n  - username: a\n    email: a@example.com\n    groups:\n      - name: g\n        projects:\n          - name: ''\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("groups[0].projects[0]"));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            SpecFile::from_yaml("users: [unclosed").unwrap_err(),
            SpecError::Parse(_)
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let spec = SpecFile::load(file.path()).unwrap();
        assert_eq!(spec.users[0].username, "alice");
    }

    #[test]
    fn test_load_missing_file() {
        let err = SpecFile::load(Path::new("/nonexistent/spec.yaml")).unwrap_err();
        assert!(matches!(err, SpecError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/spec.yaml"));
    }

    #[test]
    fn test_bare_account() {
        let bare = AccountSpec::bare("carol");
        assert_eq!(bare.username, "carol");
        assert_eq!(bare.effective_mode(), NamingMode::Name);
        assert!(bare.groups.is_empty());
        assert!(bare.projects.is_empty());
    }
}
