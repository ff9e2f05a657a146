//! Create path: ensure every resource in the spec exists.
//!
//! "Ensure" means look up first and create only when the lookup reports the
//! resource absent. An existing resource is reused as-is, even if its
//! attributes differ from the spec. A failed lookup is treated as a failure
//! of that resource, never as absence.

use super::Orchestrator;
use crate::error::{Error, Result};
use crate::naming::{
    default_visibility, resolve_email, resolve_identifier, resolve_token_expiry, token_name,
    validate_scopes, IdentifierKind, NamingMode,
};
use crate::observer::{Event, Resource};
use crate::report::{AccountResult, GroupResult, ProjectResult, TokenResult};
use crate::spec::{AccountSpec, GroupSpec, ProjectSpec, SpecFile, TokenSpec};
use labkit::{Account, Group, NewAccount, NewGroup, NewProject, NewToken, Project, ProjectNamespace, Visibility};

impl Orchestrator {
    /// Provision every account in `spec`, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first account whose lookup or creation fails.
    pub fn create_all(&self, spec: &SpecFile) -> Result<Vec<AccountResult>> {
        let total = spec.users.len();
        let mut results = Vec::with_capacity(total);
        for (i, account) in spec.users.iter().enumerate() {
            log::info!("processing account [{}/{}]: {}", i + 1, total, account.username);
            results.push(self.create_account(account)?);
        }
        Ok(results)
    }

    /// Provision one account and everything under it.
    ///
    /// Token, group and project failures are reported to the observer and
    /// leave the failed piece out of the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AccountLookup`] or [`Error::AccountCreation`] when the
    /// account itself cannot be ensured.
    pub fn create_account(&self, spec: &AccountSpec) -> Result<AccountResult> {
        let now = self.clock.now();
        let mode = spec.effective_mode();
        let username =
            resolve_identifier(mode, IdentifierKind::Username, &spec.username, None, now);
        let email = resolve_email(mode, &spec.email, now);
        log::debug!("account {} resolves to {} <{}> ({} mode)", spec.username, username, email, mode);

        let account = self.ensure_account(spec, &username, &email)?;

        let token = spec
            .token
            .as_ref()
            .and_then(|token| self.issue_token(&account, token));

        let groups = spec
            .groups
            .iter()
            .filter_map(|group| self.create_group(&account.username, group, mode))
            .collect();

        let projects = spec
            .projects
            .iter()
            .filter_map(|project| {
                self.create_project(
                    &account.username,
                    ProjectNamespace::User(account.id),
                    &account.username,
                    project,
                    mode,
                )
            })
            .collect();

        Ok(AccountResult {
            username: account.username.clone(),
            email,
            name: spec.name.clone(),
            user_id: account.id,
            password: spec.password.clone(),
            token,
            groups,
            projects,
        })
    }

    fn ensure_account(&self, spec: &AccountSpec, username: &str, email: &str) -> Result<Account> {
        let existing = self
            .gateway
            .lookup_account(username)
            .map_err(|source| Error::AccountLookup {
                username: username.to_string(),
                source,
            })?;

        if let Some(account) = existing {
            self.emit(Event::Reused {
                resource: Resource::Account,
                path: account.username.clone(),
                id: account.id,
            });
            return Ok(account);
        }

        let request = NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            name: spec.name.clone(),
            password: spec.password.clone(),
        };
        let account = self
            .gateway
            .create_account(&request)
            .map_err(|source| Error::AccountCreation {
                username: username.to_string(),
                source,
            })?;
        self.emit(Event::Created {
            resource: Resource::Account,
            path: account.username.clone(),
            id: account.id,
        });

        self.activate(&account);
        Ok(account)
    }

    /// New accounts may start blocked or pending approval; both are best effort.
    fn activate(&self, account: &Account) {
        if let Err(e) = self.gateway.unblock_account(account.id) {
            self.emit(Event::ActivationFailed {
                username: account.username.clone(),
                action: "unblock",
                message: e.to_string(),
            });
        }
        if let Err(e) = self.gateway.approve_account(account.id) {
            self.emit(Event::ActivationFailed {
                username: account.username.clone(),
                action: "approve",
                message: e.to_string(),
            });
        }
    }

    fn issue_token(&self, account: &Account, spec: &TokenSpec) -> Option<TokenResult> {
        match self.try_issue_token(account, spec) {
            Ok(token) => Some(token),
            Err(e) => {
                self.emit(Event::CreateFailed {
                    resource: Resource::Token,
                    path: account.username.clone(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    fn try_issue_token(&self, account: &Account, spec: &TokenSpec) -> Result<TokenResult> {
        validate_scopes(&spec.scopes)?;

        let expires_at = resolve_token_expiry(spec.expires_at, self.clock.today());
        let request = NewToken {
            name: token_name(&account.username, self.clock.now()),
            scopes: spec.scopes.clone(),
            expires_at,
        };
        let value = self.gateway.create_token(account.id, &request)?;
        self.emit(Event::TokenIssued {
            username: account.username.clone(),
            name: request.name,
            expires_at,
        });

        Ok(TokenResult {
            value,
            scopes: request.scopes,
            expires_at,
        })
    }

    fn create_group(&self, owner: &str, spec: &GroupSpec, parent_mode: NamingMode) -> Option<GroupResult> {
        let mode = parent_mode.for_child(spec.naming_mode);
        let path = resolve_identifier(
            mode,
            IdentifierKind::Path,
            &spec.name,
            spec.path.as_deref(),
            self.clock.now(),
        );
        let visibility = default_visibility(spec.visibility);

        let request = NewGroup {
            name: spec.name.clone(),
            path: path.clone(),
            visibility,
        };
        let group = match self.ensure_group(owner, &request) {
            Ok(group) => group,
            Err(e) => {
                self.emit(Event::CreateFailed {
                    resource: Resource::Group,
                    path,
                    message: e.to_string(),
                });
                return None;
            }
        };

        let projects = spec
            .projects
            .iter()
            .filter_map(|project| {
                self.create_project(
                    owner,
                    ProjectNamespace::Group(group.id),
                    &group.full_path,
                    project,
                    mode,
                )
            })
            .collect();

        Some(GroupResult {
            name: spec.name.clone(),
            path: group.full_path,
            group_id: group.id,
            visibility,
            projects,
        })
    }

    /// Look up the group at `request.path`; create it for `owner` if absent.
    pub fn ensure_group(&self, owner: &str, request: &NewGroup) -> Result<Group> {
        if let Some(group) = self.gateway.lookup_group(&request.path)? {
            self.emit(Event::Reused {
                resource: Resource::Group,
                path: group.full_path.clone(),
                id: group.id,
            });
            return Ok(group);
        }

        let group = self.gateway.create_group(owner, request)?;
        self.emit(Event::Created {
            resource: Resource::Group,
            path: group.full_path.clone(),
            id: group.id,
        });
        Ok(group)
    }

    fn create_project(
        &self,
        owner: &str,
        namespace: ProjectNamespace,
        namespace_path: &str,
        spec: &ProjectSpec,
        parent_mode: NamingMode,
    ) -> Option<ProjectResult> {
        let mode = parent_mode.for_child(spec.naming_mode);
        let visibility: Visibility = default_visibility(spec.visibility);
        let request = NewProject {
            namespace,
            namespace_path: namespace_path.to_string(),
            name: spec.name.clone(),
            path: resolve_identifier(
                mode,
                IdentifierKind::Path,
                &spec.name,
                spec.path.as_deref(),
                self.clock.now(),
            ),
            description: spec.description.clone(),
            visibility,
        };

        match self.ensure_project(owner, &request) {
            Ok(project) => Some(ProjectResult {
                name: spec.name.clone(),
                path: project.path_with_namespace,
                project_id: project.id,
                description: spec.description.clone(),
                visibility,
                web_url: project.web_url,
            }),
            Err(e) => {
                self.emit(Event::CreateFailed {
                    resource: Resource::Project,
                    path: request.full_path(),
                    message: e.to_string(),
                });
                None
            }
        }
    }

    /// Look up the project at `<namespace_path>/<path>`; create it if absent.
    pub fn ensure_project(&self, owner: &str, request: &NewProject) -> Result<Project> {
        let full_path = request.full_path();
        if let Some(project) = self.gateway.lookup_project(&full_path)? {
            self.emit(Event::Reused {
                resource: Resource::Project,
                path: project.path_with_namespace.clone(),
                id: project.id,
            });
            return Ok(project);
        }

        let project = self.gateway.create_project(owner, request)?;
        self.emit(Event::Created {
            resource: Resource::Project,
            path: project.path_with_namespace.clone(),
            id: project.id,
        });
        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{account, harness, now};
    use super::*;
    use crate::observer::Severity;
    use chrono::NaiveDate;
    use labkit::{Call, Op};

    const ALICE: &str = r#"
users:
  - username: alice
    email: alice@example.com
    name: Alice
    password: s3cret-pass
    nameMode: name
    groups:
      - name: Team
        path: team
        projects:
          - name: Proj
            path: proj
"#;

    fn spec(yaml: &str) -> SpecFile {
        SpecFile::from_yaml(yaml).unwrap()
    }

    #[test]
    fn test_alice_team_proj_scenario() {
        let h = harness();
        let results = h.orchestrator.create_all(&spec(ALICE)).unwrap();

        assert_eq!(results.len(), 1);
        let alice = &results[0];
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.email, "alice@example.com");
        assert_eq!(alice.password, "s3cret-pass");
        assert_eq!(alice.groups.len(), 1);
        assert_eq!(alice.groups[0].path, "team");
        assert_eq!(alice.groups[0].visibility, Visibility::Private);
        assert_eq!(alice.groups[0].projects.len(), 1);
        assert_eq!(alice.groups[0].projects[0].path, "team/proj");
        assert_eq!(alice.groups[0].projects[0].visibility, Visibility::Private);
        assert!(alice.token.is_none());

        assert!(h.mock.has_account("alice"));
        assert!(h.mock.has_group("team"));
        assert!(h.mock.has_project("team/proj"));
    }

    #[test]
    fn test_second_run_creates_nothing() {
        let h = harness();
        let first = h.orchestrator.create_all(&spec(ALICE)).unwrap();
        assert_eq!(h.mock.create_count(), 3);

        h.mock.clear_calls();
        let second = h.orchestrator.create_all(&spec(ALICE)).unwrap();
        assert_eq!(h.mock.create_count(), 0);

        assert_eq!(first[0].user_id, second[0].user_id);
        assert_eq!(first[0].groups[0].group_id, second[0].groups[0].group_id);
        assert_eq!(
            first[0].groups[0].projects[0].project_id,
            second[0].groups[0].projects[0].project_id
        );
    }

    #[test]
    fn test_ensure_group_twice_creates_once() {
        let h = harness();
        let request = NewGroup {
            name: "Ops".into(),
            path: "ops".into(),
            visibility: Visibility::Internal,
        };
        let first = h.orchestrator.ensure_group("alice", &request).unwrap();
        let second = h.orchestrator.ensure_group("alice", &request).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(h.mock.create_count(), 1);
    }

    #[test]
    fn test_ensure_project_twice_creates_once() {
        let h = harness();
        let request = NewProject {
            namespace: ProjectNamespace::User(7),
            namespace_path: "alice".into(),
            name: "notes".into(),
            path: "notes".into(),
            description: String::new(),
            visibility: Visibility::Private,
        };
        let first = h.orchestrator.ensure_project("alice", &request).unwrap();
        let second = h.orchestrator.ensure_project("alice", &request).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(h.mock.create_count(), 1);
    }

    #[test]
    fn test_group_created_before_its_projects() {
        let h = harness();
        h.orchestrator
            .create_all(&spec(
                r#"
users:
  - username: alice
    email: alice@example.com
    nameMode: name
    groups:
      - name: g
        projects:
          - name: p1
          - name: p2
"#,
            ))
            .unwrap();

        let creates: Vec<Call> = h.mock.calls().into_iter().filter(Call::is_create).collect();
        assert_eq!(
            creates,
            vec![
                Call::CreateAccount("alice".into()),
                Call::CreateGroup("g".into()),
                Call::CreateProject("g/p1".into()),
                Call::CreateProject("g/p2".into()),
            ]
        );
    }

    #[test]
    fn test_prefix_mode_resolves_identifiers() {
        let h = harness();
        let results = h
            .orchestrator
            .create_all(&spec(
                r#"
users:
  - username: QA.Bot
    email: qa@example.org
    groups:
      - name: Team Alpha
        projects:
          - name: Demo
            nameMode: name
    projects:
      - name: Notes
"#,
            ))
            .unwrap();

        let ts = "20261017093000";
        let bot = &results[0];
        assert_eq!(bot.username, format!("qa.bot-{}", ts));
        assert_eq!(bot.email, format!("qa-{}@example.org", ts));
        assert_eq!(bot.groups[0].path, format!("teamalpha-{}", ts));
        assert_eq!(bot.groups[0].projects[0].path, format!("teamalpha-{}/Demo", ts));
        assert_eq!(bot.projects[0].path, format!("qa.bot-{}/notes-{}", ts, ts));
    }

    #[test]
    fn test_existing_account_reused() {
        let h = harness();
        h.mock.add_account(account(42, "alice", Some(30)));
        let result = h.orchestrator.create_account(&spec(ALICE).users[0]).unwrap();
        assert_eq!(result.user_id, 42);
        assert!(!h.mock.calls().contains(&Call::CreateAccount("alice".into())));
        assert!(h.observer.events().contains(&Event::Reused {
            resource: Resource::Account,
            path: "alice".into(),
            id: 42,
        }));
    }

    #[test]
    fn test_account_lookup_failure_aborts_without_creating() {
        let h = harness();
        h.mock.fail(Op::LookupAccount, "alice", "connection reset");
        let err = h.orchestrator.create_all(&spec(ALICE)).unwrap_err();
        assert!(matches!(err, Error::AccountLookup { .. }));
        assert_eq!(h.mock.create_count(), 0);
    }

    #[test]
    fn test_account_creation_failure_aborts() {
        let h = harness();
        h.mock.fail(Op::CreateAccount, "alice", "Email has already been taken");
        let err = h.orchestrator.create_all(&spec(ALICE)).unwrap_err();
        assert!(matches!(err, Error::AccountCreation { .. }));
        assert!(err.to_string().contains("Email has already been taken"));
        assert!(!h.mock.has_group("team"));
    }

    #[test]
    fn test_activation_failures_are_not_fatal() {
        let h = harness();
        h.mock.fail_all(Op::UnblockAccount, "already active");
        h.mock.fail_all(Op::ApproveAccount, "not pending");
        let result = h.orchestrator.create_all(&spec(ALICE)).unwrap();
        assert_eq!(result[0].groups.len(), 1);
        let warnings = h.observer.with_severity(Severity::Warn);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_token_default_expiry_and_name() {
        let h = harness();
        let results = h
            .orchestrator
            .create_all(&spec(
                "users:\n  - username: alice\n    email: a@example.com\n    nameMode: name\n    token:\n      scope: [api]\n",
            ))
            .unwrap();

        let token = results[0].token.as_ref().unwrap();
        assert_eq!(token.expires_at, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(token.scopes, vec!["api"]);
        let account_id = results[0].user_id;
        assert_eq!(token.value, format!("glpat-mock-{}", account_id));
        assert!(h.mock.calls().contains(&Call::CreateToken(
            account_id,
            format!("alice-token-{}", now().timestamp())
        )));
    }

    #[test]
    fn test_token_failure_keeps_going() {
        let h = harness();
        h.mock.fail_all(Op::CreateToken, "scope not allowed");
        let results = h
            .orchestrator
            .create_all(&spec(
                r#"
users:
  - username: alice
    email: a@example.com
    nameMode: name
    token:
      scope: [api]
    groups:
      - name: team
"#,
            ))
            .unwrap();
        assert!(results[0].token.is_none());
        assert_eq!(results[0].groups.len(), 1);
    }

    #[test]
    fn test_group_failure_skips_group_and_continues() {
        let h = harness();
        h.mock.fail(Op::CreateGroup, "broken", "path is reserved");
        let results = h
            .orchestrator
            .create_all(&spec(
                r#"
users:
  - username: alice
    email: a@example.com
    nameMode: name
    groups:
      - name: broken
        projects:
          - name: inside
      - name: fine
    projects:
      - name: mine
"#,
            ))
            .unwrap();

        let alice = &results[0];
        assert_eq!(alice.groups.len(), 1);
        assert_eq!(alice.groups[0].path, "fine");
        assert_eq!(alice.projects[0].path, "alice/mine");
        assert!(!h.mock.calls().contains(&Call::CreateProject("broken/inside".into())));
    }

    #[test]
    fn test_group_lookup_failure_is_not_absence() {
        let h = harness();
        h.mock.fail(Op::LookupGroup, "team", "timeout");
        let results = h.orchestrator.create_all(&spec(ALICE)).unwrap();
        assert!(results[0].groups.is_empty());
        assert!(!h.mock.calls().contains(&Call::CreateGroup("team".into())));
        assert!(h.observer.events().iter().any(|e| matches!(
            e,
            Event::CreateFailed { resource: Resource::Group, path, .. } if path == "team"
        )));
    }

    #[test]
    fn test_project_failure_omits_project() {
        let h = harness();
        h.mock.fail(Op::CreateProject, "team/proj", "quota exceeded");
        let results = h.orchestrator.create_all(&spec(ALICE)).unwrap();
        assert_eq!(results[0].groups.len(), 1);
        assert!(results[0].groups[0].projects.is_empty());
    }

    #[test]
    fn test_existing_group_reused_without_reconciling() {
        let h = harness();
        h.mock.add_group(
            "someone-else",
            Group {
                id: 9,
                name: "Team".into(),
                path: "team".into(),
                full_path: "team".into(),
                web_url: None,
            },
        );
        let results = h
            .orchestrator
            .create_all(&spec(
                r#"
users:
  - username: alice
    email: a@example.com
    nameMode: name
    groups:
      - name: Team
        path: team
        visibility: public
"#,
            ))
            .unwrap();
        assert_eq!(results[0].groups[0].group_id, 9);
        assert!(!h.mock.calls().contains(&Call::CreateGroup("team".into())));
    }
}
