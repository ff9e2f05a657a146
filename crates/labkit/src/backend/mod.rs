//! Gateway trait and implementations for talking to the platform.
//!
//! [`Gateway`] is the request/response façade the orchestrator consumes.
//! The production implementation is [`gitlab::GitLabBackend`]; [`MockGateway`]
//! keeps an in-memory platform for tests.
//!
//! # Testing
//!
//! ```
//! use labkit::backend::{Gateway, MockGateway};
//! use labkit::{NewGroup, Visibility};
//!
//! let mock = MockGateway::new();
//! assert!(mock.lookup_group("team").unwrap().is_none());
//!
//! let group = mock
//!     .create_group(
//!         "alice",
//!         &NewGroup { name: "Team".into(), path: "team".into(), visibility: Visibility::Private },
//!     )
//!     .unwrap();
//! assert_eq!(mock.lookup_group("team").unwrap().unwrap().id, group.id);
//! ```

pub mod gitlab;

use crate::error::{Error, Result};
use crate::types::{
    Account, AccountPage, Group, NewAccount, NewGroup, NewProject, NewToken, Project,
};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Synchronous façade over the platform API.
///
/// Lookups return `Ok(None)` when the resource does not exist and `Err` for
/// every other failure, so callers never mistake an outage for absence.
pub trait Gateway: Send + Sync {
    /// The user the API token belongs to.
    fn current_user(&self) -> Result<Account>;

    /// Find an account by exact username.
    fn lookup_account(&self, username: &str) -> Result<Option<Account>>;

    /// Create an account, skipping email confirmation.
    fn create_account(&self, request: &NewAccount) -> Result<Account>;

    /// Unblock an account.
    fn unblock_account(&self, account_id: u64) -> Result<()>;

    /// Approve an account pending admin approval.
    fn approve_account(&self, account_id: u64) -> Result<()>;

    /// Issue a personal access token, returning its secret value.
    fn create_token(&self, account_id: u64, request: &NewToken) -> Result<String>;

    /// Find a group by full path.
    fn lookup_group(&self, path: &str) -> Result<Option<Group>>;

    /// Create a group owned by `owner`.
    fn create_group(&self, owner: &str, request: &NewGroup) -> Result<Group>;

    /// Delete a group and everything in it.
    fn delete_group(&self, group_id: u64) -> Result<()>;

    /// Groups owned by `owner`.
    fn list_owned_groups(&self, owner: &str) -> Result<Vec<Group>>;

    /// Find a project by `<namespace>/<path>`.
    fn lookup_project(&self, full_path: &str) -> Result<Option<Project>>;

    /// Create a project on behalf of `owner`.
    fn create_project(&self, owner: &str, request: &NewProject) -> Result<Project>;

    /// Delete a project.
    fn delete_project(&self, project_id: u64) -> Result<()>;

    /// Delete an account.
    fn delete_account(&self, account_id: u64) -> Result<()>;

    /// One page of accounts matching `search` (substring match, not prefix).
    fn list_accounts(&self, search: Option<&str>, page: u32) -> Result<AccountPage>;

    /// Every account matching `search`, across all pages.
    fn list_all_accounts(&self, search: Option<&str>) -> Result<Vec<Account>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.list_accounts(search, page)?;
            all.extend(batch.accounts);
            match batch.next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        Ok(all)
    }
}

// =============================================================================
// Mock gateway
// =============================================================================

/// A gateway call, as recorded by [`MockGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `current_user`
    CurrentUser,
    /// `lookup_account(username)`
    LookupAccount(String),
    /// `create_account(username)`
    CreateAccount(String),
    /// `unblock_account(id)`
    UnblockAccount(u64),
    /// `approve_account(id)`
    ApproveAccount(u64),
    /// `create_token(account_id, name)`
    CreateToken(u64, String),
    /// `lookup_group(path)`
    LookupGroup(String),
    /// `create_group(path)`
    CreateGroup(String),
    /// `delete_group(id)`
    DeleteGroup(u64),
    /// `list_owned_groups(owner)`
    ListOwnedGroups(String),
    /// `lookup_project(full_path)`
    LookupProject(String),
    /// `create_project(full_path)`
    CreateProject(String),
    /// `delete_project(id)`
    DeleteProject(u64),
    /// `delete_account(id)`
    DeleteAccount(u64),
    /// `list_accounts(search, page)`
    ListAccounts(Option<String>, u32),
}

impl Call {
    /// Whether this call creates something on the platform.
    #[must_use]
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Self::CreateAccount(_) | Self::CreateGroup(_) | Self::CreateProject(_)
        )
    }
}

/// Gateway operations that [`MockGateway`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `current_user`
    CurrentUser,
    /// `lookup_account`
    LookupAccount,
    /// `create_account`
    CreateAccount,
    /// `unblock_account`
    UnblockAccount,
    /// `approve_account`
    ApproveAccount,
    /// `create_token`
    CreateToken,
    /// `lookup_group`
    LookupGroup,
    /// `create_group`
    CreateGroup,
    /// `delete_group`
    DeleteGroup,
    /// `list_owned_groups`
    ListOwnedGroups,
    /// `lookup_project`
    LookupProject,
    /// `create_project`
    CreateProject,
    /// `delete_project`
    DeleteProject,
    /// `delete_account`
    DeleteAccount,
    /// `list_accounts`
    ListAccounts,
}

const ANY_KEY: &str = "*";

#[derive(Debug)]
struct MockState {
    next_id: u64,
    current_user: Account,
    accounts: BTreeMap<String, Account>,
    groups: BTreeMap<String, (Group, String)>,
    projects: BTreeMap<String, Project>,
    sticky: HashSet<String>,
    failures: HashMap<(Op, String), String>,
    calls: Vec<Call>,
    page_size: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            next_id: 100,
            current_user: Account {
                id: 1,
                username: "root".to_string(),
                name: "Administrator".to_string(),
                email: Some("admin@example.com".to_string()),
                is_admin: true,
                state: Some("active".to_string()),
                created_at: None,
                web_url: None,
            },
            accounts: BTreeMap::new(),
            groups: BTreeMap::new(),
            projects: BTreeMap::new(),
            sticky: HashSet::new(),
            failures: HashMap::new(),
            calls: Vec::new(),
            page_size: 100,
        }
    }
}

impl MockState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, op: Op, key: &str) -> Result<()> {
        let message = self
            .failures
            .get(&(op, key.to_string()))
            .or_else(|| self.failures.get(&(op, ANY_KEY.to_string())));
        match message {
            Some(message) => Err(Error::api(500, message.clone())),
            None => Ok(()),
        }
    }
}

/// In-memory platform for tests.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect the other afterwards.
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    /// Create an empty platform whose token belongs to an admin.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the token owner.
    pub fn set_current_user(&self, account: Account) {
        self.state().current_user = account;
    }

    /// Seed an existing account.
    pub fn add_account(&self, account: Account) {
        self.state()
            .accounts
            .insert(account.username.to_ascii_lowercase(), account);
    }

    /// Seed an existing group owned by `owner`.
    pub fn add_group(&self, owner: &str, group: Group) {
        self.state()
            .groups
            .insert(group.full_path.clone(), (group, owner.to_string()));
    }

    /// Seed an existing project.
    pub fn add_project(&self, project: Project) {
        self.state()
            .projects
            .insert(project.path_with_namespace.clone(), project);
    }

    /// Make deletes of the resource at `key` (username, group path or project
    /// path) succeed without the resource ever disappearing.
    pub fn make_sticky(&self, key: &str) {
        self.state().sticky.insert(key.to_string());
    }

    /// Fail `op` for `key` (username, path, or numeric ID as a string).
    pub fn fail(&self, op: Op, key: &str, message: &str) {
        self.state()
            .failures
            .insert((op, key.to_string()), message.to_string());
    }

    /// Fail `op` for every key.
    pub fn fail_all(&self, op: Op, message: &str) {
        self.fail(op, ANY_KEY, message);
    }

    /// Stop failing `op` for every key.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Number of accounts returned per `list_accounts` page.
    pub fn set_page_size(&self, size: usize) {
        self.state().page_size = size.max(1);
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Number of create calls made so far.
    #[must_use]
    pub fn create_count(&self) -> usize {
        self.state().calls.iter().filter(|c| c.is_create()).count()
    }

    /// Whether an account with `username` currently exists.
    #[must_use]
    pub fn has_account(&self, username: &str) -> bool {
        self.state().accounts.contains_key(&username.to_ascii_lowercase())
    }

    /// Whether a group at `path` currently exists.
    #[must_use]
    pub fn has_group(&self, path: &str) -> bool {
        self.state().groups.contains_key(path)
    }

    /// Whether a project at `full_path` currently exists.
    #[must_use]
    pub fn has_project(&self, full_path: &str) -> bool {
        self.state().projects.contains_key(full_path)
    }
}

impl Gateway for MockGateway {
    fn current_user(&self) -> Result<Account> {
        let mut state = self.state();
        state.calls.push(Call::CurrentUser);
        state.check(Op::CurrentUser, ANY_KEY)?;
        Ok(state.current_user.clone())
    }

    fn lookup_account(&self, username: &str) -> Result<Option<Account>> {
        let mut state = self.state();
        state.calls.push(Call::LookupAccount(username.to_string()));
        state.check(Op::LookupAccount, username)?;
        Ok(state.accounts.get(&username.to_ascii_lowercase()).cloned())
    }

    fn create_account(&self, request: &NewAccount) -> Result<Account> {
        let mut state = self.state();
        state
            .calls
            .push(Call::CreateAccount(request.username.clone()));
        state.check(Op::CreateAccount, &request.username)?;
        if state.accounts.contains_key(&request.username.to_ascii_lowercase()) {
            return Err(Error::api(409, "Username has already been taken"));
        }
        let account = Account {
            id: state.allocate_id(),
            username: request.username.clone(),
            name: request.name.clone(),
            email: Some(request.email.clone()),
            is_admin: false,
            state: Some("active".to_string()),
            created_at: Some(Utc::now()),
            web_url: None,
        };
        state
            .accounts
            .insert(account.username.to_ascii_lowercase(), account.clone());
        Ok(account)
    }

    fn unblock_account(&self, account_id: u64) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::UnblockAccount(account_id));
        state.check(Op::UnblockAccount, &account_id.to_string())
    }

    fn approve_account(&self, account_id: u64) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::ApproveAccount(account_id));
        state.check(Op::ApproveAccount, &account_id.to_string())
    }

    fn create_token(&self, account_id: u64, request: &NewToken) -> Result<String> {
        let mut state = self.state();
        state
            .calls
            .push(Call::CreateToken(account_id, request.name.clone()));
        state.check(Op::CreateToken, &account_id.to_string())?;
        Ok(format!("glpat-mock-{}", account_id))
    }

    fn lookup_group(&self, path: &str) -> Result<Option<Group>> {
        let mut state = self.state();
        state.calls.push(Call::LookupGroup(path.to_string()));
        state.check(Op::LookupGroup, path)?;
        Ok(state.groups.get(path).map(|(group, _)| group.clone()))
    }

    fn create_group(&self, owner: &str, request: &NewGroup) -> Result<Group> {
        let mut state = self.state();
        state.calls.push(Call::CreateGroup(request.path.clone()));
        state.check(Op::CreateGroup, &request.path)?;
        if state.groups.contains_key(&request.path) {
            return Err(Error::api(400, "Failed to save group {:path=>[\"has already been taken\"]}"));
        }
        let group = Group {
            id: state.allocate_id(),
            name: request.name.clone(),
            path: request.path.clone(),
            full_path: request.path.clone(),
            web_url: Some(format!("https://gitlab.example.com/groups/{}", request.path)),
        };
        state
            .groups
            .insert(group.full_path.clone(), (group.clone(), owner.to_string()));
        Ok(group)
    }

    fn delete_group(&self, group_id: u64) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteGroup(group_id));
        state.check(Op::DeleteGroup, &group_id.to_string())?;
        let path = state
            .groups
            .values()
            .find(|(group, _)| group.id == group_id)
            .map(|(group, _)| group.full_path.clone())
            .ok_or_else(|| Error::api(404, "404 Group Not Found"))?;
        if !state.sticky.contains(&path) {
            state.groups.remove(&path);
            let prefix = format!("{}/", path);
            state.projects.retain(|full, _| !full.starts_with(&prefix));
        }
        Ok(())
    }

    fn list_owned_groups(&self, owner: &str) -> Result<Vec<Group>> {
        let mut state = self.state();
        state.calls.push(Call::ListOwnedGroups(owner.to_string()));
        state.check(Op::ListOwnedGroups, owner)?;
        Ok(state
            .groups
            .values()
            .filter(|(_, group_owner)| group_owner == owner)
            .map(|(group, _)| group.clone())
            .collect())
    }

    fn lookup_project(&self, full_path: &str) -> Result<Option<Project>> {
        let mut state = self.state();
        state.calls.push(Call::LookupProject(full_path.to_string()));
        state.check(Op::LookupProject, full_path)?;
        Ok(state.projects.get(full_path).cloned())
    }

    fn create_project(&self, _owner: &str, request: &NewProject) -> Result<Project> {
        let full_path = request.full_path();
        let mut state = self.state();
        state.calls.push(Call::CreateProject(full_path.clone()));
        state.check(Op::CreateProject, &full_path)?;
        if state.projects.contains_key(&full_path) {
            return Err(Error::api(400, "Failed to save project {:path=>[\"has already been taken\"]}"));
        }
        let project = Project {
            id: state.allocate_id(),
            name: request.name.clone(),
            path: request.path.clone(),
            path_with_namespace: full_path.clone(),
            web_url: Some(format!("https://gitlab.example.com/{}", full_path)),
        };
        state.projects.insert(full_path, project.clone());
        Ok(project)
    }

    fn delete_project(&self, project_id: u64) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteProject(project_id));
        state.check(Op::DeleteProject, &project_id.to_string())?;
        let path = state
            .projects
            .values()
            .find(|project| project.id == project_id)
            .map(|project| project.path_with_namespace.clone())
            .ok_or_else(|| Error::api(404, "404 Project Not Found"))?;
        if !state.sticky.contains(&path) {
            state.projects.remove(&path);
        }
        Ok(())
    }

    fn delete_account(&self, account_id: u64) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::DeleteAccount(account_id));
        state.check(Op::DeleteAccount, &account_id.to_string())?;
        let (key, username) = state
            .accounts
            .iter()
            .find(|(_, account)| account.id == account_id)
            .map(|(key, account)| (key.clone(), account.username.clone()))
            .ok_or_else(|| Error::api(404, "404 User Not Found"))?;
        if !state.sticky.contains(&username) {
            state.accounts.remove(&key);
            let prefix = format!("{}/", username);
            state.projects.retain(|full, _| !full.starts_with(&prefix));
        }
        Ok(())
    }

    fn list_accounts(&self, search: Option<&str>, page: u32) -> Result<AccountPage> {
        let mut state = self.state();
        state
            .calls
            .push(Call::ListAccounts(search.map(str::to_string), page));
        state.check(Op::ListAccounts, search.unwrap_or(ANY_KEY))?;

        let matching: Vec<Account> = state
            .accounts
            .values()
            .filter(|account| search.is_none_or(|term| account.username.contains(term)))
            .cloned()
            .collect();

        let size = state.page_size;
        let start = (page.max(1) as usize - 1) * size;
        let accounts: Vec<Account> = matching.iter().skip(start).take(size).cloned().collect();
        let next_page = (start + size < matching.len()).then_some(page.max(1) + 1);
        Ok(AccountPage {
            accounts,
            next_page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProjectNamespace, Visibility};

    fn account(id: u64, username: &str) -> Account {
        Account {
            id,
            username: username.to_string(),
            name: username.to_string(),
            email: None,
            is_admin: false,
            state: None,
            created_at: None,
            web_url: None,
        }
    }

    #[test]
    fn test_mock_lookup_absent_is_none() {
        let mock = MockGateway::new();
        assert!(mock.lookup_account("nobody").unwrap().is_none());
        assert!(mock.lookup_group("nowhere").unwrap().is_none());
        assert!(mock.lookup_project("no/where").unwrap().is_none());
    }

    #[test]
    fn test_mock_create_account_then_lookup() {
        let mock = MockGateway::new();
        let created = mock
            .create_account(&NewAccount {
                username: "alice".into(),
                email: "alice@example.com".into(),
                name: "Alice".into(),
                password: "pw".into(),
            })
            .unwrap();
        let found = mock.lookup_account("alice").unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.created_at.is_some());
        assert_eq!(mock.create_count(), 1);
    }

    #[test]
    fn test_mock_account_lookup_ignores_case() {
        let mock = MockGateway::new();
        mock.add_account(account(5, "Alice"));
        assert_eq!(mock.lookup_account("alice").unwrap().unwrap().id, 5);
        assert_eq!(mock.lookup_account("ALICE").unwrap().unwrap().username, "Alice");
        assert!(mock.has_account("alice"));

        let err = mock
            .create_account(&NewAccount {
                username: "alice".into(),
                email: "alice@example.com".into(),
                name: "Alice".into(),
                password: "pw".into(),
            })
            .unwrap_err();
        assert_eq!(err.status(), Some(409));

        mock.delete_account(5).unwrap();
        assert!(mock.lookup_account("Alice").unwrap().is_none());
    }

    #[test]
    fn test_mock_duplicate_account_rejected() {
        let mock = MockGateway::new();
        mock.add_account(account(5, "alice"));
        let err = mock
            .create_account(&NewAccount {
                username: "alice".into(),
                email: "a@example.com".into(),
                name: "A".into(),
                password: "pw".into(),
            })
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
    }

    #[test]
    fn test_mock_failure_injection() {
        let mock = MockGateway::new();
        mock.fail(Op::LookupGroup, "team", "boom");
        assert!(mock.lookup_group("team").is_err());
        assert!(mock.lookup_group("other").is_ok());

        mock.fail_all(Op::LookupAccount, "down");
        assert!(mock.lookup_account("anyone").is_err());

        mock.clear_failures();
        assert!(mock.lookup_account("anyone").is_ok());
    }

    #[test]
    fn test_mock_delete_group_removes_projects() {
        let mock = MockGateway::new();
        let group = mock
            .create_group(
                "alice",
                &NewGroup {
                    name: "Team".into(),
                    path: "team".into(),
                    visibility: Visibility::Private,
                },
            )
            .unwrap();
        mock.create_project(
            "alice",
            &NewProject {
                namespace: ProjectNamespace::Group(group.id),
                namespace_path: "team".into(),
                name: "Proj".into(),
                path: "proj".into(),
                description: String::new(),
                visibility: Visibility::Private,
            },
        )
        .unwrap();
        assert!(mock.has_project("team/proj"));

        mock.delete_group(group.id).unwrap();
        assert!(!mock.has_group("team"));
        assert!(!mock.has_project("team/proj"));
    }

    #[test]
    fn test_mock_sticky_group_survives_delete() {
        let mock = MockGateway::new();
        let group = mock
            .create_group(
                "alice",
                &NewGroup {
                    name: "Team".into(),
                    path: "team".into(),
                    visibility: Visibility::Private,
                },
            )
            .unwrap();
        mock.make_sticky("team");
        mock.delete_group(group.id).unwrap();
        assert!(mock.has_group("team"));
    }

    #[test]
    fn test_mock_list_owned_groups() {
        let mock = MockGateway::new();
        for (owner, path) in [("alice", "a1"), ("alice", "a2"), ("bob", "b1")] {
            mock.create_group(
                owner,
                &NewGroup {
                    name: path.into(),
                    path: path.into(),
                    visibility: Visibility::Private,
                },
            )
            .unwrap();
        }
        let owned = mock.list_owned_groups("alice").unwrap();
        assert_eq!(owned.len(), 2);
    }

    #[test]
    fn test_list_all_accounts_walks_pages() {
        let mock = MockGateway::new();
        mock.set_page_size(2);
        for (id, name) in [(1, "qa-a"), (2, "qa-b"), (3, "qa-c"), (4, "dev-a"), (5, "qa-d")] {
            mock.add_account(account(id, name));
        }

        let all = mock.list_all_accounts(Some("qa")).unwrap();
        assert_eq!(all.len(), 4);

        let pages: Vec<u32> = mock
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::ListAccounts(_, page) => Some(*page),
                _ => None,
            })
            .collect();
        assert_eq!(pages, vec![1, 2]);
    }
}
