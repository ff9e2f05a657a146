//! GitLab REST API v4 backend.
//!
//! This module provides the [`GitLabBackend`] implementation of
//! [`Gateway`](crate::backend::Gateway) over a blocking `ureq` agent.
//!
//! # Authentication
//!
//! Every request carries the admin token in the `PRIVATE-TOKEN` header.
//! Group creation, project creation and owned-group listing additionally send
//! `Sudo: <username>` so the resources belong to the provisioned user.

use crate::backend::Gateway;
use crate::error::{Error, Result};
use crate::types::{
    Account, AccountPage, Group, NewAccount, NewGroup, NewProject, NewToken, Project,
    ProjectNamespace,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use ureq::Body;
use ureq::http::Response;

/// Page size used for every listing call.
const PER_PAGE: &str = "100";

/// Global timeout applied to each request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest slice of a non-JSON error body kept in an error message.
const MAX_ERROR_BODY: usize = 200;

/// GitLab API backend.
///
/// # Example
///
/// ```no_run
/// use labkit::backend::gitlab::GitLabBackend;
/// use labkit::backend::Gateway;
///
/// let backend = GitLabBackend::new("https://gitlab.example.com", "glpat-xxxx");
/// let me = backend.current_user().unwrap();
/// println!("authenticated as {}", me.username);
/// ```
pub struct GitLabBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// `<base>/api/v4`.
    api_base: String,
    /// Admin personal access token.
    token: String,
}

impl GitLabBackend {
    /// Create a backend for the instance at `base_url`.
    #[must_use]
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(REQUEST_TIMEOUT))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            api_base: format!("{}/api/v4", base_url.trim_end_matches('/')),
            token: token.into(),
        }
    }

    /// Get the API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn get(&self, path: &str, query: &[(&str, &str)], sudo: Option<&str>) -> Result<Response<Body>> {
        let mut request = self
            .agent
            .get(&self.url(path))
            .header("PRIVATE-TOKEN", self.token.as_str())
            .header("Accept", "application/json")
            .header("User-Agent", "labseed");
        if let Some(user) = sudo {
            request = request.header("Sudo", user);
        }
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        log::debug!("GET {}", path);
        Ok(request.call()?)
    }

    fn post<B: Serialize>(&self, path: &str, body: &B, sudo: Option<&str>) -> Result<Response<Body>> {
        let mut request = self
            .agent
            .post(&self.url(path))
            .header("PRIVATE-TOKEN", self.token.as_str())
            .header("Accept", "application/json")
            .header("User-Agent", "labseed");
        if let Some(user) = sudo {
            request = request.header("Sudo", user);
        }
        log::debug!("POST {}", path);
        Ok(request.send_json(body)?)
    }

    fn post_empty(&self, path: &str) -> Result<Response<Body>> {
        log::debug!("POST {}", path);
        Ok(self
            .agent
            .post(&self.url(path))
            .header("PRIVATE-TOKEN", self.token.as_str())
            .header("User-Agent", "labseed")
            .send_empty()?)
    }

    fn delete(&self, path: &str) -> Result<Response<Body>> {
        log::debug!("DELETE {}", path);
        Ok(self
            .agent
            .delete(&self.url(path))
            .header("PRIVATE-TOKEN", self.token.as_str())
            .header("User-Agent", "labseed")
            .call()?)
    }

    /// Fetch a single resource, mapping 404 to `None`.
    fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self.get(path, &[], None)?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = ensure_success(response)?;
        read_json(response).map(Some)
    }

    /// Collect every page of a listing.
    fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        sudo: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1u32;
        loop {
            let page_str = page.to_string();
            let mut full_query = query.to_vec();
            full_query.push(("page", page_str.as_str()));
            full_query.push(("per_page", PER_PAGE));

            let response = ensure_success(self.get(path, &full_query, sudo)?)?;
            let next = next_page(&response);
            let batch: Vec<T> = read_json(response)?;
            items.extend(batch);

            match next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }
        Ok(items)
    }
}

impl Gateway for GitLabBackend {
    fn current_user(&self) -> Result<Account> {
        let response = ensure_success(self.get("/user", &[], None)?)?;
        read_json(response)
    }

    fn lookup_account(&self, username: &str) -> Result<Option<Account>> {
        let response = ensure_success(self.get("/users", &[("username", username)], None)?)?;
        let accounts: Vec<Account> = read_json(response)?;
        Ok(accounts
            .into_iter()
            .find(|account| account.username.eq_ignore_ascii_case(username)))
    }

    fn create_account(&self, request: &NewAccount) -> Result<Account> {
        let body = CreateUserBody {
            email: &request.email,
            username: &request.username,
            name: &request.name,
            password: &request.password,
            skip_confirmation: true,
        };
        let response = ensure_success(self.post("/users", &body, None)?)?;
        read_json(response)
    }

    fn unblock_account(&self, account_id: u64) -> Result<()> {
        ensure_success(self.post_empty(&format!("/users/{}/unblock", account_id))?)?;
        Ok(())
    }

    fn approve_account(&self, account_id: u64) -> Result<()> {
        ensure_success(self.post_empty(&format!("/users/{}/approve", account_id))?)?;
        Ok(())
    }

    fn create_token(&self, account_id: u64, request: &NewToken) -> Result<String> {
        let expires_at = request.expires_at.format("%Y-%m-%d").to_string();
        let body = CreateTokenBody {
            name: &request.name,
            scopes: &request.scopes,
            expires_at: &expires_at,
        };
        let path = format!("/users/{}/personal_access_tokens", account_id);
        let response = ensure_success(self.post(&path, &body, None)?)?;
        let token: TokenResponse = read_json(response)?;
        Ok(token.token)
    }

    fn lookup_group(&self, path: &str) -> Result<Option<Group>> {
        self.get_optional(&format!("/groups/{}", encode_path(path)))
    }

    fn create_group(&self, owner: &str, request: &NewGroup) -> Result<Group> {
        let body = CreateGroupBody {
            name: &request.name,
            path: &request.path,
            visibility: request.visibility.as_str(),
            request_access_enabled: false,
        };
        let response = ensure_success(self.post("/groups", &body, Some(owner))?)?;
        read_json(response)
    }

    fn delete_group(&self, group_id: u64) -> Result<()> {
        ensure_success(self.delete(&format!("/groups/{}", group_id))?)?;
        Ok(())
    }

    fn list_owned_groups(&self, owner: &str) -> Result<Vec<Group>> {
        self.get_all_pages("/groups", &[("owned", "true")], Some(owner))
    }

    fn lookup_project(&self, full_path: &str) -> Result<Option<Project>> {
        self.get_optional(&format!("/projects/{}", encode_path(full_path)))
    }

    fn create_project(&self, owner: &str, request: &NewProject) -> Result<Project> {
        // Omitting namespace_id places the project in the sudo user's namespace.
        let namespace_id = match request.namespace {
            ProjectNamespace::Group(id) => Some(id),
            ProjectNamespace::User(_) => None,
        };
        let body = CreateProjectBody {
            name: &request.name,
            path: &request.path,
            namespace_id,
            description: &request.description,
            visibility: request.visibility.as_str(),
            initialize_with_readme: true,
            issues_enabled: true,
            merge_requests_enabled: true,
            wiki_enabled: true,
        };
        let response = ensure_success(self.post("/projects", &body, Some(owner))?)?;
        read_json(response)
    }

    fn delete_project(&self, project_id: u64) -> Result<()> {
        ensure_success(self.delete(&format!("/projects/{}", project_id))?)?;
        Ok(())
    }

    fn delete_account(&self, account_id: u64) -> Result<()> {
        ensure_success(self.delete(&format!("/users/{}", account_id))?)?;
        Ok(())
    }

    fn list_accounts(&self, search: Option<&str>, page: u32) -> Result<AccountPage> {
        let page_str = page.to_string();
        let mut query = vec![("page", page_str.as_str()), ("per_page", PER_PAGE)];
        if let Some(term) = search.filter(|t| !t.is_empty()) {
            query.push(("search", term));
        }
        let response = ensure_success(self.get("/users", &query, None)?)?;
        let next_page = next_page(&response);
        let accounts = read_json(response)?;
        Ok(AccountPage {
            accounts,
            next_page,
        })
    }
}

// =============================================================================
// Response handling
// =============================================================================

fn ensure_success(mut response: Response<Body>) -> Result<Response<Body>> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(response);
    }
    let body = response.body_mut().read_to_string().unwrap_or_default();
    Err(Error::api(status, error_message(status, &body)))
}

fn read_json<T: DeserializeOwned>(mut response: Response<Body>) -> Result<T> {
    let body = response.body_mut().read_to_string()?;
    Ok(serde_json::from_str(&body)?)
}

fn next_page(response: &Response<Body>) -> Option<u32> {
    response
        .headers()
        .get("x-next-page")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Pull a human-readable message out of a GitLab error body.
///
/// GitLab answers with `{"message": "..."}`, `{"message": {"field": ["..."]}}`
/// or `{"error": "..."}` depending on the endpoint.
fn error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("message") {
            Some(serde_json::Value::String(message)) => return message.clone(),
            Some(serde_json::Value::Object(fields)) => {
                let parts: Vec<String> = fields
                    .iter()
                    .map(|(field, errors)| match errors {
                        serde_json::Value::Array(items) => {
                            let texts: Vec<String> = items
                                .iter()
                                .map(|item| item.as_str().map_or_else(|| item.to_string(), str::to_string))
                                .collect();
                            format!("{} {}", field, texts.join(", "))
                        }
                        other => format!("{} {}", field, other),
                    })
                    .collect();
                return parts.join("; ");
            }
            _ => {}
        }
        if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
            return error.to_string();
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status)
    } else {
        trimmed.chars().take(MAX_ERROR_BODY).collect()
    }
}

/// Percent-encode a namespace path for use as a single URL segment.
fn encode_path(path: &str) -> String {
    let mut encoded = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

// =============================================================================
// GitLab API request/response bodies
// =============================================================================

#[derive(Debug, Serialize)]
struct CreateUserBody<'a> {
    email: &'a str,
    username: &'a str,
    name: &'a str,
    password: &'a str,
    skip_confirmation: bool,
}

#[derive(Debug, Serialize)]
struct CreateTokenBody<'a> {
    name: &'a str,
    scopes: &'a [String],
    expires_at: &'a str,
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Serialize)]
struct CreateGroupBody<'a> {
    name: &'a str,
    path: &'a str,
    visibility: &'a str,
    request_access_enabled: bool,
}

#[derive(Debug, Serialize)]
struct CreateProjectBody<'a> {
    name: &'a str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace_id: Option<u64>,
    description: &'a str,
    visibility: &'a str,
    initialize_with_readme: bool,
    issues_enabled: bool,
    merge_requests_enabled: bool,
    wiki_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_strips_trailing_slash() {
        let backend = GitLabBackend::new("https://gitlab.example.com/", "t");
        assert_eq!(backend.api_base(), "https://gitlab.example.com/api/v4");
    }

    #[test]
    fn test_url_building() {
        let backend = GitLabBackend::new("http://localhost:8080", "t");
        assert_eq!(backend.url("/users"), "http://localhost:8080/api/v4/users");
    }

    #[test]
    fn test_encode_path() {
        assert_eq!(encode_path("team"), "team");
        assert_eq!(encode_path("team/proj"), "team%2Fproj");
        assert_eq!(encode_path("a b"), "a%20b");
        assert_eq!(encode_path("my_group.v2-x"), "my_group.v2-x");
    }

    #[test]
    fn test_error_message_string() {
        let msg = error_message(403, r#"{"message":"403 Forbidden"}"#);
        assert_eq!(msg, "403 Forbidden");
    }

    #[test]
    fn test_error_message_field_errors() {
        let msg = error_message(
            400,
            r#"{"message":{"username":["has already been taken"],"email":["is invalid"]}}"#,
        );
        assert!(msg.contains("username has already been taken"));
        assert!(msg.contains("email is invalid"));
    }

    #[test]
    fn test_error_message_error_key() {
        let msg = error_message(400, r#"{"error":"scopes does not have a valid value"}"#);
        assert_eq!(msg, "scopes does not have a valid value");
    }

    #[test]
    fn test_error_message_plain_and_empty() {
        assert_eq!(error_message(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(500, ""), "HTTP 500");
    }

    #[test]
    fn test_create_project_body_omits_namespace_for_user() {
        let body = CreateProjectBody {
            name: "p",
            path: "p",
            namespace_id: None,
            description: "",
            visibility: "private",
            initialize_with_readme: true,
            issues_enabled: true,
            merge_requests_enabled: true,
            wiki_enabled: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("namespace_id").is_none());
        assert_eq!(json["visibility"], "private");
    }
}
