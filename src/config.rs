//! Runtime configuration: credentials and the parsed GitLab endpoint.
//!
//! Everything comes from CLI flags or their environment fallbacks
//! (`GITLAB_URL`, `GITLAB_TOKEN`); there is no config file.

use crate::cli::ConnectionArgs;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("GitLab host is required (use --host or GITLAB_URL env)")]
    MissingHost,

    #[error("GitLab token is required (use --token or GITLAB_TOKEN env)")]
    MissingToken,
}

/// Resolved connection settings.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Base URL the API client talks to, path included.
    pub base_url: String,
    /// Scheme, host and port reported in the output document.
    pub endpoint: Endpoint,
    pub token: String,
}

impl Credentials {
    /// Validate the connection flags. Blank values count as missing.
    pub fn resolve(args: &ConnectionArgs) -> Result<Self, ConfigError> {
        let host = non_blank(args.host.as_deref()).ok_or(ConfigError::MissingHost)?;
        let token = non_blank(args.token.as_deref()).ok_or(ConfigError::MissingToken)?;
        Ok(Self {
            base_url: base_url(host),
            endpoint: Endpoint::parse(host),
            token: token.to_string(),
        })
    }
}

/// The host as given, minus trailing slashes. A bare host gets `https://`.
fn base_url(host: &str) -> String {
    let trimmed = host.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Split `host[:port]`, leaving a bracketed IPv6 literal intact.
fn split_port(authority: &str) -> (&str, Option<&str>) {
    let host_end = authority.rfind(']').map_or(0, |i| i + 1);
    match authority[host_end..].rfind(':') {
        Some(i) => (
            &authority[..host_end + i],
            Some(&authority[host_end + i + 1..]),
        ),
        None => (authority, None),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A GitLab base URL split into the parts the output document reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// `<scheme>://<host>`, with `:<port>` only when it is not the default.
    pub endpoint: String,
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// Parse `https://host[:port]`, `http://host[:port]` or a bare `host[:port]`.
    ///
    /// A bare host is treated as HTTPS. A port that does not parse is ignored.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_end_matches('/');
        let (scheme, rest) = if let Some(rest) = trimmed.strip_prefix("http://") {
            ("http", rest)
        } else if let Some(rest) = trimmed.strip_prefix("https://") {
            ("https", rest)
        } else {
            ("https", trimmed)
        };
        let default_port: u16 = if scheme == "http" { 80 } else { 443 };

        // Anything after the authority is not part of the endpoint
        let authority = rest.split('/').next().unwrap_or(rest);
        let (host, port) = match split_port(authority) {
            (host, Some(port)) => (host, port.parse().unwrap_or(default_port)),
            (host, None) => (host, default_port),
        };

        let endpoint = if port == default_port {
            format!("{}://{}", scheme, host)
        } else {
            format!("{}://{}:{}", scheme, host, port)
        };

        Self {
            endpoint,
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
        }
    }
}
