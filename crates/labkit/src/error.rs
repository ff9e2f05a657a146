//! Error types for GitLab API operations.
//!
//! Errors are categorized so the CLI can attach advice to a failure. API
//! errors carry the message the platform sent back.

use std::fmt;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of gateway errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network-related or server-side errors.
    Network,
    /// Resource does not exist.
    NotFound,
    /// Resource already exists or is in a conflicting state.
    Conflict,
    /// Authentication or authorization failure.
    Permission,
    /// Request rejected as invalid.
    Validation,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::NotFound => "Resource not found",
            Self::Conflict => "Resource conflict",
            Self::Permission => "Permission denied",
            Self::Validation => "Request rejected",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check the GitLab URL and your connection, then try again",
            Self::NotFound => "Verify the username or path is correct",
            Self::Conflict => "The name or path is already taken; pick another or use prefix mode",
            Self::Permission => "Use an admin token with the api and sudo scopes",
            Self::Validation => "Check the values in the spec file against GitLab's rules",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to GitLab.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure (DNS, TLS, timeout, connection reset).
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// GitLab answered with a non-success status.
    #[error("GitLab API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the response body.
        message: String,
    },

    /// Response body could not be decoded.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// The token is valid but does not belong to an administrator.
    #[error("user '{username}' is not an administrator")]
    NotAdmin {
        /// Owner of the token.
        username: String,
    },
}

impl Error {
    /// Create an API error from a status code and remote message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// HTTP status associated with the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => *status,
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { .. } => ErrorCategory::Network,
            Error::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Permission,
                404 => ErrorCategory::NotFound,
                409 => ErrorCategory::Conflict,
                400 | 422 => ErrorCategory::Validation,
                429 | 500..=599 => ErrorCategory::Network,
                _ => ErrorCategory::Other,
            },
            Error::InvalidResponse(_) => ErrorCategory::Other,
            Error::NotAdmin { .. } => ErrorCategory::Permission,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {}", code),
                status: Some(code),
            },
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Network.to_string(), "Network connectivity issue");
        assert_eq!(ErrorCategory::Permission.to_string(), "Permission denied");
    }

    #[test]
    fn test_error_category_advice() {
        assert!(ErrorCategory::Permission.advice().contains("sudo"));
        assert!(!ErrorCategory::Network.advice().is_empty());
    }

    #[test]
    fn test_api_status_categories() {
        assert_eq!(Error::api(401, "401 Unauthorized").category(), ErrorCategory::Permission);
        assert_eq!(Error::api(403, "403 Forbidden").category(), ErrorCategory::Permission);
        assert_eq!(Error::api(404, "404 Not found").category(), ErrorCategory::NotFound);
        assert_eq!(Error::api(409, "has already been taken").category(), ErrorCategory::Conflict);
        assert_eq!(Error::api(400, "path is invalid").category(), ErrorCategory::Validation);
        assert_eq!(Error::api(502, "Bad Gateway").category(), ErrorCategory::Network);
        assert_eq!(Error::api(418, "teapot").category(), ErrorCategory::Other);
    }

    #[test]
    fn test_transport_error_is_network() {
        let err = Error::Http {
            message: "connection reset".into(),
            status: None,
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_api_error_display_keeps_remote_message() {
        let err = Error::api(400, "Email has already been taken");
        let display = err.to_string();
        assert!(display.contains("400"));
        assert!(display.contains("Email has already been taken"));
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_not_admin_is_permission() {
        let err = Error::NotAdmin {
            username: "dev".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Permission);
        assert!(err.to_string().contains("dev"));
    }
}
