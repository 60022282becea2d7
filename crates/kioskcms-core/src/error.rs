use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The provider refused the request; the message is shown to the user as-is.
    #[error("{0}")]
    Rejected(String),

    #[error("Unauthorized - session may be expired")]
    Unauthorized,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Auth backend not configured: {0}")]
    NotConfigured(String),

    #[error("Session storage error: {0}")]
    Session(String),

    #[error("Session supervisor is no longer running")]
    SupervisorStopped,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl AuthError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", cut, body.len())
        }
    }

    /// Pull the human-readable message out of an auth backend error body.
    /// The backend uses `error_description`, `msg` or `message` depending on the endpoint.
    fn provider_message(body: &str) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        ["error_description", "msg", "message"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            400 | 403 | 422 => AuthError::Rejected(
                Self::provider_message(body).unwrap_or_else(|| format!("Request rejected: {}", truncated)),
            ),
            401 => AuthError::Unauthorized,
            500..=599 => AuthError::ServerError(truncated),
            _ => AuthError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }
}
