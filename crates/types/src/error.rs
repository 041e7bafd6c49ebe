//! Unified error type for the patchbot workspace.

use thiserror::Error;

/// Enumerates all error kinds that can occur across patchbot crates.
#[derive(Debug, Error)]
pub enum PatchbotError {
    /// The caller supplied invalid or incomplete credentials or configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The platform's token endpoint rejected the request.
    #[error("upstream auth error: status={status}, body={body}")]
    UpstreamAuth { status: u16, body: String },

    /// The anti-forgery `state` on a callback did not match the pending authorization.
    #[error("authorization state mismatch, possible CSRF attack")]
    StateMismatch,

    /// The manager holds no token for the platform.
    #[error("not connected to platform: {0}")]
    NotConnected(crate::PlatformId),

    /// The platform needs a refresh token and none was issued.
    #[error("no refresh token available for platform: {0}")]
    RefreshUnavailable(crate::PlatformId),

    /// The token endpoint answered with a body that is not a usable token.
    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    /// Authorization redirect or callback listener failure.
    #[error("authorization error: {0}")]
    Auth(String),

    /// HTTP transport error.
    #[error("http error: {0}")]
    Http(String),

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ── Feature-gated From impls ──────────────────────────────────────────────────

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for PatchbotError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl PatchbotError {
    /// Returns `true` if the error is likely transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamAuth { status, .. } => {
                matches!(status, 408 | 429 | 500..=599)
            }
            Self::Http(_) => true, // transport errors are retryable
            _ => false,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, PatchbotError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(status: u16) -> PatchbotError {
        PatchbotError::UpstreamAuth {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_error_display_configuration() {
        let err = PatchbotError::Configuration("client_id is empty".to_string());
        assert_eq!(err.to_string(), "configuration error: client_id is empty");
    }

    #[test]
    fn test_error_display_upstream() {
        let err = PatchbotError::UpstreamAuth {
            status: 401,
            body: "invalid_client".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains("401"));
        assert!(s.contains("invalid_client"));
    }

    #[test]
    fn test_error_display_not_connected() {
        let err = PatchbotError::NotConnected(crate::PlatformId::LinkedIn);
        assert!(err.to_string().contains("linkedin"));
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid {{{").unwrap_err();
        let err: PatchbotError = json_err.into();
        assert!(matches!(err, PatchbotError::Serialization(_)));
    }

    #[test]
    fn test_is_retryable_upstream() {
        for status in [408, 429, 500, 501, 502, 503, 504, 505, 507, 520, 527, 599] {
            assert!(upstream(status).is_retryable(), "{status} should retry");
        }
        for status in [400, 401, 403, 404, 600] {
            assert!(!upstream(status).is_retryable(), "{status} is fatal");
        }
    }

    #[test]
    fn test_is_retryable_http_transport() {
        assert!(PatchbotError::Http("connection refused".into()).is_retryable());
    }

    #[test]
    fn test_is_retryable_other_errors() {
        assert!(!PatchbotError::StateMismatch.is_retryable());
        assert!(!PatchbotError::Configuration("bad".into()).is_retryable());
        assert!(!PatchbotError::InvalidResponse("no token".into()).is_retryable());
    }
}
