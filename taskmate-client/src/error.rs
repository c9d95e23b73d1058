use taskmate_core::FormError;
use thiserror::Error;

/// Everything an API call or a controller operation can fail with.
///
/// `Display` is the text shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No token, or the stored one has expired. Raised before any request.
    #[error("Authorization token is missing or expired")]
    Unauthorized,

    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("{0}")]
    Validation(String),

    /// 2xx response whose body isn't what the endpoint promises.
    #[error("unexpected response from server: {0}")]
    Decode(String),

    #[error("session storage error: {0}")]
    Session(String),
}

impl ApiError {
    /// Failures that mean the session is no longer usable.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized | ApiError::Rejected { status: 401, .. }
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<FormError> for ApiError {
    fn from(e: FormError) -> Self {
        ApiError::Validation(e.to_string())
    }
}
