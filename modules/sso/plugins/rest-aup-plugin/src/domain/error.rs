use sso_engine_sdk::SsoError;
use thiserror::Error;

/// Failures talking to the policy service.
#[derive(Debug, Error)]
pub enum RestAupError {
    #[error("invalid policy endpoint '{0}'")]
    InvalidUrl(String),

    #[error("policy request failed: {0}")]
    Transport(String),

    #[error("policy request timed out after {0} ms")]
    Timeout(u64),

    #[error("policy service answered {0}")]
    UnexpectedStatus(u16),

    #[error("malformed policy response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<RestAupError> for SsoError {
    fn from(e: RestAupError) -> Self {
        SsoError::CollaboratorUnavailable(e.to_string())
    }
}
