//! Error types for the SSO engine.

use thiserror::Error;

/// Errors that can occur when using the SSO engine API.
///
/// Ticket lifecycle failures are kept distinct so relying services can tell
/// a replay attempt from an unknown or expired ticket.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SsoError {
    /// The ticket is unknown, was never issued, or was revoked by logout.
    #[error("ticket '{0}' not recognized")]
    TicketNotFound(String),

    /// The ticket outlived its expiration policy.
    #[error("ticket '{0}' has expired")]
    TicketExpired(String),

    /// The ticket was already redeemed once.
    #[error("ticket '{0}' has already been used")]
    TicketAlreadyConsumed(String),

    /// The ticket was issued for a different service.
    #[error("ticket '{ticket}' does not match supplied service '{service}'")]
    ServiceMismatch { ticket: String, service: String },

    /// The delegate may not act on behalf of the target principal.
    #[error("'{delegate}' is not authorized to impersonate '{target}'")]
    SurrogateNotAuthorized { delegate: String, target: String },

    /// The surrogate target principal could not be resolved.
    #[error("surrogate target '{0}' is unknown")]
    UnknownSurrogateTarget(String),

    /// The authorization grant is invalid, expired, consumed or mismatched.
    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    /// The OIDC client is unknown or failed to authenticate.
    #[error("invalid client: {0}")]
    InvalidClient(String),

    /// The principal has not accepted the acceptable usage policy.
    #[error("acceptable usage policy not accepted by '{0}'")]
    PolicyNotAccepted(String),

    /// Primary or secondary credentials were rejected.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A collaborator (plugin) could not answer.
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// The ticket store is unreachable. Not recoverable locally.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SsoError {
    /// Machine-readable failure code, stable across releases.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::TicketNotFound(_) => "INVALID_TICKET",
            Self::TicketExpired(_) => "TICKET_EXPIRED",
            Self::TicketAlreadyConsumed(_) => "TICKET_ALREADY_CONSUMED",
            Self::ServiceMismatch { .. } => "INVALID_SERVICE",
            Self::SurrogateNotAuthorized { .. } => "SURROGATE_NOT_AUTHORIZED",
            Self::UnknownSurrogateTarget(_) => "UNKNOWN_SURROGATE_TARGET",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::InvalidClient(_) => "invalid_client",
            Self::PolicyNotAccepted(_) => "POLICY_NOT_ACCEPTED",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::CollaboratorUnavailable(_) | Self::StorageUnavailable(_) | Self::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn ticket_failures_have_distinct_codes() {
        let codes = [
            SsoError::TicketNotFound("ST-1".to_owned()).code(),
            SsoError::TicketExpired("ST-1".to_owned()).code(),
            SsoError::TicketAlreadyConsumed("ST-1".to_owned()).code(),
            SsoError::ServiceMismatch {
                ticket: "ST-1".to_owned(),
                service: "https://a".to_owned(),
            }
            .code(),
        ];

        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn storage_faults_map_to_internal_error() {
        assert_eq!(
            SsoError::StorageUnavailable("down".to_owned()).code(),
            "INTERNAL_ERROR"
        );
    }
}
