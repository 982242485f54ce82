//! Domain errors for the SSO engine.

use sso_engine_sdk::SsoError;

/// Internal domain errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("ticket '{0}' not recognized")]
    TicketNotFound(String),

    #[error("ticket '{0}' has expired")]
    TicketExpired(String),

    #[error("ticket '{0}' has already been used")]
    TicketAlreadyConsumed(String),

    #[error("ticket '{ticket}' does not match supplied service '{service}'")]
    ServiceMismatch { ticket: String, service: String },

    #[error("service '{0}' is not authorized to use single sign-on")]
    UnauthorizedService(String),

    #[error("'{delegate}' is not authorized to impersonate '{target}'")]
    SurrogateNotAuthorized { delegate: String, target: String },

    #[error("surrogate target '{0}' is unknown")]
    UnknownSurrogateTarget(String),

    #[error("invalid grant: {0}")]
    InvalidGrant(String),

    #[error("invalid client: {0}")]
    InvalidClient(String),

    #[error("acceptable usage policy not accepted by '{0}'")]
    PolicyNotAccepted(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("multifactor authentication failed for '{0}'")]
    MultifactorFailed(String),

    #[error("login flow '{0}' not found")]
    FlowNotFound(String),

    #[error("login flow is in state {actual}, expected {expected}")]
    InvalidFlowState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("collaborator failed: {0}")]
    Collaborator(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant(message.into())
    }

    pub fn invalid_client(client_id: impl Into<String>) -> Self {
        Self::InvalidClient(client_id.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Ticket lifecycle failures surfaced by validation.
    #[must_use]
    pub fn is_ticket_failure(&self) -> bool {
        matches!(
            self,
            Self::TicketNotFound(_)
                | Self::TicketExpired(_)
                | Self::TicketAlreadyConsumed(_)
                | Self::ServiceMismatch { .. }
        )
    }
}

impl From<SsoError> for DomainError {
    fn from(e: SsoError) -> Self {
        match e {
            SsoError::TicketNotFound(t) => Self::TicketNotFound(t),
            SsoError::TicketExpired(t) => Self::TicketExpired(t),
            SsoError::TicketAlreadyConsumed(t) => Self::TicketAlreadyConsumed(t),
            SsoError::ServiceMismatch { ticket, service } => {
                Self::ServiceMismatch { ticket, service }
            }
            SsoError::SurrogateNotAuthorized { delegate, target } => {
                Self::SurrogateNotAuthorized { delegate, target }
            }
            SsoError::UnknownSurrogateTarget(t) => Self::UnknownSurrogateTarget(t),
            SsoError::InvalidGrant(m) => Self::InvalidGrant(m),
            SsoError::InvalidClient(m) => Self::InvalidClient(m),
            SsoError::PolicyNotAccepted(p) => Self::PolicyNotAccepted(p),
            SsoError::AuthenticationFailed(m) => Self::AuthenticationFailed(m),
            SsoError::CollaboratorUnavailable(m) => Self::Collaborator(m),
            SsoError::StorageUnavailable(m) => Self::StorageUnavailable(m),
            SsoError::Internal(m) => Self::Internal(m),
        }
    }
}

impl From<DomainError> for SsoError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::TicketNotFound(t) => Self::TicketNotFound(t),
            DomainError::TicketExpired(t) => Self::TicketExpired(t),
            DomainError::TicketAlreadyConsumed(t) => Self::TicketAlreadyConsumed(t),
            DomainError::ServiceMismatch { ticket, service } => {
                Self::ServiceMismatch { ticket, service }
            }
            DomainError::SurrogateNotAuthorized { delegate, target } => {
                Self::SurrogateNotAuthorized { delegate, target }
            }
            DomainError::UnknownSurrogateTarget(t) => Self::UnknownSurrogateTarget(t),
            DomainError::InvalidGrant(m) => Self::InvalidGrant(m),
            DomainError::InvalidClient(m) => Self::InvalidClient(m),
            DomainError::PolicyNotAccepted(p) => Self::PolicyNotAccepted(p),
            DomainError::AuthenticationFailed(m) => Self::AuthenticationFailed(m),
            DomainError::MultifactorFailed(p) => {
                Self::AuthenticationFailed(format!("second factor rejected for '{p}'"))
            }
            DomainError::Collaborator(m) => Self::CollaboratorUnavailable(m),
            DomainError::StorageUnavailable(m) => Self::StorageUnavailable(m),
            e @ (DomainError::UnauthorizedService(_)
            | DomainError::FlowNotFound(_)
            | DomainError::InvalidFlowState { .. }
            | DomainError::Validation(_)
            | DomainError::Internal(_)) => Self::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn ticket_errors_survive_sdk_round_trip() {
        let err = DomainError::TicketAlreadyConsumed("ST-1".to_owned());
        let sdk: SsoError = err.clone().into();
        assert_eq!(sdk.code(), "TICKET_ALREADY_CONSUMED");
        assert_eq!(DomainError::from(sdk), err);
    }

    #[test]
    fn collaborator_failures_map_to_unavailable() {
        let sdk: SsoError = DomainError::Collaborator("aup down".to_owned()).into();
        assert!(matches!(sdk, SsoError::CollaboratorUnavailable(_)));
    }
}
