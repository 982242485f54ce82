use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::error::DomainError;

const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// RFC 9457 problem document.
#[derive(Debug, Clone, Serialize)]
pub struct Problem {
    #[serde(rename = "type")]
    pub type_url: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    /// Machine-readable error code.
    pub code: String,
}

impl Problem {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            type_url: "about:blank".to_owned(),
            title: title.into(),
            status: status.as_u16(),
            detail: detail.into(),
            code: status
                .canonical_reason()
                .unwrap_or("Error")
                .to_uppercase()
                .replace(' ', "_"),
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match serde_json::to_vec(&self) {
            Ok(body) => {
                let headers = [(header::CONTENT_TYPE, PROBLEM_CONTENT_TYPE)];
                (status, headers, body).into_response()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize problem document");
                status.into_response()
            }
        }
    }
}

/// HTTP status, title and machine-readable code of a domain error.
#[must_use]
pub fn classify(err: &DomainError) -> (StatusCode, &'static str, &'static str) {
    match err {
        DomainError::TicketNotFound(_) => {
            (StatusCode::NOT_FOUND, "Ticket Not Found", "INVALID_TICKET")
        }
        DomainError::TicketExpired(_) => (StatusCode::GONE, "Ticket Expired", "TICKET_EXPIRED"),
        DomainError::TicketAlreadyConsumed(_) => (
            StatusCode::CONFLICT,
            "Ticket Already Consumed",
            "TICKET_ALREADY_CONSUMED",
        ),
        DomainError::ServiceMismatch { .. } => (
            StatusCode::BAD_REQUEST,
            "Service Mismatch",
            "INVALID_SERVICE",
        ),
        DomainError::UnauthorizedService(_) => (
            StatusCode::FORBIDDEN,
            "Unauthorized Service",
            "UNAUTHORIZED_SERVICE",
        ),
        DomainError::SurrogateNotAuthorized { .. } => (
            StatusCode::UNAUTHORIZED,
            "Surrogate Not Authorized",
            "SURROGATE_NOT_AUTHORIZED",
        ),
        DomainError::UnknownSurrogateTarget(_) => (
            StatusCode::UNAUTHORIZED,
            "Unknown Surrogate Target",
            "UNKNOWN_SURROGATE_TARGET",
        ),
        DomainError::InvalidGrant(_) => (StatusCode::BAD_REQUEST, "Invalid Grant", "invalid_grant"),
        DomainError::InvalidClient(_) => {
            (StatusCode::UNAUTHORIZED, "Invalid Client", "invalid_client")
        }
        DomainError::PolicyNotAccepted(_) => (
            StatusCode::FORBIDDEN,
            "Usage Policy Not Accepted",
            "POLICY_NOT_ACCEPTED",
        ),
        DomainError::AuthenticationFailed(_) => (
            StatusCode::UNAUTHORIZED,
            "Authentication Failed",
            "AUTHENTICATION_FAILED",
        ),
        DomainError::MultifactorFailed(_) => (
            StatusCode::UNAUTHORIZED,
            "Multifactor Authentication Failed",
            "MULTIFACTOR_FAILED",
        ),
        DomainError::FlowNotFound(_) => (
            StatusCode::NOT_FOUND,
            "Login Flow Not Found",
            "FLOW_NOT_FOUND",
        ),
        DomainError::InvalidFlowState { .. } => (
            StatusCode::CONFLICT,
            "Invalid Login Flow State",
            "INVALID_FLOW_STATE",
        ),
        DomainError::Validation(_) => (
            StatusCode::BAD_REQUEST,
            "Invalid Request",
            "INVALID_REQUEST",
        ),
        DomainError::Collaborator(_) => (
            StatusCode::BAD_GATEWAY,
            "Collaborator Unavailable",
            "COLLABORATOR_UNAVAILABLE",
        ),
        DomainError::StorageUnavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Storage Unavailable",
            "INTERNAL_ERROR",
        ),
        DomainError::Internal(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Error",
            "INTERNAL_ERROR",
        ),
    }
}

/// Convert domain errors to HTTP Problem responses
pub fn domain_error_to_problem(err: &DomainError) -> Problem {
    let (status, title, code) = classify(err);
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    }
    let detail = match err {
        DomainError::Internal(_) => "internal error".to_owned(),
        other => other.to_string(),
    };
    Problem::new(status, title, detail).with_code(code)
}

/// Implement Into<Problem> for `DomainError` so `?` works in handlers
impl From<DomainError> for Problem {
    fn from(e: DomainError) -> Self {
        domain_error_to_problem(&e)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn ticket_failures_keep_distinct_codes() {
        let codes: std::collections::HashSet<_> = [
            DomainError::TicketNotFound("x".to_owned()),
            DomainError::TicketExpired("x".to_owned()),
            DomainError::TicketAlreadyConsumed("x".to_owned()),
            DomainError::ServiceMismatch {
                ticket: "x".to_owned(),
                service: "y".to_owned(),
            },
        ]
        .iter()
        .map(|e| classify(e).2)
        .collect();
        assert_eq!(codes.len(), 4);
    }

    #[test]
    fn storage_failure_is_service_unavailable() {
        let p: Problem = DomainError::StorageUnavailable("down".to_owned()).into();
        assert_eq!(p.status, 503);
        assert_eq!(p.code, "INTERNAL_ERROR");
    }

    #[test]
    fn problem_uses_problem_json_content_type() {
        let resp = Problem::new(StatusCode::BAD_REQUEST, "Bad", "bad").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            PROBLEM_CONTENT_TYPE
        );
    }
}
