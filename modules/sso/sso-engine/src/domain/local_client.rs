//! Local (in-process) client for service ticket validation.

use std::sync::Arc;

use async_trait::async_trait;
use sso_engine_sdk::{ServiceTicketValidatorClient, ServiceValidation, SsoError};

use super::DomainError;
use super::validator::ServiceTicketValidator;

/// Local client wrapping the validator.
///
/// Handed out by [`crate::SsoEngine::validator_client`].
pub struct SsoLocalClient {
    validator: Arc<ServiceTicketValidator>,
}

impl SsoLocalClient {
    #[must_use]
    pub fn new(validator: Arc<ServiceTicketValidator>) -> Self {
        Self { validator }
    }
}

fn log_and_convert(op: &str, e: DomainError) -> SsoError {
    if e.is_ticket_failure() {
        tracing::debug!(operation = op, error = %e, "sso_engine call rejected");
    } else {
        tracing::error!(operation = op, error = ?e, "sso_engine call failed");
    }
    e.into()
}

#[async_trait]
impl ServiceTicketValidatorClient for SsoLocalClient {
    async fn validate(&self, ticket: &str, service: &str) -> Result<ServiceValidation, SsoError> {
        self.validator
            .validate(ticket, service)
            .map_err(|e| log_and_convert("validate", e))
    }
}
