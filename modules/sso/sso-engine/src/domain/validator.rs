use std::sync::Arc;

use sso_engine_sdk::ServiceValidation;
use tracing::{info, warn};

use crate::domain::error::DomainError;
use crate::domain::registry::TicketRegistry;
use crate::domain::services::ServiceRegistry;
use crate::domain::ticket::redact;

/// Redeems service tickets on behalf of relying services and applies the
/// service's attribute release policy to the result.
pub struct ServiceTicketValidator {
    registry: Arc<TicketRegistry>,
    services: Arc<ServiceRegistry>,
}

impl ServiceTicketValidator {
    pub fn new(registry: Arc<TicketRegistry>, services: Arc<ServiceRegistry>) -> Self {
        Self { registry, services }
    }

    #[tracing::instrument(skip_all, fields(ticket = %redact(ticket), service = %service))]
    pub fn validate(&self, ticket: &str, service: &str) -> Result<ServiceValidation, DomainError> {
        if ticket.trim().is_empty() || service.trim().is_empty() {
            return Err(DomainError::validation(
                "both 'ticket' and 'service' are required",
            ));
        }

        let validated = self.registry.validate_st(ticket, service).inspect_err(|e| {
            warn!(error = %e, "Service ticket validation failed");
        })?;

        let attributes = self
            .services
            .release_attributes(&validated.service, &validated.principal.attributes);
        info!(principal = %validated.principal.id, "Service ticket validated");
        Ok(ServiceValidation {
            user: validated.principal.id,
            attributes,
            service: validated.service,
            from_new_login: validated.from_new_login,
            authentication_date: validated.authentication_date,
        })
    }
}
