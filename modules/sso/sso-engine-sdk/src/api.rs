//! Public API trait for the SSO engine.
//!
//! Relying services running in-process use this trait to redeem service
//! tickets. Out-of-process services use the `serviceValidate` HTTP endpoint,
//! which is backed by the same implementation.

use async_trait::async_trait;

use crate::error::SsoError;
use crate::models::ServiceValidation;

/// Public API trait for service ticket validation.
///
/// ```ignore
/// let validator: Arc<dyn ServiceTicketValidatorClient> = engine.validator_client();
///
/// match validator.validate(&ticket, "https://app.example.org").await {
///     Ok(validation) => grant(validation.user),
///     Err(SsoError::TicketAlreadyConsumed(_)) => audit_replay(),
///     Err(e) => reject(e.code()),
/// }
/// ```
#[async_trait]
pub trait ServiceTicketValidatorClient: Send + Sync {
    /// Redeem a service ticket for the given service.
    ///
    /// A ticket validates successfully at most once. Every later attempt
    /// fails with [`SsoError::TicketAlreadyConsumed`].
    ///
    /// # Errors
    ///
    /// - `TicketNotFound` if the ticket is unknown or was revoked by logout
    /// - `TicketAlreadyConsumed` if the ticket was already redeemed
    /// - `TicketExpired` if the ticket outlived its timeout
    /// - `ServiceMismatch` if the ticket was issued for another service
    /// - `StorageUnavailable` if the ticket store is not reachable
    async fn validate(&self, ticket: &str, service: &str)
    -> Result<ServiceValidation, SsoError>;
}
