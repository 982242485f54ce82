//! Plugin API traits for the external collaborators of the SSO engine.
//!
//! The engine never verifies passwords, one-time tokens, surrogate
//! authorizations or policy acceptance itself. It consumes a verdict from
//! these collaborators. Implementations live in plugin crates.

use async_trait::async_trait;

use crate::error::SsoError;
use crate::models::{AuthenticatedPrincipal, AupTerms, Credential, Principal};

/// Resolves primary credentials to principals.
#[async_trait]
pub trait CredentialResolverPluginClient: Send + Sync {
    /// Verify a primary credential.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed` if the credential is rejected
    /// - `CollaboratorUnavailable` if the backend cannot be reached
    async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<AuthenticatedPrincipal, SsoError>;

    /// Look up a principal without credentials (surrogate targets).
    ///
    /// Returns `None` if the principal is unknown.
    ///
    /// # Errors
    ///
    /// - `CollaboratorUnavailable` if the backend cannot be reached
    async fn lookup(&self, username: &str) -> Result<Option<Principal>, SsoError>;
}

/// Verifies second-factor tokens (OTP, scratch codes, hardware keys).
#[async_trait]
pub trait SecondFactorPluginClient: Send + Sync {
    /// Returns `true` if the token is valid for the principal and provider.
    ///
    /// # Errors
    ///
    /// - `CollaboratorUnavailable` if the backend cannot be reached
    async fn verify(&self, principal: &str, provider: &str, token: &str)
    -> Result<bool, SsoError>;
}

/// Acceptable usage policy store.
///
/// The engine reads and writes only the acceptance flag; terms are
/// displayed as supplied.
#[async_trait]
pub trait AupPluginClient: Send + Sync {
    /// Policy terms to display to the principal.
    async fn terms(&self, principal: &Principal) -> Result<AupTerms, SsoError>;

    /// Record that the principal accepted the policy.
    async fn accept(&self, principal: &Principal) -> Result<(), SsoError>;

    /// Whether the principal has accepted the policy. Safe to poll.
    async fn status(&self, principal: &Principal) -> Result<bool, SsoError>;
}

/// Surrogate authorization store.
#[async_trait]
pub trait SurrogateAuthorizationPluginClient: Send + Sync {
    /// Whether `delegate` may authenticate as `target`.
    async fn can_impersonate(&self, delegate: &str, target: &str) -> Result<bool, SsoError>;
}
