//! Client implementation for the static SSO plugin.
//!
//! Implements every collaborator trait of the engine using the domain service.

use async_trait::async_trait;
use sso_engine_sdk::{
    AupPluginClient, AupTerms, AuthenticatedPrincipal, Credential,
    CredentialResolverPluginClient, Principal, SecondFactorPluginClient, SsoError,
    SurrogateAuthorizationPluginClient,
};

use super::service::Service;

#[async_trait]
impl CredentialResolverPluginClient for Service {
    async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<AuthenticatedPrincipal, SsoError> {
        self.authenticate(credential)
            .ok_or_else(|| SsoError::AuthenticationFailed("invalid credentials".to_owned()))
    }

    async fn lookup(&self, username: &str) -> Result<Option<Principal>, SsoError> {
        Ok(Service::lookup(self, username))
    }
}

#[async_trait]
impl SecondFactorPluginClient for Service {
    async fn verify(
        &self,
        principal: &str,
        provider: &str,
        token: &str,
    ) -> Result<bool, SsoError> {
        Ok(self.verify_token(principal, provider, token))
    }
}

#[async_trait]
impl AupPluginClient for Service {
    async fn terms(&self, _principal: &Principal) -> Result<AupTerms, SsoError> {
        Ok(Service::terms(self))
    }

    async fn accept(&self, principal: &Principal) -> Result<(), SsoError> {
        Service::accept(self, &principal.id);
        Ok(())
    }

    async fn status(&self, principal: &Principal) -> Result<bool, SsoError> {
        Ok(self.accepted(&principal.id))
    }
}

#[async_trait]
impl SurrogateAuthorizationPluginClient for Service {
    async fn can_impersonate(&self, delegate: &str, target: &str) -> Result<bool, SsoError> {
        Ok(Service::can_impersonate(self, delegate, target))
    }
}
