//! Fakes and builders shared by the domain unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use sso_engine_sdk::{
    AuthenticatedPrincipal, AupPluginClient, AupTerms, Credential, CredentialResolverPluginClient,
    Principal, SecondFactorPluginClient, SsoError, SurrogateAuthorizationPluginClient,
};
use time::macros::datetime;

use crate::domain::clock::ManualClock;
use crate::domain::expiration::ExpirationPolicy;
use crate::domain::ids::TicketIdGenerator;
use crate::domain::registry::TicketRegistry;
use crate::infra::storage::InMemoryTicketStore;

pub fn principal(id: &str) -> Principal {
    Principal::new(id)
}

pub fn registry_with_clock() -> (Arc<TicketRegistry>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(datetime!(2024-05-01 12:00 UTC)));
    let registry = TicketRegistry::new(
        Arc::new(InMemoryTicketStore::new()),
        TicketIdGenerator::default(),
        ExpirationPolicy::default(),
        clock.clone(),
    );
    (Arc::new(registry), clock)
}

#[derive(Clone)]
struct FakeUser {
    password: Option<String>,
    principal: Principal,
    mfa: Option<String>,
}

#[derive(Default)]
pub struct FakeCredentials {
    users: HashMap<String, FakeUser>,
}

impl FakeCredentials {
    #[must_use]
    pub fn with_user(mut self, id: &str, password: &str, attrs: &[(&str, &str)]) -> Self {
        let mut principal = Principal::new(id);
        for (name, value) in attrs {
            principal.attributes.insert_single(*name, *value);
        }
        self.users.insert(
            id.to_owned(),
            FakeUser {
                password: Some(password.to_owned()),
                principal,
                mfa: None,
            },
        );
        self
    }

    #[must_use]
    pub fn with_mfa(mut self, id: &str, provider: &str) -> Self {
        if let Some(user) = self.users.get_mut(id) {
            user.mfa = Some(provider.to_owned());
        }
        self
    }

    #[must_use]
    pub fn with_passwordless(mut self, id: &str, provider: &str) -> Self {
        self.users.insert(
            id.to_owned(),
            FakeUser {
                password: None,
                principal: Principal::new(id),
                mfa: Some(provider.to_owned()),
            },
        );
        self
    }
}

#[async_trait]
impl CredentialResolverPluginClient for FakeCredentials {
    async fn authenticate(
        &self,
        credential: &Credential,
    ) -> Result<AuthenticatedPrincipal, SsoError> {
        let user = self
            .users
            .get(credential.username())
            .ok_or_else(|| SsoError::AuthenticationFailed("unknown user".to_owned()))?;
        let accepted = match (credential, &user.password) {
            (Credential::UsernamePassword { password, .. }, Some(expected)) => {
                password.expose_secret() == expected.as_str()
            }
            (Credential::Passwordless { .. }, None) => true,
            _ => false,
        };
        if !accepted {
            return Err(SsoError::AuthenticationFailed("bad credentials".to_owned()));
        }
        Ok(AuthenticatedPrincipal {
            principal: user.principal.clone(),
            multifactor_provider: user.mfa.clone(),
        })
    }

    async fn lookup(&self, username: &str) -> Result<Option<Principal>, SsoError> {
        Ok(self.users.get(username).map(|u| u.principal.clone()))
    }
}

/// Accepts a single fixed token and counts verifications.
pub struct FakeSecondFactor {
    token: String,
    pub calls: AtomicUsize,
}

impl FakeSecondFactor {
    pub fn accepting(token: &str) -> Self {
        Self {
            token: token.to_owned(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondFactorPluginClient for FakeSecondFactor {
    async fn verify(
        &self,
        _principal: &str,
        _provider: &str,
        token: &str,
    ) -> Result<bool, SsoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(token == self.token)
    }
}

#[derive(Default)]
pub struct FakeAup {
    accepted: Mutex<HashSet<String>>,
}

impl FakeAup {
    pub fn accepted_by(&self, principal: &str) {
        self.accepted.lock().insert(principal.to_owned());
    }
}

#[async_trait]
impl AupPluginClient for FakeAup {
    async fn terms(&self, _principal: &Principal) -> Result<AupTerms, SsoError> {
        Ok(AupTerms {
            code: "screen.aup.policyterms".to_owned(),
            default_text: "Be nice.".to_owned(),
        })
    }

    async fn accept(&self, principal: &Principal) -> Result<(), SsoError> {
        self.accepted.lock().insert(principal.id.clone());
        Ok(())
    }

    async fn status(&self, principal: &Principal) -> Result<bool, SsoError> {
        Ok(self.accepted.lock().contains(&principal.id))
    }
}

#[derive(Default)]
pub struct FakeSurrogates {
    allowed: HashSet<(String, String)>,
}

impl FakeSurrogates {
    #[must_use]
    pub fn allow(mut self, delegate: &str, target: &str) -> Self {
        self.allowed.insert((delegate.to_owned(), target.to_owned()));
        self
    }
}

#[async_trait]
impl SurrogateAuthorizationPluginClient for FakeSurrogates {
    async fn can_impersonate(&self, delegate: &str, target: &str) -> Result<bool, SsoError> {
        Ok(self
            .allowed
            .contains(&(delegate.to_owned(), target.to_owned())))
    }
}
