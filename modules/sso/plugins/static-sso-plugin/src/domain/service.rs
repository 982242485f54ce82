//! Service implementation for the static SSO plugin.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use sso_engine_sdk::{AuthenticatedPrincipal, AupTerms, Credential, Principal};
use tracing::debug;

use crate::config::{StaticSsoPluginConfig, UserConfig};

/// Wildcard surrogate target.
const ANY_TARGET: &str = "*";

struct Account {
    password: Option<SecretString>,
    passwordless: bool,
    principal: Principal,
    mfa_provider: Option<String>,
    otp_tokens: HashSet<String>,
    scratch_codes: Mutex<HashSet<String>>,
}

impl Account {
    fn from_config(user: &UserConfig) -> Self {
        Self {
            password: user.password.clone(),
            passwordless: user.passwordless,
            principal: Principal {
                id: user.username.clone(),
                attributes: user.attributes.clone().into(),
            },
            mfa_provider: user.mfa_provider.clone(),
            otp_tokens: user.otp_tokens.iter().cloned().collect(),
            scratch_codes: Mutex::new(user.scratch_codes.iter().cloned().collect()),
        }
    }
}

/// Static SSO collaborator service.
///
/// Accounts, surrogate grants and policy terms come from configuration.
/// Scratch codes and policy acceptances are the only mutable state.
pub struct Service {
    accounts: HashMap<String, Account>,
    surrogates: HashMap<String, HashSet<String>>,
    terms: AupTerms,
    aup_enabled: bool,
    accepted: Mutex<HashSet<String>>,
}

impl Service {
    /// Create a service from plugin configuration.
    #[must_use]
    pub fn from_config(cfg: &StaticSsoPluginConfig) -> Self {
        let accounts = cfg
            .users
            .iter()
            .map(|u| (u.username.clone(), Account::from_config(u)))
            .collect();
        let surrogates = cfg
            .surrogates
            .iter()
            .map(|(delegate, targets)| (delegate.clone(), targets.iter().cloned().collect()))
            .collect();

        Self {
            accounts,
            surrogates,
            terms: AupTerms {
                code: cfg.aup.code.clone(),
                default_text: cfg.aup.default_text.clone(),
            },
            aup_enabled: cfg.aup.enabled,
            accepted: Mutex::new(cfg.aup.accepted.iter().cloned().collect()),
        }
    }

    /// Whether the usage policy store should be wired into the engine.
    #[must_use]
    pub fn aup_enabled(&self) -> bool {
        self.aup_enabled
    }

    /// Verify a primary credential.
    ///
    /// Returns `None` if the account is unknown, the password is wrong, or a
    /// passwordless credential was submitted for an account not enrolled for it.
    #[must_use]
    pub fn authenticate(&self, credential: &Credential) -> Option<AuthenticatedPrincipal> {
        let account = self.accounts.get(credential.username())?;
        let ok = match credential {
            Credential::UsernamePassword { password, .. } => account
                .password
                .as_ref()
                .is_some_and(|p| p.expose_secret() == password.expose_secret()),
            Credential::Passwordless { .. } => {
                account.passwordless && account.mfa_provider.is_some()
            }
        };
        if !ok {
            debug!(username = credential.username(), "Credential rejected");
            return None;
        }
        Some(AuthenticatedPrincipal {
            principal: account.principal.clone(),
            multifactor_provider: account.mfa_provider.clone(),
        })
    }

    #[must_use]
    pub fn lookup(&self, username: &str) -> Option<Principal> {
        self.accounts.get(username).map(|a| a.principal.clone())
    }

    /// Check a second-factor token. Scratch codes are burned on success.
    #[must_use]
    pub fn verify_token(&self, principal: &str, provider: &str, token: &str) -> bool {
        let Some(account) = self.accounts.get(principal) else {
            return false;
        };
        if account.mfa_provider.as_deref() != Some(provider) || token.is_empty() {
            return false;
        }
        account.otp_tokens.contains(token) || account.scratch_codes.lock().remove(token)
    }

    #[must_use]
    pub fn can_impersonate(&self, delegate: &str, target: &str) -> bool {
        delegate != target
            && self
                .surrogates
                .get(delegate)
                .is_some_and(|targets| targets.contains(target) || targets.contains(ANY_TARGET))
    }

    #[must_use]
    pub fn terms(&self) -> AupTerms {
        self.terms.clone()
    }

    pub fn accept(&self, principal: &str) {
        self.accepted.lock().insert(principal.to_owned());
    }

    #[must_use]
    pub fn accepted(&self, principal: &str) -> bool {
        self.accepted.lock().contains(principal)
    }
}
