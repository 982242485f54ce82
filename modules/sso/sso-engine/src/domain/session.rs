//! Authentication session manager.
//!
//! Drives a browser through
//! `ANONYMOUS -> CREDENTIALS_SUBMITTED -> AUP_PENDING -> MFA_PENDING -> AUTHENTICATED`
//! and binds the result to a TGT. Pending flows live in memory, keyed by an
//! opaque flow id, and are not time-bounded by the engine.

use std::sync::Arc;

use dashmap::DashMap;
use sso_engine_sdk::{
    AupPluginClient, AupTerms, Credential, CredentialResolverPluginClient, Principal,
    SecondFactorPluginClient,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::error::DomainError;
use crate::domain::registry::TicketRegistry;
use crate::domain::services::ServiceRegistry;
use crate::domain::surrogate::SurrogateResolver;
use crate::domain::ticket::redact;
use crate::domain::trust::TrustRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Anonymous,
    CredentialsSubmitted,
    AupPending,
    MfaPending,
    Authenticated,
    LoggedOut,
}

impl LoginState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anonymous => "ANONYMOUS",
            Self::CredentialsSubmitted => "CREDENTIALS_SUBMITTED",
            Self::AupPending => "AUP_PENDING",
            Self::MfaPending => "MFA_PENDING",
            Self::Authenticated => "AUTHENTICATED",
            Self::LoggedOut => "LOGGED_OUT",
        }
    }
}

/// What the browser presented besides its credentials.
#[derive(Debug, Clone, Default)]
pub struct DeviceContext {
    pub fingerprint: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug)]
pub struct CredentialSubmission {
    pub credential: Credential,
    pub service: Option<String>,
    pub renew: bool,
    /// Explicit surrogate target; takes precedence over the
    /// `target<sep>delegate` username syntax.
    pub surrogate_target: Option<String>,
    pub device: DeviceContext,
}

impl CredentialSubmission {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            service: None,
            renew: false,
            surrogate_target: None,
            device: DeviceContext::default(),
        }
    }

    #[must_use]
    pub fn service(mut self, service: Option<String>) -> Self {
        self.service = service;
        self
    }

    #[must_use]
    pub fn renew(mut self, renew: bool) -> Self {
        self.renew = renew;
        self
    }

    #[must_use]
    pub fn surrogate_target(mut self, target: Option<String>) -> Self {
        self.surrogate_target = target;
        self
    }

    #[must_use]
    pub fn device(mut self, device: DeviceContext) -> Self {
        self.device = device;
        self
    }
}

/// Request to trust the current device after a second factor.
#[derive(Debug, Clone, Default)]
pub struct TrustRequest {
    pub remember: bool,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    pub tgt_id: String,
    pub principal: Principal,
    pub service_ticket: Option<String>,
    /// Where to send the browser, with the service ticket attached.
    pub redirect: Option<String>,
    /// `false` when an existing session was reused.
    pub new_login: bool,
}

#[derive(Debug, Clone)]
pub enum LoginOutcome {
    CredentialsRequired {
        service: Option<String>,
    },
    AupPending {
        flow_id: String,
        principal: String,
        terms: AupTerms,
    },
    MfaPending {
        flow_id: String,
        principal: String,
        provider: String,
        can_trust_device: bool,
    },
    Authenticated(Box<AuthenticatedSession>),
}

impl LoginOutcome {
    #[must_use]
    pub fn state(&self) -> LoginState {
        match self {
            Self::CredentialsRequired { .. } => LoginState::Anonymous,
            Self::AupPending { .. } => LoginState::AupPending,
            Self::MfaPending { .. } => LoginState::MfaPending,
            Self::Authenticated(_) => LoginState::Authenticated,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogoutOutcome {
    pub principal: Option<String>,
    /// Set only when the requested URL is a registered service.
    pub redirect: Option<String>,
}

impl LogoutOutcome {
    #[must_use]
    pub fn state(&self) -> LoginState {
        LoginState::LoggedOut
    }
}

/// Settings of the session manager.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub server_prefix: String,
    pub sliding_expiration: bool,
    pub trusted_devices_enabled: bool,
    pub auto_trust_devices: bool,
    pub follow_logout_redirects: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            server_prefix: "http://localhost:8080".to_owned(),
            sliding_expiration: true,
            trusted_devices_enabled: true,
            auto_trust_devices: false,
            follow_logout_redirects: true,
        }
    }
}

/// Collaborators consulted during login.
#[derive(Clone)]
pub struct SessionCollaborators {
    pub credentials: Arc<dyn CredentialResolverPluginClient>,
    pub second_factor: Arc<dyn SecondFactorPluginClient>,
    /// Without a policy store, AUP gating is skipped.
    pub aup: Option<Arc<dyn AupPluginClient>>,
}

#[derive(Debug, Clone)]
struct LoginFlow {
    id: String,
    state: LoginState,
    /// Principal the TGT will carry (the target for surrogate logins).
    principal: Principal,
    /// Who proves the second factor and owns trusted devices.
    mfa_subject: String,
    mfa_provider: Option<String>,
    /// Passwordless accounts always go through their provider.
    passwordless: bool,
    service: Option<String>,
    device: DeviceContext,
}

struct ResolvedLogin {
    principal: Principal,
    mfa_subject: String,
    mfa_provider: Option<String>,
    passwordless: bool,
}

pub struct SessionManager {
    registry: Arc<TicketRegistry>,
    services: Arc<ServiceRegistry>,
    surrogates: Arc<SurrogateResolver>,
    trust: Arc<TrustRegistry>,
    collaborators: SessionCollaborators,
    settings: SessionSettings,
    flows: DashMap<String, LoginFlow>,
}

impl SessionManager {
    pub fn new(
        registry: Arc<TicketRegistry>,
        services: Arc<ServiceRegistry>,
        surrogates: Arc<SurrogateResolver>,
        trust: Arc<TrustRegistry>,
        collaborators: SessionCollaborators,
        settings: SessionSettings,
    ) -> Self {
        Self {
            registry,
            services,
            surrogates,
            trust,
            collaborators,
            settings,
            flows: DashMap::new(),
        }
    }

    /// Start a login. Reuses a valid TGT unless `renew` is requested.
    #[tracing::instrument(skip_all, fields(service = ?service, renew = renew, has_tgc = tgc.is_some()))]
    pub fn begin(
        &self,
        tgc: Option<&str>,
        service: Option<&str>,
        renew: bool,
    ) -> Result<LoginOutcome, DomainError> {
        self.check_service(service)?;

        if !renew && let Some(tgt_id) = tgc {
            match self.registry.touch_tgt(tgt_id) {
                Ok(principal) => {
                    let (redirect, service_ticket) = self.service_redirect(tgt_id, service, false)?;
                    info!(principal = %principal.id, "Reusing single sign-on session");
                    return Ok(LoginOutcome::Authenticated(Box::new(AuthenticatedSession {
                        tgt_id: tgt_id.to_owned(),
                        principal,
                        service_ticket,
                        redirect,
                        new_login: false,
                    })));
                }
                Err(DomainError::StorageUnavailable(msg)) => {
                    return Err(DomainError::StorageUnavailable(msg));
                }
                Err(e) => debug!(tgt = %redact(tgt_id), error = %e, "Ignoring unusable TGC"),
            }
        }

        Ok(LoginOutcome::CredentialsRequired {
            service: service.map(ToOwned::to_owned),
        })
    }

    /// Verify primary credentials and advance the flow as far as possible.
    #[tracing::instrument(
        skip_all,
        fields(username = %submission.credential.username(), service = ?submission.service, renew = submission.renew)
    )]
    pub async fn submit_credentials(
        &self,
        submission: CredentialSubmission,
    ) -> Result<LoginOutcome, DomainError> {
        self.check_service(submission.service.as_deref())?;

        let resolved = self
            .resolve_login(submission.credential, submission.surrogate_target)
            .await?;
        let flow = LoginFlow {
            id: Uuid::new_v4().to_string(),
            state: LoginState::CredentialsSubmitted,
            principal: resolved.principal,
            mfa_subject: resolved.mfa_subject,
            mfa_provider: resolved.mfa_provider,
            passwordless: resolved.passwordless,
            service: submission.service,
            device: submission.device,
        };

        if let Some(aup) = &self.collaborators.aup {
            let accepted = aup.status(&flow.principal).await.map_err(DomainError::from)?;
            if !accepted {
                let terms = aup.terms(&flow.principal).await.map_err(DomainError::from)?;
                info!(principal = %flow.principal.id, "Acceptable usage policy pending");
                let outcome = LoginOutcome::AupPending {
                    flow_id: flow.id.clone(),
                    principal: flow.principal.id.clone(),
                    terms,
                };
                self.park(flow, LoginState::AupPending);
                return Ok(outcome);
            }
        }

        self.after_policy(flow)
    }

    /// Accept the usage policy for a flow in `AUP_PENDING`.
    #[tracing::instrument(skip_all, fields(flow = %flow_id))]
    pub async fn accept_aup(&self, flow_id: &str) -> Result<LoginOutcome, DomainError> {
        let flow = self.take_flow(flow_id, LoginState::AupPending)?;
        let Some(aup) = &self.collaborators.aup else {
            return self.after_policy(flow);
        };
        if let Err(e) = aup.accept(&flow.principal).await {
            self.park(flow, LoginState::AupPending);
            return Err(e.into());
        }
        info!(principal = %flow.principal.id, "Acceptable usage policy accepted");
        self.after_policy(flow)
    }

    /// Decline the usage policy. Ends the flow and returns its principal.
    pub fn decline_aup(&self, flow_id: &str) -> Result<Principal, DomainError> {
        let flow = self.take_flow(flow_id, LoginState::AupPending)?;
        warn!(principal = %flow.principal.id, "Acceptable usage policy declined");
        Ok(flow.principal)
    }

    /// Re-query the policy store for a pending flow. Safe to poll.
    pub async fn aup_status(&self, flow_id: &str) -> Result<bool, DomainError> {
        let principal = {
            let flow = self
                .flows
                .get(flow_id)
                .ok_or_else(|| DomainError::FlowNotFound(flow_id.to_owned()))?;
            flow.principal.clone()
        };
        match &self.collaborators.aup {
            Some(aup) => aup.status(&principal).await.map_err(DomainError::from),
            None => Ok(true),
        }
    }

    /// Verify a second factor for a flow in `MFA_PENDING`. A rejected token
    /// keeps the flow pending so the user can retry.
    #[tracing::instrument(skip_all, fields(flow = %flow_id, remember = trust.remember))]
    pub async fn submit_token(
        &self,
        flow_id: &str,
        token: &str,
        trust: TrustRequest,
    ) -> Result<LoginOutcome, DomainError> {
        let flow = self.take_flow(flow_id, LoginState::MfaPending)?;
        let provider = flow.mfa_provider.clone().unwrap_or_default();

        let verdict = self
            .collaborators
            .second_factor
            .verify(&flow.mfa_subject, &provider, token)
            .await;
        match verdict {
            Ok(true) => {}
            Ok(false) => {
                let subject = flow.mfa_subject.clone();
                self.park(flow, LoginState::MfaPending);
                warn!(principal = %subject, provider = %provider, "Second factor rejected");
                return Err(DomainError::MultifactorFailed(subject));
            }
            Err(e) => {
                self.park(flow, LoginState::MfaPending);
                return Err(e.into());
            }
        }

        if self.settings.trusted_devices_enabled
            && (trust.remember || self.settings.auto_trust_devices)
            && let Some(fp) = &flow.device.fingerprint
            && let Err(e) = self.trust.record_trusted_device(
                &flow.mfa_subject,
                fp,
                trust.name.as_deref(),
                flow.device.user_agent.as_deref(),
            )
        {
            warn!(principal = %flow.mfa_subject, error = %e, "Failed to record trusted device");
        }

        self.complete(flow)
    }

    /// Invalidate the bound TGT. The redirect is kept only for registered
    /// services.
    #[tracing::instrument(skip_all, fields(url = ?url))]
    pub fn logout(
        &self,
        tgc: Option<&str>,
        url: Option<&str>,
    ) -> Result<LogoutOutcome, DomainError> {
        let principal = match tgc {
            Some(tgt_id) => self
                .registry
                .invalidate_tgt(tgt_id)?
                .map(|inv| inv.principal.id),
            None => None,
        };

        let redirect = url
            .filter(|_| self.settings.follow_logout_redirects)
            .filter(|u| self.services.is_registered(u))
            .map(ToOwned::to_owned);
        if url.is_some() && redirect.is_none() {
            warn!("Logout redirect is not a registered service; staying on the logout page");
        }

        info!(principal = ?principal, "Logged out");
        Ok(LogoutOutcome {
            principal,
            redirect,
        })
    }

    /// Principal bound to a TGC, if the session is still valid.
    #[must_use]
    pub fn session_principal(&self, tgc: Option<&str>) -> Option<Principal> {
        tgc.and_then(|id| self.registry.get_tgt_principal(id).ok())
    }

    /// Non-interactive login for the REST API.
    ///
    /// The usage policy is a browser interaction and is not consulted. A
    /// required second factor must come with the request as `token`.
    #[tracing::instrument(skip_all, fields(username = %credential.username()))]
    pub async fn authenticate_direct(
        &self,
        credential: Credential,
        surrogate_target: Option<String>,
        token: Option<&str>,
    ) -> Result<(String, Principal), DomainError> {
        let principal = self
            .verify_credentials(credential, surrogate_target, token)
            .await?;
        let tgt = self
            .registry
            .create_tgt(principal.clone(), self.settings.sliding_expiration)?;
        Ok((tgt, principal))
    }

    /// Verify credentials, and the second factor when one is required,
    /// without creating a session.
    pub async fn verify_credentials(
        &self,
        credential: Credential,
        surrogate_target: Option<String>,
        token: Option<&str>,
    ) -> Result<Principal, DomainError> {
        let resolved = self.resolve_login(credential, surrogate_target).await?;

        if let Some(provider) = &resolved.mfa_provider {
            let Some(token) = token else {
                return Err(DomainError::MultifactorFailed(resolved.mfa_subject));
            };
            let ok = self
                .collaborators
                .second_factor
                .verify(&resolved.mfa_subject, provider, token)
                .await
                .map_err(DomainError::from)?;
            if !ok {
                return Err(DomainError::MultifactorFailed(resolved.mfa_subject));
            }
        }
        Ok(resolved.principal)
    }

    /// Issue a service ticket for an authorized service under a TGT.
    pub fn issue_service_ticket(&self, tgt_id: &str, service: &str) -> Result<String, DomainError> {
        self.check_service(Some(service))?;
        self.registry.create_st(tgt_id, service, false)
    }

    /// Provider and device-trust offer of a flow waiting for its second
    /// factor.
    #[must_use]
    pub fn pending_mfa(&self, flow_id: &str) -> Option<(String, bool)> {
        let flow = self.flows.get(flow_id)?;
        if flow.state != LoginState::MfaPending {
            return None;
        }
        Some((
            flow.mfa_provider.clone().unwrap_or_default(),
            self.settings.trusted_devices_enabled && flow.device.fingerprint.is_some(),
        ))
    }

    /// Number of pending login flows.
    #[must_use]
    pub fn pending_flows(&self) -> usize {
        self.flows.len()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn resolve_login(
        &self,
        credential: Credential,
        surrogate_target: Option<String>,
    ) -> Result<ResolvedLogin, DomainError> {
        let (credential, target) = match surrogate_target.filter(|t| !t.trim().is_empty()) {
            Some(target) => (credential, Some(target)),
            None => match self.surrogates.split_username(credential.username()) {
                Some((target, delegate)) => {
                    let (target, delegate) = (target.to_owned(), delegate.to_owned());
                    (credential.with_username(delegate), Some(target))
                }
                None => (credential, None),
            },
        };

        let passwordless = matches!(credential, Credential::Passwordless { .. });
        let authenticated = self
            .collaborators
            .credentials
            .authenticate(&credential)
            .await
            .map_err(DomainError::from)?;
        if passwordless && authenticated.multifactor_provider.is_none() {
            return Err(DomainError::AuthenticationFailed(format!(
                "'{}' is not enrolled for passwordless login",
                credential.username()
            )));
        }

        let delegate = authenticated.principal;
        let principal = match target {
            Some(target) => {
                self.surrogates
                    .resolve_surrogate(&delegate, &target)
                    .await?
                    .target
            }
            None => delegate.clone(),
        };

        Ok(ResolvedLogin {
            principal,
            mfa_subject: delegate.id,
            mfa_provider: authenticated.multifactor_provider,
            passwordless,
        })
    }

    /// Continue a flow whose usage policy is settled.
    fn after_policy(&self, flow: LoginFlow) -> Result<LoginOutcome, DomainError> {
        if let Some(provider) = flow.mfa_provider.clone() {
            let trusted = !flow.passwordless
                && self.settings.trusted_devices_enabled
                && flow
                    .device
                    .fingerprint
                    .as_deref()
                    .is_some_and(|fp| self.trust.is_trusted(&flow.mfa_subject, fp));
            if trusted {
                info!(principal = %flow.mfa_subject, "Trusted device, skipping second factor");
            } else {
                let outcome = LoginOutcome::MfaPending {
                    flow_id: flow.id.clone(),
                    principal: flow.principal.id.clone(),
                    provider,
                    can_trust_device: self.settings.trusted_devices_enabled
                        && flow.device.fingerprint.is_some(),
                };
                self.park(flow, LoginState::MfaPending);
                return Ok(outcome);
            }
        }
        self.complete(flow)
    }

    fn complete(&self, flow: LoginFlow) -> Result<LoginOutcome, DomainError> {
        let tgt_id = self
            .registry
            .create_tgt(flow.principal.clone(), self.settings.sliding_expiration)?;
        let (redirect, service_ticket) =
            self.service_redirect(&tgt_id, flow.service.as_deref(), true)?;
        info!(principal = %flow.principal.id, "Authentication completed");
        Ok(LoginOutcome::Authenticated(Box::new(AuthenticatedSession {
            tgt_id,
            principal: flow.principal,
            service_ticket,
            redirect,
            new_login: true,
        })))
    }

    /// Redirect target for a service. Internal services are reached
    /// without a service ticket.
    fn service_redirect(
        &self,
        tgt_id: &str,
        service: Option<&str>,
        from_new_login: bool,
    ) -> Result<(Option<String>, Option<String>), DomainError> {
        let Some(service) = service else {
            return Ok((None, None));
        };
        if self.is_internal(service) {
            return Ok((Some(service.to_owned()), None));
        }
        let st = self.registry.create_st(tgt_id, service, from_new_login)?;
        let sep = if service.contains('?') { '&' } else { '?' };
        Ok((Some(format!("{service}{sep}ticket={st}")), Some(st)))
    }

    fn is_internal(&self, service: &str) -> bool {
        let prefix = self.settings.server_prefix.trim_end_matches('/');
        service
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
    }

    /// With no registered services configured every service is accepted.
    fn check_service(&self, service: Option<&str>) -> Result<(), DomainError> {
        match service {
            Some(s)
                if !self.services.is_empty()
                    && !self.is_internal(s)
                    && !self.services.is_registered(s) =>
            {
                warn!(service = %s, "Service is not registered");
                Err(DomainError::UnauthorizedService(s.to_owned()))
            }
            _ => Ok(()),
        }
    }

    fn park(&self, mut flow: LoginFlow, state: LoginState) {
        flow.state = state;
        self.flows.insert(flow.id.clone(), flow);
    }

    fn take_flow(&self, flow_id: &str, expected: LoginState) -> Result<LoginFlow, DomainError> {
        let (_, flow) = self
            .flows
            .remove(flow_id)
            .ok_or_else(|| DomainError::FlowNotFound(flow_id.to_owned()))?;
        if flow.state != expected {
            let actual = flow.state;
            self.flows.insert(flow.id.clone(), flow);
            return Err(DomainError::InvalidFlowState {
                expected: expected.as_str(),
                actual: actual.as_str(),
            });
        }
        Ok(flow)
    }
}
