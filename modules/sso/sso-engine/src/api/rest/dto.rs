use serde::{Deserialize, Serialize};
use sso_engine_sdk::{Attributes, Credential, Principal, surrogate_attributes};
use time::OffsetDateTime;

use crate::domain::oidc::{AuthorizationRequest, TokenRequest};
use crate::domain::registry::TgtStatus;

/// A flag parameter counts as set when present, unless it says `false`.
fn flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.eq_ignore_ascii_case("false"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Build a credential; a missing or empty password means passwordless.
fn credential(username: &str, password: Option<String>) -> Credential {
    match non_empty(password) {
        Some(password) => Credential::password(username.trim(), password),
        None => Credential::passwordless(username.trim()),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub service: Option<String>,
    pub renew: Option<String>,
}

impl LoginQuery {
    #[must_use]
    pub fn service(&self) -> Option<String> {
        non_empty(self.service.clone())
    }

    #[must_use]
    pub fn renew(&self) -> bool {
        flag(self.renew.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    pub password: Option<String>,
    pub service: Option<String>,
    pub renew: Option<String>,
    /// Explicit surrogate target.
    pub surrogate: Option<String>,
}

impl LoginForm {
    #[must_use]
    pub fn credential(&self) -> Credential {
        credential(&self.username, self.password.clone())
    }

    #[must_use]
    pub fn service(&self) -> Option<String> {
        non_empty(self.service.clone())
    }

    #[must_use]
    pub fn renew(&self) -> bool {
        flag(self.renew.as_deref())
    }

    #[must_use]
    pub fn surrogate(&self) -> Option<String> {
        non_empty(self.surrogate.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct AupForm {
    pub execution: String,
    #[serde(default)]
    pub decision: String,
}

#[derive(Debug, Deserialize)]
pub struct FlowQuery {
    pub execution: String,
}

#[derive(Debug, Serialize)]
pub struct AupStatusDto {
    pub execution: String,
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct MfaForm {
    pub execution: String,
    #[serde(default)]
    pub token: String,
    pub remember: Option<String>,
    #[serde(rename = "deviceName")]
    pub device_name: Option<String>,
}

impl MfaForm {
    #[must_use]
    pub fn remember(&self) -> bool {
        flag(self.remember.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutParams {
    pub service: Option<String>,
    pub url: Option<String>,
}

impl LogoutParams {
    /// Requested post-logout destination.
    #[must_use]
    pub fn target(&self) -> Option<String> {
        non_empty(self.service.clone()).or_else(|| non_empty(self.url.clone()))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidateParams {
    #[serde(default)]
    pub service: String,
    #[serde(default)]
    pub ticket: String,
    pub format: Option<String>,
}

impl ValidateParams {
    #[must_use]
    pub fn json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.eq_ignore_ascii_case("json"))
    }
}

#[derive(Debug, Deserialize)]
pub struct RestCredentialsForm {
    #[serde(default)]
    pub username: String,
    pub password: Option<String>,
    /// One-time token for accounts with a multifactor provider.
    pub token: Option<String>,
}

impl RestCredentialsForm {
    #[must_use]
    pub fn credential(&self) -> Credential {
        credential(&self.username, self.password.clone())
    }
}

#[derive(Debug, Deserialize)]
pub struct RestServiceForm {
    #[serde(default)]
    pub service: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TgtStatusDto {
    pub id: String,
    pub principal: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_used_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub renewable: bool,
    pub children: usize,
}

impl From<TgtStatus> for TgtStatusDto {
    fn from(s: TgtStatus) -> Self {
        Self {
            id: s.id,
            principal: s.principal,
            created_at: s.created_at,
            last_used_at: s.last_used_at,
            expires_at: s.expires_at,
            renewable: s.renewable,
            children: s.children,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PrincipalDto {
    pub id: String,
    pub attributes: Attributes,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationDto {
    pub principal: PrincipalDto,
    /// Authentication-level attributes. Surrogate markers are repeated here
    /// next to the principal's copy.
    pub attributes: Attributes,
    #[serde(with = "time::serde::rfc3339")]
    pub authentication_date: OffsetDateTime,
}

impl AuthenticationDto {
    #[must_use]
    pub fn new(principal: Principal, authentication_date: OffsetDateTime) -> Self {
        let attributes = principal
            .attributes
            .iter()
            .filter(|(name, _)| surrogate_attributes::ALL.contains(&name.as_str()))
            .map(|(name, values)| (name.clone(), values.clone()))
            .collect();
        Self {
            principal: PrincipalDto {
                id: principal.id,
                attributes: principal.attributes,
            },
            attributes,
            authentication_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserAuthenticationDto {
    pub authentication: AuthenticationDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: &'static str,
    pub tickets: usize,
    pub pending_flows: usize,
}

#[derive(Debug, Deserialize)]
pub struct ConsentForm {
    #[serde(default)]
    pub response_type: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: String,
    pub state: Option<String>,
    pub nonce: Option<String>,
    #[serde(default)]
    pub decision: String,
}

impl ConsentForm {
    #[must_use]
    pub fn allowed(&self) -> bool {
        self.decision.eq_ignore_ascii_case("allow")
    }

    #[must_use]
    pub fn into_request(self) -> AuthorizationRequest {
        AuthorizationRequest {
            response_type: self.response_type,
            client_id: self.client_id,
            redirect_uri: self.redirect_uri,
            scope: self.scope,
            state: self.state,
            nonce: self.nonce,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenParams {
    #[serde(default)]
    pub grant_type: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub redirect_uri: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl TokenParams {
    /// Merge with HTTP Basic client credentials, which take precedence.
    #[must_use]
    pub fn into_request(self, basic: Option<(String, String)>) -> TokenRequest {
        let (client_id, client_secret) = basic.unwrap_or_else(|| {
            (
                self.client_id.unwrap_or_default(),
                self.client_secret.unwrap_or_default(),
            )
        });
        TokenRequest {
            grant_type: self.grant_type,
            code: self.code,
            redirect_uri: self.redirect_uri,
            client_id,
            client_secret,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    pub access_token: Option<String>,
}

/// OAuth 2.0 error body of the token endpoint.
#[derive(Debug, Serialize)]
pub struct OAuthErrorDto {
    pub error: &'static str,
    pub error_description: String,
}
