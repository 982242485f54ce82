//! OIDC authorization-code flow on top of the ticket registry.
//!
//! Authorization codes and access tokens are children of the TGT, so a
//! logout revokes them together with the service tickets.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dashmap::DashSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sso_engine_sdk::Principal;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use url::Url;

use crate::config::{OidcClientConfig, SsoEngineConfig};
use crate::domain::error::DomainError;
use crate::domain::registry::TicketRegistry;
use crate::domain::ticket::redact;

pub const SCOPE_OPENID: &str = "openid";
pub const SCOPE_PROFILE: &str = "profile";
pub const SCOPE_EMAIL: &str = "email";
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";

const NAME_ATTRIBUTES: [&str; 3] = ["name", "displayName", "cn"];
const GIVEN_NAME_ATTRIBUTES: [&str; 3] = ["given_name", "givenName", "firstname"];
const FAMILY_NAME_ATTRIBUTES: [&str; 4] = ["family_name", "familyName", "sn", "lastname"];
const EMAIL_ATTRIBUTES: [&str; 2] = ["email", "mail"];

/// Claims the issuer sets itself. Client definitions may not use them.
const RESERVED_CLAIMS: [&str; 8] = [
    "iss", "sub", "aud", "exp", "iat", "auth_time", "nonce", "client_id",
];

/// Claim taken from a principal attribute. `format` may contain `{}`,
/// which is replaced by the first attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeClaim {
    pub attribute: String,
    #[serde(default)]
    pub format: Option<String>,
}

/// Per-client claim definition. Anything that is not an attribute mapping
/// is a static value and is emitted unchanged, nested objects included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimDefinition {
    Attribute(AttributeClaim),
    Static(Value),
}

impl ClaimDefinition {
    fn resolve(&self, principal: &Principal) -> Option<Value> {
        match self {
            Self::Static(value) => Some(value.clone()),
            Self::Attribute(claim) => {
                let value = principal.attributes.first(&claim.attribute)?;
                let rendered = match &claim.format {
                    Some(format) => format.replace("{}", value),
                    None => value.to_owned(),
                };
                Some(Value::String(rendered))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct OidcClient {
    pub client_id: String,
    client_secret: SecretString,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub require_consent: bool,
    pub claims: BTreeMap<String, ClaimDefinition>,
}

impl OidcClient {
    fn from_config(cfg: &OidcClientConfig) -> Result<Self, DomainError> {
        if cfg.client_id.trim().is_empty() {
            return Err(DomainError::validation("oidc client_id must not be empty"));
        }
        if cfg.redirect_uris.is_empty() {
            return Err(DomainError::validation(format!(
                "oidc client '{}' has no redirect_uris",
                cfg.client_id
            )));
        }
        let reserved = cfg
            .claims
            .keys()
            .find(|name| RESERVED_CLAIMS.contains(&name.as_str()));
        if let Some(reserved) = reserved {
            return Err(DomainError::validation(format!(
                "oidc client '{}' redefines reserved claim '{reserved}'",
                cfg.client_id
            )));
        }
        Ok(Self {
            client_id: cfg.client_id.clone(),
            client_secret: cfg.client_secret.clone(),
            name: cfg.name.clone().unwrap_or_else(|| cfg.client_id.clone()),
            redirect_uris: cfg.redirect_uris.clone(),
            require_consent: cfg.require_consent,
            claims: cfg.claims.clone(),
        })
    }

    fn secret_matches(&self, secret: &str) -> bool {
        self.client_secret.expose_secret() == secret
    }

    fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }
}

/// Parameters of `/oidc/authorize`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationRequest {
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
}

impl AuthorizationRequest {
    #[must_use]
    pub fn scopes(&self) -> Vec<String> {
        split_scopes(&self.scope)
    }
}

/// Parameters of `/oidc/token`, after client credentials were extracted.
#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: String,
    pub redirect_uri: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub id_token: String,
    pub scope: String,
}

pub struct OidcIssuer {
    registry: Arc<TicketRegistry>,
    clients: HashMap<String, OidcClient>,
    issuer: String,
    signing_key: EncodingKey,
    id_token_ttl: Duration,
    consents: DashSet<(String, String)>,
}

impl OidcIssuer {
    pub fn from_config(
        cfg: &SsoEngineConfig,
        registry: Arc<TicketRegistry>,
    ) -> Result<Self, DomainError> {
        let mut clients = HashMap::new();
        for client_cfg in &cfg.oidc.clients {
            let client = OidcClient::from_config(client_cfg)?;
            if clients.insert(client.client_id.clone(), client).is_some() {
                return Err(DomainError::validation(format!(
                    "duplicate oidc client '{}'",
                    client_cfg.client_id
                )));
            }
        }

        let secret = cfg.oidc.signing_secret.expose_secret();
        if !clients.is_empty() && secret.is_empty() {
            return Err(DomainError::validation(
                "oidc.signing_secret is required when oidc clients are configured",
            ));
        }

        Ok(Self {
            registry,
            clients,
            issuer: cfg.oidc_issuer(),
            signing_key: EncodingKey::from_secret(secret.as_bytes()),
            id_token_ttl: Duration::seconds(
                i64::try_from(cfg.oidc.id_token_timeout_secs).unwrap_or(i64::MAX),
            ),
            consents: DashSet::new(),
        })
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn client(&self, client_id: &str) -> Option<&OidcClient> {
        self.clients.get(client_id)
    }

    /// Check an authorization request before the user is asked to log in.
    pub fn check_authorization_request(
        &self,
        request: &AuthorizationRequest,
    ) -> Result<&OidcClient, DomainError> {
        let client = self
            .clients
            .get(&request.client_id)
            .ok_or_else(|| DomainError::invalid_client(request.client_id.clone()))?;
        if !client.allows_redirect(&request.redirect_uri) {
            return Err(DomainError::validation(format!(
                "redirect_uri '{}' is not registered for client '{}'",
                request.redirect_uri, client.client_id
            )));
        }
        if request.response_type != "code" {
            return Err(DomainError::validation(format!(
                "unsupported response_type '{}'",
                request.response_type
            )));
        }
        if !request.scopes().iter().any(|s| s == SCOPE_OPENID) {
            return Err(DomainError::validation("scope must include 'openid'"));
        }
        Ok(client)
    }

    #[must_use]
    pub fn needs_consent(&self, principal: &str, client_id: &str) -> bool {
        self.clients
            .get(client_id)
            .is_some_and(|c| c.require_consent)
            && !self
                .consents
                .contains(&(principal.to_owned(), client_id.to_owned()))
    }

    pub fn grant_consent(&self, principal: &str, client_id: &str) {
        info!(principal = %principal, client_id = %client_id, "Consent granted");
        self.consents
            .insert((principal.to_owned(), client_id.to_owned()));
    }

    /// Issue a code under `tgt_id` and return the client redirect URL
    /// carrying `code` and `state`.
    #[tracing::instrument(skip_all, fields(client_id = %request.client_id, tgt = %redact(tgt_id)))]
    pub fn issue_authorization_code(
        &self,
        tgt_id: &str,
        request: &AuthorizationRequest,
    ) -> Result<String, DomainError> {
        let client = self.check_authorization_request(request)?;
        let code = self.registry.create_code(
            tgt_id,
            &client.client_id,
            &request.redirect_uri,
            &request.scopes(),
            request.nonce.as_deref(),
        )?;

        let mut url = Url::parse(&request.redirect_uri)
            .map_err(|e| DomainError::validation(format!("invalid redirect_uri: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("code", &code);
            if let Some(state) = &request.state {
                query.append_pair("state", state);
            }
        }
        info!(code = %redact(&code), "Issued authorization code");
        Ok(url.into())
    }

    /// Redeem an authorization code for an access token and an ID token.
    ///
    /// The code is consumed before the client and redirect URI are compared,
    /// so a mismatched exchange burns it.
    #[tracing::instrument(skip_all, fields(client_id = %request.client_id))]
    pub fn exchange_code(&self, request: &TokenRequest) -> Result<TokenResponse, DomainError> {
        if request.grant_type != GRANT_AUTHORIZATION_CODE {
            return Err(DomainError::validation(format!(
                "unsupported grant_type '{}'",
                request.grant_type
            )));
        }
        let client = self
            .clients
            .get(&request.client_id)
            .filter(|c| c.secret_matches(&request.client_secret))
            .ok_or_else(|| {
                warn!("Client authentication failed");
                DomainError::invalid_client(request.client_id.clone())
            })?;

        let redeemed = self
            .registry
            .consume_code(&request.code)
            .map_err(grant_error)?;
        if redeemed.code.client_id != client.client_id {
            warn!("Authorization code presented by another client");
            return Err(DomainError::invalid_grant("code was issued to another client"));
        }
        if redeemed.code.redirect_uri != request.redirect_uri {
            return Err(DomainError::invalid_grant("redirect_uri does not match"));
        }

        let scopes = redeemed.code.scopes.clone();
        let access_token = self
            .registry
            .create_access_token(&redeemed.code.parent, &client.client_id, &scopes)
            .map_err(grant_error)?;

        let now = self.registry.now();
        let claims = self.id_token_claims(
            client,
            &redeemed.principal,
            &scopes,
            redeemed.code.nonce.as_deref(),
            redeemed.auth_time,
            now,
        );
        let header = Header::new(Algorithm::HS256);
        let id_token = jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|e| DomainError::internal(format!("failed to sign id token: {e}")))?;

        info!(principal = %redeemed.principal.id, "Exchanged authorization code");
        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_owned(),
            expires_in: self.registry.policy().access_token.whole_seconds(),
            id_token,
            scope: scopes.join(" "),
        })
    }

    /// Claims visible to the holder of an access token.
    pub fn user_info(&self, access_token: &str) -> Result<Map<String, Value>, DomainError> {
        let resolved = self.registry.resolve_access_token(access_token)?;
        let mut claims = Map::new();
        claims.insert(
            "sub".to_owned(),
            Value::String(resolved.principal.id.clone()),
        );
        scope_claims(&mut claims, &resolved.principal, &resolved.token.scopes);
        if let Some(client) = self.clients.get(&resolved.token.client_id) {
            client_claims(&mut claims, client, &resolved.principal);
        }
        Ok(claims)
    }

    #[must_use]
    pub fn discovery(&self) -> Value {
        let issuer = self.issuer.as_str();
        json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/authorize"),
            "token_endpoint": format!("{issuer}/token"),
            "userinfo_endpoint": format!("{issuer}/profile"),
            "response_types_supported": ["code"],
            "grant_types_supported": [GRANT_AUTHORIZATION_CODE],
            "subject_types_supported": ["public"],
            "id_token_signing_alg_values_supported": ["HS256"],
            "scopes_supported": [SCOPE_OPENID, SCOPE_PROFILE, SCOPE_EMAIL],
            "token_endpoint_auth_methods_supported": ["client_secret_basic", "client_secret_post"],
            "claims_supported": [
                "sub", "iss", "aud", "exp", "iat", "auth_time", "nonce",
                "name", "given_name", "family_name", "preferred_username", "email"
            ],
        })
    }

    fn id_token_claims(
        &self,
        client: &OidcClient,
        principal: &Principal,
        scopes: &[String],
        nonce: Option<&str>,
        auth_time: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Map<String, Value> {
        let mut claims = Map::new();
        claims.insert("iss".to_owned(), json!(self.issuer));
        claims.insert("sub".to_owned(), json!(principal.id));
        claims.insert("aud".to_owned(), json!(client.client_id));
        claims.insert("client_id".to_owned(), json!(client.client_id));
        claims.insert("iat".to_owned(), json!(now.unix_timestamp()));
        claims.insert(
            "exp".to_owned(),
            json!((now + self.id_token_ttl).unix_timestamp()),
        );
        claims.insert("auth_time".to_owned(), json!(auth_time.unix_timestamp()));
        if let Some(nonce) = nonce {
            claims.insert("nonce".to_owned(), json!(nonce));
        }
        scope_claims(&mut claims, principal, scopes);
        client_claims(&mut claims, client, principal);
        claims
    }
}

fn split_scopes(scope: &str) -> Vec<String> {
    let mut scopes: Vec<String> = Vec::new();
    for s in scope.split_whitespace() {
        if !scopes.iter().any(|seen| seen == s) {
            scopes.push(s.to_owned());
        }
    }
    scopes
}

fn first_of(principal: &Principal, names: &[&str]) -> Option<Value> {
    names
        .iter()
        .find_map(|name| principal.attributes.first(name))
        .map(|v| Value::String(v.to_owned()))
}

fn scope_claims(claims: &mut Map<String, Value>, principal: &Principal, scopes: &[String]) {
    let granted = |scope: &str| scopes.iter().any(|s| s == scope);
    if granted(SCOPE_PROFILE) {
        for (claim, names) in [
            ("name", &NAME_ATTRIBUTES[..]),
            ("given_name", &GIVEN_NAME_ATTRIBUTES[..]),
            ("family_name", &FAMILY_NAME_ATTRIBUTES[..]),
        ] {
            if let Some(value) = first_of(principal, names) {
                claims.insert(claim.to_owned(), value);
            }
        }
        claims.insert("preferred_username".to_owned(), json!(principal.id));
    }
    if granted(SCOPE_EMAIL)
        && let Some(email) = first_of(principal, &EMAIL_ATTRIBUTES)
    {
        claims.insert("email".to_owned(), email);
    }
}

fn client_claims(claims: &mut Map<String, Value>, client: &OidcClient, principal: &Principal) {
    for (name, definition) in &client.claims {
        if let Some(value) = definition.resolve(principal) {
            claims.insert(name.clone(), value);
        }
    }
}

/// Code redemption failures all read as `invalid_grant` to the client.
fn grant_error(e: DomainError) -> DomainError {
    match e {
        DomainError::StorageUnavailable(_) | DomainError::Internal(_) => e,
        other => DomainError::invalid_grant(other.to_string()),
    }
}
