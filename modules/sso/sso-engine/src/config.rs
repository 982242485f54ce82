use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::oidc::ClaimDefinition;
use crate::domain::services::AttributeReleaseConfig;

/// Configuration for the SSO engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SsoEngineConfig {
    pub server: ServerConfig,
    pub tickets: TicketsConfig,
    pub tgc: TgcConfig,
    /// Registered services, evaluated in ascending `id` order.
    pub services: Vec<RegisteredServiceConfig>,
    pub surrogate: SurrogateConfig,
    pub logout: LogoutConfig,
    pub mfa: MfaConfig,
    pub oidc: OidcConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Externally visible base URL of the server. Services under this
    /// prefix are internal and receive no service ticket.
    pub prefix: String,
    /// Display name used by rendered pages.
    pub name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            prefix: "http://localhost:8080".to_owned(),
            name: "SSO".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TicketsConfig {
    /// Hard upper bound on a TGT lifetime.
    pub tgt_max_lifetime_secs: u64,
    /// Idle timeout of a TGT.
    pub tgt_idle_timeout_secs: u64,
    /// Whether browser sessions slide their idle window on every use.
    pub tgt_sliding_expiration: bool,
    pub st_timeout_secs: u64,
    pub code_timeout_secs: u64,
    pub access_token_timeout_secs: u64,
    /// Optional node suffix appended to every ticket id.
    pub node_suffix: Option<String>,
    /// Interval of the background reclamation pass. `0` disables it.
    pub reclaim_interval_secs: u64,
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            tgt_max_lifetime_secs: 8 * 60 * 60,
            tgt_idle_timeout_secs: 2 * 60 * 60,
            tgt_sliding_expiration: true,
            st_timeout_secs: 10,
            code_timeout_secs: 30,
            access_token_timeout_secs: 8 * 60 * 60,
            node_suffix: None,
            reclaim_interval_secs: 60,
        }
    }
}

/// Ticket-granting cookie settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TgcConfig {
    pub name: String,
    pub path: String,
    pub secure: bool,
}

impl Default for TgcConfig {
    fn default() -> Self {
        Self {
            name: "TGC".to_owned(),
            path: "/".to_owned(),
            secure: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisteredServiceConfig {
    pub id: u64,
    pub name: String,
    /// Regular expression matched against the whole service URL.
    pub service_id: String,
    #[serde(default)]
    pub attribute_release: AttributeReleaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SurrogateConfig {
    /// Separator of the `target<sep>delegate` username syntax.
    pub separator: String,
    /// Release policy applied to the target principal's attributes.
    pub attribute_release: AttributeReleaseConfig,
}

impl Default for SurrogateConfig {
    fn default() -> Self {
        Self {
            separator: "+".to_owned(),
            attribute_release: AttributeReleaseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogoutConfig {
    /// Render a confirmation page on `GET /logout`.
    pub confirm: bool,
    /// Redirect to the requested URL after logout when it matches a
    /// registered service.
    pub follow_service_redirects: bool,
}

impl Default for LogoutConfig {
    fn default() -> Self {
        Self {
            confirm: true,
            follow_service_redirects: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MfaConfig {
    /// Allow users to trust the current device after a second factor.
    pub trusted_devices_enabled: bool,
    /// Trust the device after every successful second factor, with an
    /// auto-generated name, without asking.
    pub auto_trust_devices: bool,
    /// Cookie carrying the browser's device identifier.
    pub device_cookie_name: String,
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            trusted_devices_enabled: true,
            auto_trust_devices: false,
            device_cookie_name: "MFADEVICE".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OidcConfig {
    /// Issuer identifier. Defaults to `<server.prefix>/oidc`.
    pub issuer: Option<String>,
    /// HS256 signing key for ID tokens.
    #[serde(serialize_with = "serialize_redacted")]
    pub signing_secret: SecretString,
    pub id_token_timeout_secs: u64,
    pub clients: Vec<OidcClientConfig>,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            signing_secret: SecretString::from(String::new()),
            id_token_timeout_secs: 60 * 60,
            clients: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OidcClientConfig {
    pub client_id: String,
    #[serde(serialize_with = "serialize_redacted")]
    pub client_secret: SecretString,
    #[serde(default)]
    pub name: Option<String>,
    /// Redirect URIs, compared by exact string match.
    pub redirect_uris: Vec<String>,
    /// Ask the user for consent before the first code is issued.
    #[serde(default)]
    pub require_consent: bool,
    /// Extra ID token claims, keyed by claim name.
    #[serde(default)]
    pub claims: BTreeMap<String, ClaimDefinition>,
}

fn serialize_redacted<S: Serializer>(_secret: &SecretString, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str("***")
}

impl SsoEngineConfig {
    /// Issuer identifier used in ID tokens and discovery.
    #[must_use]
    pub fn oidc_issuer(&self) -> String {
        self.oidc
            .issuer
            .clone()
            .unwrap_or_else(|| format!("{}/oidc", self.server.prefix.trim_end_matches('/')))
    }
}
