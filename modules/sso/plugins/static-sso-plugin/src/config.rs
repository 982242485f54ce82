//! Configuration for the static SSO plugin.

use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::{Deserialize, Serialize, Serializer};

/// Plugin configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticSsoPluginConfig {
    /// Known accounts.
    pub users: Vec<UserConfig>,

    /// Delegate → targets it may impersonate. `*` allows any target.
    pub surrogates: BTreeMap<String, Vec<String>>,

    /// Acceptable usage policy store.
    pub aup: AupConfig,
}

/// One account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub username: String,

    /// Required unless the account is passwordless.
    #[serde(default, serialize_with = "serialize_redacted")]
    pub password: Option<SecretString>,

    /// Username-only login, always followed by the multifactor provider.
    #[serde(default)]
    pub passwordless: bool,

    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,

    /// Multifactor provider the account must satisfy.
    #[serde(default)]
    pub mfa_provider: Option<String>,

    /// Tokens accepted by the provider; reusable.
    #[serde(default)]
    pub otp_tokens: Vec<String>,

    /// Scratch codes; each works once.
    #[serde(default)]
    pub scratch_codes: Vec<String>,
}

/// Usage policy store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AupConfig {
    /// Wire the policy store into the engine.
    pub enabled: bool,
    /// Message code of the terms.
    pub code: String,
    pub default_text: String,
    /// Principals that accepted the policy at startup.
    pub accepted: Vec<String>,
}

const DEFAULT_AUP_TEXT: &str = "By using this service you agree to the acceptable usage policy.";

impl Default for AupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            code: "screen.aup.policyterms".to_owned(),
            default_text: DEFAULT_AUP_TEXT.to_owned(),
            accepted: Vec::new(),
        }
    }
}

fn serialize_redacted<S: Serializer>(
    secret: &Option<SecretString>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(_) => s.serialize_some("***"),
        None => s.serialize_none(),
    }
}
