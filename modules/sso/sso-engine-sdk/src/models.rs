//! Domain models for the SSO engine.

use std::collections::BTreeMap;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Values of a single (possibly multi-valued) attribute.
pub type AttributeValues = Vec<String>;

/// Attribute names attached to every surrogate authentication.
pub mod surrogate_attributes {
    /// The delegate that authenticated.
    pub const SURROGATE_USER: &str = "surrogateUser";
    /// Always `"true"` for surrogate authentications.
    pub const SURROGATE_ENABLED: &str = "surrogateEnabled";
    /// The target principal being acted upon.
    pub const SURROGATE_PRINCIPAL: &str = "surrogatePrincipal";

    /// All mandatory surrogate attribute names.
    pub const ALL: [&str; 3] = [SURROGATE_USER, SURROGATE_ENABLED, SURROGATE_PRINCIPAL];
}

/// Multi-valued attribute mapping released for a principal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, AttributeValues>);

impl Attributes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) an attribute with the given values.
    pub fn insert(&mut self, name: impl Into<String>, values: AttributeValues) {
        self.0.insert(name.into(), values);
    }

    /// Insert (or replace) a single-valued attribute.
    pub fn insert_single(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), vec![value.into()]);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeValues> {
        self.0.get(name)
    }

    /// First value of an attribute, if any.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Keep only the attributes whose name satisfies the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.0.retain(|name, _| keep(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValues)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, AttributeValues)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValues)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, AttributeValues>> for Attributes {
    fn from(map: BTreeMap<String, AttributeValues>) -> Self {
        Self(map)
    }
}

/// An authenticated subject: a stable identifier plus released attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: Attributes::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, values: AttributeValues) -> Self {
        self.attributes.insert(name, values);
        self
    }
}

/// Primary credential submitted by a user.
#[derive(Debug)]
pub enum Credential {
    /// Classic username and password.
    UsernamePassword {
        username: String,
        password: SecretString,
    },
    /// Username only; the account must be enrolled for passwordless login
    /// and always proceeds to its multifactor provider.
    Passwordless { username: String },
}

impl Credential {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::UsernamePassword {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }

    pub fn passwordless(username: impl Into<String>) -> Self {
        Self::Passwordless {
            username: username.into(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::UsernamePassword { username, .. } | Self::Passwordless { username } => username,
        }
    }

    /// Same credential with a different username (used when a surrogate
    /// directive was stripped from the submitted name).
    #[must_use]
    pub fn with_username(self, username: impl Into<String>) -> Self {
        match self {
            Self::UsernamePassword { password, .. } => Self::UsernamePassword {
                username: username.into(),
                password,
            },
            Self::Passwordless { .. } => Self::Passwordless {
                username: username.into(),
            },
        }
    }
}

/// Verdict of the credential resolver for a primary credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPrincipal {
    pub principal: Principal,
    /// Multifactor provider the principal must satisfy, if any
    /// (e.g. `mfa-gauth`, `mfa-yubikey`).
    pub multifactor_provider: Option<String>,
}

/// Acceptable usage policy terms as supplied by the policy collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AupTerms {
    pub code: String,
    pub default_text: String,
}

/// Successful service ticket validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceValidation {
    /// Authenticated principal identifier.
    pub user: String,
    /// Attributes after attribute-release filtering.
    pub attributes: Attributes,
    /// Service the ticket was redeemed for.
    pub service: String,
    /// Whether the ticket came from a fresh credential submission rather than SSO.
    pub from_new_login: bool,
    /// When the underlying SSO session was established.
    pub authentication_date: OffsetDateTime,
}

/// A device a principal chose to trust after completing multifactor
/// authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedDeviceRecord {
    pub id: u64,
    pub name: String,
    pub principal: String,
    pub fingerprint: String,
    #[serde(with = "time::serde::rfc3339")]
    pub record_date: OffsetDateTime,
}
