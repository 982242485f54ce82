//! Ticket model.
//!
//! A granting ticket owns the ids of its children. Every child records the
//! id of its parent. There are no direct references in either direction;
//! both sides are resolved through the registry.

use std::sync::Arc;

use parking_lot::Mutex;
use sso_engine_sdk::Principal;
use time::OffsetDateTime;

/// Shared, individually locked ticket entry.
pub type TicketHandle = Arc<Mutex<Ticket>>;

/// Ticket id prefixes.
pub mod prefix {
    pub const TGT: &str = "TGT";
    pub const ST: &str = "ST";
    pub const CODE: &str = "OC";
    pub const ACCESS_TOKEN: &str = "AT";
}

#[derive(Debug, Clone)]
pub enum Ticket {
    Granting(GrantingTicket),
    Service(ServiceTicket),
    Code(AuthorizationCode),
    Access(AccessToken),
}

impl Ticket {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Granting(t) => &t.id,
            Self::Service(t) => &t.id,
            Self::Code(t) => &t.id,
            Self::Access(t) => &t.id,
        }
    }

    /// Parent TGT id of a child ticket.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        match self {
            Self::Granting(_) => None,
            Self::Service(t) => Some(&t.parent),
            Self::Code(t) => Some(&t.parent),
            Self::Access(t) => Some(&t.parent),
        }
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Granting(_) => "tgt",
            Self::Service(_) => "st",
            Self::Code(_) => "code",
            Self::Access(_) => "access_token",
        }
    }

    /// Mark a child ticket as revoked by logout.
    pub fn revoke(&mut self) {
        match self {
            Self::Granting(t) => t.invalidated = true,
            Self::Service(t) => t.revoked = true,
            Self::Code(t) => t.revoked = true,
            Self::Access(t) => t.revoked = true,
        }
    }
}

/// An authenticated SSO session.
#[derive(Debug, Clone)]
pub struct GrantingTicket {
    pub id: String,
    /// Principal with surrogate release already applied.
    pub principal: Principal,
    pub created_at: OffsetDateTime,
    pub last_used_at: OffsetDateTime,
    /// Sliding idle window.
    pub renewable: bool,
    pub invalidated: bool,
    pub children: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServiceTicket {
    pub id: String,
    pub parent: String,
    pub service: String,
    pub created_at: OffsetDateTime,
    pub consumed: bool,
    pub revoked: bool,
    pub from_new_login: bool,
}

/// OIDC authorization code: a single-use service ticket bound to a client
/// and an exact redirect URI.
#[derive(Debug, Clone)]
pub struct AuthorizationCode {
    pub id: String,
    pub parent: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub nonce: Option<String>,
    pub created_at: OffsetDateTime,
    pub consumed: bool,
    pub revoked: bool,
}

/// Opaque OIDC bearer token.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub id: String,
    pub parent: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub created_at: OffsetDateTime,
    pub revoked: bool,
}

/// Shortened ticket id for log fields.
#[must_use]
pub fn redact(id: &str) -> String {
    let mut parts = id.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(prefix), Some(seq), Some(rest)) => {
            let head: String = rest.chars().take(6).collect();
            format!("{prefix}-{seq}-{head}...")
        }
        _ => id.chars().take(8).collect(),
    }
}
