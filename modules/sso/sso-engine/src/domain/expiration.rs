//! Ticket expiration policy.

use time::{Duration, OffsetDateTime};

use crate::config::TicketsConfig;
use crate::domain::ticket::{AccessToken, AuthorizationCode, GrantingTicket, ServiceTicket, Ticket};

#[derive(Debug, Clone, Copy)]
pub struct ExpirationPolicy {
    pub tgt_idle: Duration,
    pub tgt_max: Duration,
    pub st: Duration,
    pub code: Duration,
    pub access_token: Duration,
}

impl ExpirationPolicy {
    #[must_use]
    pub fn from_config(cfg: &TicketsConfig) -> Self {
        Self {
            tgt_idle: secs(cfg.tgt_idle_timeout_secs),
            tgt_max: secs(cfg.tgt_max_lifetime_secs),
            st: secs(cfg.st_timeout_secs),
            code: secs(cfg.code_timeout_secs),
            access_token: secs(cfg.access_token_timeout_secs),
        }
    }

    /// A TGT expires at its hard lifetime, or once idle for longer than the
    /// idle timeout. Non-renewable TGTs measure idleness from creation.
    #[must_use]
    pub fn tgt_expired(&self, tgt: &GrantingTicket, now: OffsetDateTime) -> bool {
        if now >= tgt.created_at + self.tgt_max {
            return true;
        }
        let idle_from = if tgt.renewable {
            tgt.last_used_at
        } else {
            tgt.created_at
        };
        now >= idle_from + self.tgt_idle
    }

    /// Instant the TGT expires if it is not used again.
    #[must_use]
    pub fn tgt_expires_at(&self, tgt: &GrantingTicket) -> OffsetDateTime {
        let idle_from = if tgt.renewable {
            tgt.last_used_at
        } else {
            tgt.created_at
        };
        (idle_from + self.tgt_idle).min(tgt.created_at + self.tgt_max)
    }

    #[must_use]
    pub fn st_expired(&self, st: &ServiceTicket, now: OffsetDateTime) -> bool {
        now >= st.created_at + self.st
    }

    #[must_use]
    pub fn code_expired(&self, code: &AuthorizationCode, now: OffsetDateTime) -> bool {
        now >= code.created_at + self.code
    }

    #[must_use]
    pub fn access_token_expired(&self, token: &AccessToken, now: OffsetDateTime) -> bool {
        now >= token.created_at + self.access_token
    }

    /// Own expiry of a ticket, ignoring its parent.
    #[must_use]
    pub fn is_expired(&self, ticket: &Ticket, now: OffsetDateTime) -> bool {
        match ticket {
            Ticket::Granting(t) => self.tgt_expired(t, now),
            Ticket::Service(t) => self.st_expired(t, now),
            Ticket::Code(t) => self.code_expired(t, now),
            Ticket::Access(t) => self.access_token_expired(t, now),
        }
    }
}

impl Default for ExpirationPolicy {
    fn default() -> Self {
        Self::from_config(&TicketsConfig::default())
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}
