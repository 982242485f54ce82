//! Ticket registry.
//!
//! Owns all ticket state. Every ticket sits behind its own mutex; single-use
//! checks happen entirely under that mutex, so two concurrent redemptions of
//! one ticket can never both succeed.
//!
//! Lock order: a child may lock its parent while held. A parent never holds
//! its own lock while locking a child. Store guards are never held across a
//! ticket lock (the store hands out cloned handles).

use std::sync::Arc;

use parking_lot::Mutex;
use sso_engine_sdk::Principal;
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::domain::clock::Clock;
use crate::domain::error::DomainError;
use crate::domain::expiration::ExpirationPolicy;
use crate::domain::ids::TicketIdGenerator;
use crate::domain::repo::TicketStore;
use crate::domain::ticket::{
    AccessToken, AuthorizationCode, GrantingTicket, ServiceTicket, Ticket, prefix, redact,
};

/// Result of a successful service ticket redemption.
#[derive(Debug, Clone)]
pub struct ValidatedServiceTicket {
    pub principal: Principal,
    pub service: String,
    pub from_new_login: bool,
    pub authentication_date: OffsetDateTime,
}

/// Result of a successful authorization code redemption.
#[derive(Debug, Clone)]
pub struct RedeemedCode {
    pub code: AuthorizationCode,
    pub principal: Principal,
    pub auth_time: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct ResolvedAccessToken {
    pub token: AccessToken,
    pub principal: Principal,
    pub auth_time: OffsetDateTime,
}

/// Outcome of invalidating a TGT.
#[derive(Debug, Clone)]
pub struct Invalidation {
    pub principal: Principal,
    pub revoked_children: usize,
}

/// Externally visible state of a live TGT.
#[derive(Debug, Clone)]
pub struct TgtStatus {
    pub id: String,
    pub principal: String,
    pub created_at: OffsetDateTime,
    pub last_used_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub renewable: bool,
    pub children: usize,
}

pub struct TicketRegistry {
    store: Arc<dyn TicketStore>,
    ids: TicketIdGenerator,
    policy: ExpirationPolicy,
    clock: Arc<dyn Clock>,
}

impl TicketRegistry {
    pub fn new(
        store: Arc<dyn TicketStore>,
        ids: TicketIdGenerator,
        policy: ExpirationPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ids,
            policy,
            clock,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &ExpirationPolicy {
        &self.policy
    }

    #[must_use]
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Number of stored tickets, live or not yet reclaimed.
    pub fn len(&self) -> Result<usize, DomainError> {
        self.store.len()
    }

    // ------------------------------------------------------------------
    // Granting tickets
    // ------------------------------------------------------------------

    #[tracing::instrument(skip_all, fields(principal = %principal.id, renewable = renewable))]
    pub fn create_tgt(&self, principal: Principal, renewable: bool) -> Result<String, DomainError> {
        let now = self.clock.now();
        let id = self.ids.next_id(prefix::TGT);
        let tgt = GrantingTicket {
            id: id.clone(),
            principal,
            created_at: now,
            last_used_at: now,
            renewable,
            invalidated: false,
            children: Vec::new(),
        };
        self.store
            .insert(id.clone(), Arc::new(Mutex::new(Ticket::Granting(tgt))))?;
        info!(tgt = %redact(&id), "Created ticket-granting ticket");
        Ok(id)
    }

    /// Record a use of the TGT (SSO reuse) and return its principal.
    pub fn touch_tgt(&self, tgt_id: &str) -> Result<Principal, DomainError> {
        let now = self.clock.now();
        self.with_live_tgt(tgt_id, now, |tgt| {
            tgt.last_used_at = now;
            Ok(tgt.principal.clone())
        })
    }

    pub fn get_tgt_principal(&self, tgt_id: &str) -> Result<Principal, DomainError> {
        let now = self.clock.now();
        self.with_live_tgt(tgt_id, now, |tgt| Ok(tgt.principal.clone()))
    }

    #[must_use]
    pub fn tgt_is_valid(&self, tgt_id: &str) -> bool {
        self.get_tgt_principal(tgt_id).is_ok()
    }

    pub fn tgt_status(&self, tgt_id: &str) -> Result<TgtStatus, DomainError> {
        let now = self.clock.now();
        self.with_live_tgt(tgt_id, now, |tgt| {
            Ok(TgtStatus {
                id: tgt.id.clone(),
                principal: tgt.principal.id.clone(),
                created_at: tgt.created_at,
                last_used_at: tgt.last_used_at,
                expires_at: self.policy.tgt_expires_at(tgt),
                renewable: tgt.renewable,
                children: tgt.children.len(),
            })
        })
    }

    /// Invalidate a TGT and revoke every descendant ticket.
    ///
    /// Idempotent: returns `None` if the TGT is unknown or already gone.
    #[tracing::instrument(skip_all, fields(tgt = %redact(tgt_id)))]
    pub fn invalidate_tgt(&self, tgt_id: &str) -> Result<Option<Invalidation>, DomainError> {
        let Some(handle) = self.store.get(tgt_id)? else {
            return Ok(None);
        };

        // Mark under the TGT lock first: issuance that takes the lock later
        // observes the flag and fails, issuance that took it earlier has
        // already linked its child and is revoked below.
        let (principal, children) = {
            let mut guard = handle.lock();
            let Ticket::Granting(tgt) = &mut *guard else {
                return Ok(None);
            };
            if tgt.invalidated {
                return Ok(None);
            }
            tgt.invalidated = true;
            (tgt.principal.clone(), std::mem::take(&mut tgt.children))
        };
        self.store.remove(tgt_id)?;

        let mut revoked = 0;
        for child in &children {
            if let Some(child_handle) = self.store.remove(child)? {
                child_handle.lock().revoke();
                revoked += 1;
            }
        }

        info!(
            principal = %principal.id,
            revoked_children = revoked,
            "Invalidated ticket-granting ticket"
        );
        Ok(Some(Invalidation {
            principal,
            revoked_children: revoked,
        }))
    }

    // ------------------------------------------------------------------
    // Service tickets
    // ------------------------------------------------------------------

    /// Issue a service ticket under a live TGT.
    #[tracing::instrument(skip_all, fields(tgt = %redact(tgt_id), service = %service))]
    pub fn create_st(
        &self,
        tgt_id: &str,
        service: &str,
        from_new_login: bool,
    ) -> Result<String, DomainError> {
        let id = self.create_child(tgt_id, prefix::ST, |id, parent, now| {
            Ticket::Service(ServiceTicket {
                id,
                parent,
                service: service.to_owned(),
                created_at: now,
                consumed: false,
                revoked: false,
                from_new_login,
            })
        })?;
        debug!(st = %redact(&id), "Issued service ticket");
        Ok(id)
    }

    /// Redeem a service ticket. Succeeds at most once per ticket.
    ///
    /// Checks run in this order, all under the ticket lock: revoked or
    /// unknown, consumed, expired, parent validity, service. A service
    /// mismatch consumes the ticket.
    #[tracing::instrument(skip_all, fields(st = %redact(st_id), service = %service))]
    pub fn validate_st(
        &self,
        st_id: &str,
        service: &str,
    ) -> Result<ValidatedServiceTicket, DomainError> {
        let now = self.clock.now();
        let handle = self
            .store
            .get(st_id)?
            .ok_or_else(|| DomainError::TicketNotFound(st_id.to_owned()))?;

        let mut guard = handle.lock();
        let Ticket::Service(st) = &mut *guard else {
            return Err(DomainError::TicketNotFound(st_id.to_owned()));
        };
        if st.revoked {
            return Err(DomainError::TicketNotFound(st_id.to_owned()));
        }
        if st.consumed {
            return Err(DomainError::TicketAlreadyConsumed(st_id.to_owned()));
        }
        if self.policy.st_expired(st, now) {
            return Err(DomainError::TicketExpired(st_id.to_owned()));
        }
        let (principal, authentication_date) = self.live_parent(&st.parent, st_id, now)?;
        if st.service != service {
            st.consumed = true;
            return Err(DomainError::ServiceMismatch {
                ticket: st_id.to_owned(),
                service: service.to_owned(),
            });
        }
        st.consumed = true;

        Ok(ValidatedServiceTicket {
            principal,
            service: st.service.clone(),
            from_new_login: st.from_new_login,
            authentication_date,
        })
    }

    // ------------------------------------------------------------------
    // OIDC codes and access tokens
    // ------------------------------------------------------------------

    #[tracing::instrument(skip_all, fields(tgt = %redact(tgt_id), client_id = %client_id))]
    pub fn create_code(
        &self,
        tgt_id: &str,
        client_id: &str,
        redirect_uri: &str,
        scopes: &[String],
        nonce: Option<&str>,
    ) -> Result<String, DomainError> {
        self.create_child(tgt_id, prefix::CODE, |id, parent, now| {
            Ticket::Code(AuthorizationCode {
                id,
                parent,
                client_id: client_id.to_owned(),
                redirect_uri: redirect_uri.to_owned(),
                scopes: scopes.to_vec(),
                nonce: nonce.map(ToOwned::to_owned),
                created_at: now,
                consumed: false,
                revoked: false,
            })
        })
    }

    /// Redeem an authorization code. Same single-use rule as service tickets.
    pub fn consume_code(&self, code_id: &str) -> Result<RedeemedCode, DomainError> {
        let now = self.clock.now();
        let handle = self
            .store
            .get(code_id)?
            .ok_or_else(|| DomainError::TicketNotFound(code_id.to_owned()))?;

        let mut guard = handle.lock();
        let Ticket::Code(code) = &mut *guard else {
            return Err(DomainError::TicketNotFound(code_id.to_owned()));
        };
        if code.revoked {
            return Err(DomainError::TicketNotFound(code_id.to_owned()));
        }
        if code.consumed {
            return Err(DomainError::TicketAlreadyConsumed(code_id.to_owned()));
        }
        if self.policy.code_expired(code, now) {
            return Err(DomainError::TicketExpired(code_id.to_owned()));
        }
        let (principal, auth_time) = self.live_parent(&code.parent, code_id, now)?;
        code.consumed = true;

        Ok(RedeemedCode {
            code: code.clone(),
            principal,
            auth_time,
        })
    }

    pub fn create_access_token(
        &self,
        tgt_id: &str,
        client_id: &str,
        scopes: &[String],
    ) -> Result<String, DomainError> {
        self.create_child(tgt_id, prefix::ACCESS_TOKEN, |id, parent, now| {
            Ticket::Access(AccessToken {
                id,
                parent,
                client_id: client_id.to_owned(),
                scopes: scopes.to_vec(),
                created_at: now,
                revoked: false,
            })
        })
    }

    /// Resolve a bearer token to its principal. Tokens are reusable until
    /// they expire or their TGT is invalidated.
    pub fn resolve_access_token(&self, token_id: &str) -> Result<ResolvedAccessToken, DomainError> {
        let now = self.clock.now();
        let handle = self
            .store
            .get(token_id)?
            .ok_or_else(|| DomainError::TicketNotFound(token_id.to_owned()))?;

        let guard = handle.lock();
        let Ticket::Access(token) = &*guard else {
            return Err(DomainError::TicketNotFound(token_id.to_owned()));
        };
        if token.revoked {
            return Err(DomainError::TicketNotFound(token_id.to_owned()));
        }
        if self.policy.access_token_expired(token, now) {
            return Err(DomainError::TicketExpired(token_id.to_owned()));
        }
        let (principal, auth_time) = self.live_parent(&token.parent, token_id, now)?;

        Ok(ResolvedAccessToken {
            token: token.clone(),
            principal,
            auth_time,
        })
    }

    // ------------------------------------------------------------------
    // Reclamation
    // ------------------------------------------------------------------

    /// Delete expired TGTs together with their children, and children whose
    /// parent is gone. A child of a live TGT stays, consumed or expired, so
    /// replays keep their precise error until the session ends. Only bounds
    /// memory: expiry is always checked on access.
    pub fn reclaim_expired(&self) -> Result<usize, DomainError> {
        let now = self.clock.now();
        let mut reclaimed = 0;

        for (id, handle) in self.store.snapshot()? {
            let (expired, parent) = {
                let guard = handle.lock();
                (
                    self.policy.is_expired(&guard, now),
                    guard.parent().map(ToOwned::to_owned),
                )
            };

            let Some(parent) = parent else {
                if expired && let Some(inv) = self.invalidate_tgt(&id)? {
                    reclaimed += 1 + inv.revoked_children;
                }
                continue;
            };

            if self.store.get(&parent)?.is_none() && self.store.remove(&id)?.is_some() {
                reclaimed += 1;
            }
        }

        if reclaimed > 0 {
            debug!(reclaimed, "Reclaimed expired tickets");
        }
        Ok(reclaimed)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Run `f` on a live TGT while holding its lock.
    fn with_live_tgt<T>(
        &self,
        tgt_id: &str,
        now: OffsetDateTime,
        f: impl FnOnce(&mut GrantingTicket) -> Result<T, DomainError>,
    ) -> Result<T, DomainError> {
        let handle = self
            .store
            .get(tgt_id)?
            .ok_or_else(|| DomainError::TicketNotFound(tgt_id.to_owned()))?;
        let mut guard = handle.lock();
        let Ticket::Granting(tgt) = &mut *guard else {
            return Err(DomainError::TicketNotFound(tgt_id.to_owned()));
        };
        if tgt.invalidated {
            return Err(DomainError::TicketNotFound(tgt_id.to_owned()));
        }
        if self.policy.tgt_expired(tgt, now) {
            return Err(DomainError::TicketExpired(tgt_id.to_owned()));
        }
        f(tgt)
    }

    /// Insert a child ticket and link it to its parent, both under the
    /// parent lock. A successful issuance counts as a use of the TGT.
    fn create_child(
        &self,
        tgt_id: &str,
        id_prefix: &str,
        build: impl FnOnce(String, String, OffsetDateTime) -> Ticket,
    ) -> Result<String, DomainError> {
        let now = self.clock.now();
        self.with_live_tgt(tgt_id, now, |tgt| {
            let id = self.ids.next_id(id_prefix);
            let ticket = build(id.clone(), tgt.id.clone(), now);
            self.store.insert(id.clone(), Arc::new(Mutex::new(ticket)))?;
            tgt.children.push(id.clone());
            tgt.last_used_at = now;
            Ok(id)
        })
    }

    /// Principal and authentication instant of a child's parent. Called
    /// with the child lock held.
    fn live_parent(
        &self,
        parent_id: &str,
        child_id: &str,
        now: OffsetDateTime,
    ) -> Result<(Principal, OffsetDateTime), DomainError> {
        let handle = self
            .store
            .get(parent_id)?
            .ok_or_else(|| DomainError::TicketNotFound(child_id.to_owned()))?;
        let guard = handle.lock();
        let Ticket::Granting(tgt) = &*guard else {
            return Err(DomainError::TicketNotFound(child_id.to_owned()));
        };
        if tgt.invalidated {
            return Err(DomainError::TicketNotFound(child_id.to_owned()));
        }
        if self.policy.tgt_expired(tgt, now) {
            return Err(DomainError::TicketExpired(child_id.to_owned()));
        }
        Ok((tgt.principal.clone(), tgt.created_at))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashSet;
    use std::sync::Barrier;
    use std::thread;

    use time::Duration;
    use tracing_test::traced_test;

    use super::*;
    use crate::domain::test_support::{principal, registry_with_clock};

    const SERVICE: &str = "https://app.example.org/";

    #[test]
    fn validates_exactly_once() {
        let (registry, _clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();
        let st = registry.create_st(&tgt, SERVICE, true).unwrap();

        let ok = registry.validate_st(&st, SERVICE).unwrap();
        assert_eq!(ok.principal.id, "casuser");
        assert!(ok.from_new_login);

        let err = registry.validate_st(&st, SERVICE).unwrap_err();
        assert_eq!(err, DomainError::TicketAlreadyConsumed(st));
    }

    #[test]
    #[traced_test]
    fn logs_carry_only_truncated_ticket_ids() {
        let (registry, _clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();
        let st = registry.create_st(&tgt, SERVICE, true).unwrap();
        registry.validate_st(&st, SERVICE).unwrap();

        assert!(logs_contain("Created ticket-granting ticket"));
        assert!(logs_contain(&redact(&tgt)));
        assert!(!logs_contain(&tgt));
        assert!(!logs_contain(&st));
    }

    #[test]
    fn concurrent_validators_get_exactly_one_success_per_ticket() {
        let (registry, _clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();
        let tickets: Vec<String> = (0..5)
            .map(|_| registry.create_st(&tgt, SERVICE, false).unwrap())
            .collect();

        let callers = 5;
        let barrier = Arc::new(Barrier::new(callers * tickets.len()));
        let mut handles = Vec::new();
        for st in &tickets {
            for _ in 0..callers {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let st = st.clone();
                handles.push(thread::spawn(move || {
                    barrier.wait();
                    (st.clone(), registry.validate_st(&st, SERVICE))
                }));
            }
        }

        let mut successes = Vec::new();
        for handle in handles {
            let (st, res) = handle.join().unwrap();
            match res {
                Ok(_) => successes.push(st),
                Err(e) => assert_eq!(e, DomainError::TicketAlreadyConsumed(st)),
            }
        }

        assert_eq!(successes.len(), tickets.len());
        let unique: HashSet<_> = successes.iter().collect();
        assert_eq!(unique.len(), tickets.len());
    }

    #[test]
    fn service_mismatch_consumes_the_ticket() {
        let (registry, _clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();
        let st = registry.create_st(&tgt, SERVICE, true).unwrap();

        let err = registry
            .validate_st(&st, "https://evil.example.org")
            .unwrap_err();
        assert!(matches!(err, DomainError::ServiceMismatch { .. }));

        let err = registry.validate_st(&st, SERVICE).unwrap_err();
        assert!(matches!(err, DomainError::TicketAlreadyConsumed(_)));
    }

    #[test]
    fn expired_service_ticket_is_reported_as_expired() {
        let (registry, clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();
        let st = registry.create_st(&tgt, SERVICE, true).unwrap();

        clock.advance(Duration::seconds(11));

        let err = registry.validate_st(&st, SERVICE).unwrap_err();
        assert_eq!(err, DomainError::TicketExpired(st));
    }

    #[test]
    fn granting_ticket_id_does_not_validate_as_service_ticket() {
        let (registry, _clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();

        let err = registry.validate_st(&tgt, SERVICE).unwrap_err();
        assert!(matches!(err, DomainError::TicketNotFound(_)));
        assert!(registry.tgt_is_valid(&tgt));
    }

    #[test]
    fn invalidation_revokes_children_and_blocks_issuance() {
        let (registry, _clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();
        let children: Vec<String> = (0..3)
            .map(|_| registry.create_st(&tgt, SERVICE, true).unwrap())
            .collect();
        let code = registry
            .create_code(
                &tgt,
                "client",
                "https://rp/cb",
                &["openid".to_owned()],
                None,
            )
            .unwrap();
        let token = registry
            .create_access_token(&tgt, "client", &["openid".to_owned()])
            .unwrap();

        let inv = registry.invalidate_tgt(&tgt).unwrap().unwrap();
        assert_eq!(inv.revoked_children, 5);

        for st in &children {
            assert!(matches!(
                registry.validate_st(st, SERVICE),
                Err(DomainError::TicketNotFound(_))
            ));
        }
        assert!(matches!(
            registry.consume_code(&code),
            Err(DomainError::TicketNotFound(_))
        ));
        assert!(matches!(
            registry.resolve_access_token(&token),
            Err(DomainError::TicketNotFound(_))
        ));
        assert!(matches!(
            registry.create_st(&tgt, SERVICE, false),
            Err(DomainError::TicketNotFound(_))
        ));
        assert_eq!(registry.len().unwrap(), 0);
    }

    #[test]
    fn invalidation_is_idempotent() {
        let (registry, _clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();

        assert!(registry.invalidate_tgt(&tgt).unwrap().is_some());
        assert!(registry.invalidate_tgt(&tgt).unwrap().is_none());
        assert!(registry.invalidate_tgt("TGT-unknown").unwrap().is_none());
    }

    #[test]
    fn issuance_racing_invalidation_never_survives_it() {
        for _ in 0..50 {
            let (registry, _clock) = registry_with_clock();
            let tgt = registry.create_tgt(principal("casuser"), true).unwrap();
            let barrier = Arc::new(Barrier::new(2));

            let issuer = {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let tgt = tgt.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.create_st(&tgt, SERVICE, false)
                })
            };
            let invalidator = {
                let registry = Arc::clone(&registry);
                let barrier = Arc::clone(&barrier);
                let tgt = tgt.clone();
                thread::spawn(move || {
                    barrier.wait();
                    registry.invalidate_tgt(&tgt)
                })
            };

            let issued = issuer.join().unwrap();
            invalidator.join().unwrap().unwrap();

            if let Ok(st) = issued {
                assert!(registry.validate_st(&st, SERVICE).is_err());
            }
            assert_eq!(registry.len().unwrap(), 0);
        }
    }

    #[test]
    fn parent_expiry_fails_child_validation() {
        let (registry, clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), false).unwrap();
        clock.advance(Duration::hours(2) - Duration::seconds(5));
        let st = registry.create_st(&tgt, SERVICE, false).unwrap();
        clock.advance(Duration::seconds(6));

        assert!(matches!(
            registry.validate_st(&st, SERVICE),
            Err(DomainError::TicketExpired(_))
        ));
        assert!(matches!(
            registry.create_st(&tgt, SERVICE, false),
            Err(DomainError::TicketExpired(_))
        ));
    }

    #[test]
    fn touch_slides_renewable_sessions() {
        let (registry, clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();

        clock.advance(Duration::minutes(90));
        registry.touch_tgt(&tgt).unwrap();
        clock.advance(Duration::minutes(90));

        assert!(registry.tgt_is_valid(&tgt));
    }

    #[test]
    fn code_is_single_use() {
        let (registry, _clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();
        let code = registry
            .create_code(
                &tgt,
                "client",
                "https://rp/cb",
                &["openid".to_owned()],
                Some("n-1"),
            )
            .unwrap();

        let redeemed = registry.consume_code(&code).unwrap();
        assert_eq!(redeemed.code.nonce.as_deref(), Some("n-1"));
        assert!(matches!(
            registry.consume_code(&code),
            Err(DomainError::TicketAlreadyConsumed(_))
        ));
    }

    #[test]
    fn reclaim_removes_expired_sessions_with_their_children() {
        let (registry, clock) = registry_with_clock();
        let keep = registry.create_tgt(principal("alice"), true).unwrap();
        let stale = registry.create_tgt(principal("bob"), false).unwrap();
        registry.create_st(&keep, SERVICE, false).unwrap();
        registry.create_st(&stale, SERVICE, false).unwrap();

        clock.advance(Duration::minutes(30));
        // both service tickets are past their timeout, their TGTs are not
        assert_eq!(registry.reclaim_expired().unwrap(), 0);
        assert_eq!(registry.tgt_status(&keep).unwrap().children, 1);

        clock.advance(Duration::hours(2));
        assert_eq!(registry.reclaim_expired().unwrap(), 4);
        assert_eq!(registry.len().unwrap(), 0);
    }

    #[test]
    fn replay_after_reclaim_is_still_reported_as_consumed() {
        let (registry, clock) = registry_with_clock();
        let tgt = registry.create_tgt(principal("casuser"), true).unwrap();
        let consumed = registry.create_st(&tgt, SERVICE, true).unwrap();
        let unused = registry.create_st(&tgt, SERVICE, true).unwrap();
        registry.validate_st(&consumed, SERVICE).unwrap();

        clock.advance(Duration::seconds(11));
        registry.reclaim_expired().unwrap();

        assert_eq!(
            registry.validate_st(&consumed, SERVICE).unwrap_err(),
            DomainError::TicketAlreadyConsumed(consumed)
        );
        assert_eq!(
            registry.validate_st(&unused, SERVICE).unwrap_err(),
            DomainError::TicketExpired(unused)
        );
    }
}
