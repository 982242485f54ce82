//! Surrogate authentication: a delegate authenticates on behalf of a target.

use std::sync::Arc;

use sso_engine_sdk::{
    CredentialResolverPluginClient, Principal, SurrogateAuthorizationPluginClient,
    surrogate_attributes,
};
use tracing::{info, warn};

use crate::domain::error::DomainError;
use crate::domain::services::AttributeReleaseConfig;

/// Resolved surrogate authentication for one login transaction.
#[derive(Debug, Clone)]
pub struct SurrogateContext {
    pub delegate: Principal,
    /// The target, with the surrogate release policy applied and the
    /// surrogate attributes added.
    pub target: Principal,
}

pub struct SurrogateResolver {
    credentials: Arc<dyn CredentialResolverPluginClient>,
    authorizations: Arc<dyn SurrogateAuthorizationPluginClient>,
    release: AttributeReleaseConfig,
    separator: String,
}

impl SurrogateResolver {
    pub fn new(
        credentials: Arc<dyn CredentialResolverPluginClient>,
        authorizations: Arc<dyn SurrogateAuthorizationPluginClient>,
        release: AttributeReleaseConfig,
        separator: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            authorizations,
            release,
            separator: separator.into(),
        }
    }

    /// Split `target<sep>delegate` into `(target, delegate)`.
    #[must_use]
    pub fn split_username<'a>(&self, username: &'a str) -> Option<(&'a str, &'a str)> {
        if self.separator.is_empty() {
            return None;
        }
        let (target, delegate) = username.split_once(self.separator.as_str())?;
        let (target, delegate) = (target.trim(), delegate.trim());
        if target.is_empty() || delegate.is_empty() {
            return None;
        }
        Some((target, delegate))
    }

    /// Let `delegate` act as `target_id`.
    ///
    /// Authorization is checked before the target is looked up, so an
    /// unauthorized delegate cannot discover which principals exist.
    #[tracing::instrument(skip_all, fields(delegate = %delegate.id, target = %target_id))]
    pub async fn resolve_surrogate(
        &self,
        delegate: &Principal,
        target_id: &str,
    ) -> Result<SurrogateContext, DomainError> {
        let allowed = self
            .authorizations
            .can_impersonate(&delegate.id, target_id)
            .await
            .map_err(DomainError::from)?;
        if !allowed {
            warn!("Surrogate authentication denied");
            return Err(DomainError::SurrogateNotAuthorized {
                delegate: delegate.id.clone(),
                target: target_id.to_owned(),
            });
        }

        let target = self
            .credentials
            .lookup(target_id)
            .await
            .map_err(DomainError::from)?
            .ok_or_else(|| DomainError::UnknownSurrogateTarget(target_id.to_owned()))?;

        let mut attributes = self.release.apply(&target.attributes);
        attributes.insert_single(surrogate_attributes::SURROGATE_USER, delegate.id.clone());
        attributes.insert_single(surrogate_attributes::SURROGATE_ENABLED, "true");
        attributes.insert_single(surrogate_attributes::SURROGATE_PRINCIPAL, target.id.clone());

        info!("Surrogate authentication established");
        Ok(SurrogateContext {
            delegate: delegate.clone(),
            target: Principal {
                id: target.id,
                attributes,
            },
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::test_support::{FakeCredentials, FakeSurrogates};

    fn resolver() -> SurrogateResolver {
        let credentials = FakeCredentials::default()
            .with_user("casuser", "Mellon", &[("cn", "CAS")])
            .with_user(
                "user3",
                "pass",
                &[("fname", "Jane"), ("lname", "Doe"), ("employeeNumber", "123")],
            );
        let surrogates = FakeSurrogates::default().allow("casuser", "user3");
        SurrogateResolver::new(
            Arc::new(credentials),
            Arc::new(surrogates),
            AttributeReleaseConfig::ReturnAllowed {
                allowed: vec!["employeeNumber".to_owned()],
            },
            "+",
        )
    }

    #[test]
    fn splits_target_and_delegate() {
        let r = resolver();
        assert_eq!(
            r.split_username("user3+casuser"),
            Some(("user3", "casuser"))
        );
        assert_eq!(r.split_username("casuser"), None);
        assert_eq!(r.split_username("+casuser"), None);
    }

    #[tokio::test]
    async fn surrogate_attributes_are_added_and_filtered() {
        let ctx = resolver()
            .resolve_surrogate(&Principal::new("casuser"), "user3")
            .await
            .unwrap();

        let attrs = &ctx.target.attributes;
        assert_eq!(ctx.target.id, "user3");
        assert_eq!(attrs.first("surrogateUser"), Some("casuser"));
        assert_eq!(attrs.first("surrogateEnabled"), Some("true"));
        assert_eq!(attrs.first("surrogatePrincipal"), Some("user3"));
        assert_eq!(attrs.first("employeeNumber"), Some("123"));
        assert!(!attrs.contains("fname"));
        assert!(!attrs.contains("lname"));
    }

    #[tokio::test]
    async fn unauthorized_delegate_is_rejected_before_lookup() {
        let err = resolver()
            .resolve_surrogate(&Principal::new("casuser"), "nobody")
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SurrogateNotAuthorized { .. }));
    }

    #[tokio::test]
    async fn unknown_target_is_reported() {
        let credentials = FakeCredentials::default().with_user("casuser", "Mellon", &[]);
        let surrogates = FakeSurrogates::default().allow("casuser", "ghost");
        let r = SurrogateResolver::new(
            Arc::new(credentials),
            Arc::new(surrogates),
            AttributeReleaseConfig::ReturnAll,
            "+",
        );

        let err = r
            .resolve_surrogate(&Principal::new("casuser"), "ghost")
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::UnknownSurrogateTarget("ghost".to_owned()));
    }
}
