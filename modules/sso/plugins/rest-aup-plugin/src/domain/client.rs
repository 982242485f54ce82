//! Client implementation for the REST AUP plugin.

use async_trait::async_trait;
use sso_engine_sdk::{AupPluginClient, AupTerms, Principal, SsoError};
use tracing::warn;

use super::service::Service;

#[async_trait]
impl AupPluginClient for Service {
    async fn terms(&self, principal: &Principal) -> Result<AupTerms, SsoError> {
        self.fetch_terms(&principal.id).await.map_err(|e| {
            warn!(principal = %principal.id, error = %e, "Failed to fetch policy terms");
            e.into()
        })
    }

    async fn accept(&self, principal: &Principal) -> Result<(), SsoError> {
        self.record_acceptance(&principal.id).await.map_err(|e| {
            warn!(principal = %principal.id, error = %e, "Failed to record policy acceptance");
            e.into()
        })
    }

    async fn status(&self, principal: &Principal) -> Result<bool, SsoError> {
        self.acceptance_status(&principal.id).await.map_err(|e| {
            warn!(principal = %principal.id, error = %e, "Failed to read policy status");
            e.into()
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use httpmock::prelude::*;
    use tracing_test::traced_test;

    use super::*;
    use crate::config::RestAupPluginConfig;

    #[tokio::test]
    async fn plugin_trait_accept_then_status() {
        let server = MockServer::start_async().await;
        let accept = server
            .mock_async(|when, then| {
                when.method(POST).path("/aup");
                then.status(200);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/aup/status");
                then.status(202);
            })
            .await;

        let service = Service::from_config(&RestAupPluginConfig {
            base_url: server.url("/aup"),
            timeout_ms: 2_000,
        })
        .unwrap();
        let plugin: &dyn AupPluginClient = &service;
        let principal = Principal::new("casuser");

        plugin.accept(&principal).await.unwrap();
        assert!(plugin.status(&principal).await.unwrap());
        accept.assert_async().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn plugin_trait_unreachable_is_collaborator_error() {
        let service = Service::from_config(&RestAupPluginConfig {
            base_url: "http://127.0.0.1:1/aup".to_owned(),
            timeout_ms: 500,
        })
        .unwrap();
        let plugin: &dyn AupPluginClient = &service;

        let result = plugin.status(&Principal::new("casuser")).await;
        assert!(matches!(result, Err(SsoError::CollaboratorUnavailable(_))));
        assert!(logs_contain("Failed to read policy status"));
        assert!(logs_contain("principal=casuser"));
    }
}
