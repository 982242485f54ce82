//! SSO engine assembly: wires the domain services from configuration and
//! collaborator plugins, and owns the HTTP router and the reclamation task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use sso_engine_sdk::{
    AupPluginClient, CredentialResolverPluginClient, SecondFactorPluginClient,
    ServiceTicketValidatorClient, SurrogateAuthorizationPluginClient,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};
use tracing::{debug, info, warn};

use crate::api::rest::routes;
use crate::config::SsoEngineConfig;
use crate::domain::clock::Clock;
use crate::domain::expiration::ExpirationPolicy;
use crate::domain::ids::TicketIdGenerator;
use crate::domain::oidc::OidcIssuer;
use crate::domain::registry::TicketRegistry;
use crate::domain::services::ServiceRegistry;
use crate::domain::session::{SessionCollaborators, SessionManager, SessionSettings};
use crate::domain::surrogate::SurrogateResolver;
use crate::domain::trust::TrustRegistry;
use crate::domain::validator::ServiceTicketValidator;
use crate::domain::SsoLocalClient;
use crate::infra::storage::InMemoryTicketStore;

const BODY_LIMIT_BYTES: usize = 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// External collaborators the engine consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub credentials: Arc<dyn CredentialResolverPluginClient>,
    pub second_factor: Arc<dyn SecondFactorPluginClient>,
    /// Without a policy store the usage policy step is skipped.
    pub aup: Option<Arc<dyn AupPluginClient>>,
    pub surrogates: Arc<dyn SurrogateAuthorizationPluginClient>,
}

/// The assembled engine. Cheap to share behind an `Arc`.
pub struct SsoEngine {
    config: SsoEngineConfig,
    registry: Arc<TicketRegistry>,
    services: Arc<ServiceRegistry>,
    sessions: Arc<SessionManager>,
    validator: Arc<ServiceTicketValidator>,
    trust: Arc<TrustRegistry>,
    oidc: Arc<OidcIssuer>,
}

impl SsoEngine {
    /// Build the engine.
    ///
    /// # Errors
    /// Returns an error if the registered services or OIDC clients are
    /// misconfigured.
    #[tracing::instrument(skip_all)]
    pub fn new(
        config: SsoEngineConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> anyhow::Result<Arc<Self>> {
        let services = Arc::new(
            ServiceRegistry::from_config(&config.services)
                .context("invalid registered service configuration")?,
        );
        if services.is_empty() {
            warn!("No registered services configured; every service is accepted at login");
        }

        let registry = Arc::new(TicketRegistry::new(
            Arc::new(InMemoryTicketStore::new()),
            TicketIdGenerator::new(config.tickets.node_suffix.clone()),
            ExpirationPolicy::from_config(&config.tickets),
            clock.clone(),
        ));
        let surrogates = Arc::new(SurrogateResolver::new(
            collaborators.credentials.clone(),
            collaborators.surrogates.clone(),
            config.surrogate.attribute_release.clone(),
            config.surrogate.separator.clone(),
        ));
        let trust = Arc::new(TrustRegistry::new(clock));
        let sessions = Arc::new(SessionManager::new(
            registry.clone(),
            services.clone(),
            surrogates,
            trust.clone(),
            SessionCollaborators {
                credentials: collaborators.credentials,
                second_factor: collaborators.second_factor,
                aup: collaborators.aup,
            },
            SessionSettings {
                server_prefix: config.server.prefix.clone(),
                sliding_expiration: config.tickets.tgt_sliding_expiration,
                trusted_devices_enabled: config.mfa.trusted_devices_enabled,
                auto_trust_devices: config.mfa.auto_trust_devices,
                follow_logout_redirects: config.logout.follow_service_redirects,
            },
        ));
        let validator = Arc::new(ServiceTicketValidator::new(registry.clone(), services.clone()));
        let oidc = Arc::new(
            OidcIssuer::from_config(&config, registry.clone())
                .context("invalid oidc configuration")?,
        );

        info!(
            services = services.len(),
            oidc_clients = config.oidc.clients.len(),
            prefix = %config.server.prefix,
            "SSO engine initialized"
        );
        Ok(Arc::new(Self {
            config,
            registry,
            services,
            sessions,
            validator,
            trust,
            oidc,
        }))
    }

    #[must_use]
    pub fn config(&self) -> &SsoEngineConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TicketRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }

    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    #[must_use]
    pub fn validator(&self) -> &Arc<ServiceTicketValidator> {
        &self.validator
    }

    #[must_use]
    pub fn trust(&self) -> &Arc<TrustRegistry> {
        &self.trust
    }

    #[must_use]
    pub fn oidc(&self) -> &Arc<OidcIssuer> {
        &self.oidc
    }

    /// In-process validation client for relying services.
    #[must_use]
    pub fn validator_client(&self) -> Arc<dyn ServiceTicketValidatorClient> {
        Arc::new(SsoLocalClient::new(self.validator.clone()))
    }

    /// HTTP router with the full middleware stack applied.
    pub fn router(self: &Arc<Self>) -> Router {
        let router = routes::register_routes(Router::new(), self.clone());
        apply_middleware_stack(router)
    }

    /// Periodically delete expired tickets until `cancel` fires.
    /// Returns `None` when reclamation is disabled.
    pub fn spawn_reclaimer(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let secs = self.config.tickets.reclaim_interval_secs;
        if secs == 0 {
            info!("Ticket reclamation disabled");
            return None;
        }

        let engine = self.clone();
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(secs));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("Ticket reclaimer stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        match engine.registry.reclaim_expired() {
                            Ok(0) => {}
                            Ok(n) => debug!(reclaimed = n, "Reclaimed expired tickets"),
                            Err(e) => warn!(error = %e, "Ticket reclamation failed"),
                        }
                    }
                }
            }
        }))
    }

    /// Bind and serve until `cancel` fires.
    ///
    /// # Errors
    /// Returns an error if the socket cannot be bound or the server fails.
    pub async fn serve(
        self: Arc<Self>,
        addr: SocketAddr,
        cancel: CancellationToken,
    ) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        info!("HTTP server bound on {}", addr);

        let shutdown = {
            let cancel = cancel.clone();
            async move {
                cancel.cancelled().await;
                info!("HTTP server shutting down gracefully (cancellation)");
            }
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }
}

fn apply_middleware_stack(mut router: Router) -> Router {
    // Body limit
    router = router.layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES));
    router = router.layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    // Timeout
    router = router.layer(TimeoutLayer::with_status_code(
        axum::http::StatusCode::GATEWAY_TIMEOUT,
        REQUEST_TIMEOUT,
    ));

    // Trace
    router = router.layer({
        use tower_http::trace::TraceLayer;
        use tracing::field::Empty;

        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<axum::body::Body>| {
                let rid = req
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("n/a");

                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri().path(),
                    module = "sso_engine",
                    request_id = %rid,
                    status = Empty,
                    latency_ms = Empty,
                )
            })
            .on_response(
                |res: &axum::http::Response<axum::body::Body>,
                 latency: std::time::Duration,
                 span: &tracing::Span| {
                    span.record("status", res.status().as_u16());
                    span.record("latency_ms", latency.as_millis());
                },
            )
    });

    // Request ID: generate if missing, then echo it on the response.
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");
    router = router.layer(PropagateRequestIdLayer::new(x_request_id.clone()));
    router.layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
}
