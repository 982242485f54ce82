use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};

use crate::api::rest::handlers::{self, login, oidc, tickets, trust, validate};
use crate::module::SsoEngine;

pub const TRUSTED_DEVICES: &str = "/actuator/multifactorTrustedDevices";

#[allow(clippy::needless_pass_by_value)] // Arc is intentionally passed by value for Extension layer
pub fn register_routes(mut router: Router, engine: Arc<SsoEngine>) -> Router {
    // Browser login and logout
    router = router
        .route("/login", get(login::login_form).post(login::submit_login))
        .route("/login/aup", post(login::submit_aup))
        .route("/login/aup/status", get(login::aup_status))
        .route("/login/mfa", post(login::submit_mfa))
        .route(
            "/logout",
            get(login::logout_form).post(login::submit_logout),
        );

    // Service ticket validation
    router = router
        .route(
            "/serviceValidate",
            get(validate::service_validate_get).post(validate::service_validate_post),
        )
        .route(
            "/p3/serviceValidate",
            get(validate::p3_service_validate_get).post(validate::p3_service_validate_post),
        );

    // REST ticket API
    router = router
        .route("/v1/tickets", post(tickets::create_tgt))
        .route(
            "/v1/tickets/{tgt}",
            post(tickets::create_st)
                .get(tickets::tgt_status)
                .delete(tickets::delete_tgt),
        )
        .route("/v1/users", post(tickets::authenticate_user));

    // Trusted devices
    router = router
        .route(TRUSTED_DEVICES, get(trust::list_all))
        .route(&format!("{TRUSTED_DEVICES}/export"), get(trust::export))
        .route(&format!("{TRUSTED_DEVICES}/import"), post(trust::import))
        .route(
            &format!("{TRUSTED_DEVICES}/{{key}}"),
            get(trust::list_by_principal).delete(trust::delete_record),
        );

    // OIDC
    router = router
        .route("/oidc/authorize", get(oidc::authorize).post(oidc::consent))
        .route("/oidc/token", get(oidc::token_get).post(oidc::token_post))
        .route("/oidc/profile", get(oidc::profile))
        .route(
            "/oidc/.well-known/openid-configuration",
            get(oidc::discovery),
        );

    router
        .route("/health", get(handlers::health))
        .layer(Extension(engine))
}
