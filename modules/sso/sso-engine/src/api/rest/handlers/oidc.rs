//! OIDC authorization-code endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Form, Query, RawQuery};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};
use tracing::{field::Empty, warn};
use url::Url;

use super::{ApiResult, PageError, found};
use crate::api::rest::cookies::read_cookie;
use crate::api::rest::dto::{ConsentForm, OAuthErrorDto, ProfileQuery, TokenParams};
use crate::api::rest::error::Problem;
use crate::api::rest::views;
use crate::domain::error::DomainError;
use crate::domain::oidc::{AuthorizationRequest, TokenResponse};
use crate::module::SsoEngine;

/// `GET /oidc/authorize`
///
/// Unauthenticated browsers are sent through `/login` with this endpoint
/// as the (internal) service, so they come back here once logged in.
#[tracing::instrument(skip_all, fields(client_id = %request.client_id, request_id = Empty))]
pub async fn authorize(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Query(request): Query<AuthorizationRequest>,
    RawQuery(raw): RawQuery,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let client = engine.oidc().check_authorization_request(&request)?;

    let tgc = read_cookie(&headers, &engine.config().tgc.name);
    let Some(principal) = engine.sessions().session_principal(tgc.as_deref()) else {
        let back = format!(
            "{}/oidc/authorize?{}",
            engine.config().server.prefix.trim_end_matches('/'),
            raw.unwrap_or_default()
        );
        let query = serde_urlencoded::to_string([("service", back.as_str())])
            .map_err(|e| DomainError::internal(e.to_string()))?;
        return Ok(found(&format!("/login?{query}")));
    };

    let oidc = engine.oidc();
    if oidc.needs_consent(&principal.id, &client.client_id) {
        let page = views::consent_page(&client.name, &principal.id, &request);
        return Ok(page.into_response());
    }

    let tgt = tgc.unwrap_or_default();
    let location = oidc.issue_authorization_code(&tgt, &request)?;
    Ok(found(&location))
}

/// `POST /oidc/authorize`: consent decision.
#[tracing::instrument(skip_all, fields(client_id = %form.client_id, request_id = Empty))]
pub async fn consent(
    Extension(engine): Extension<Arc<SsoEngine>>,
    headers: HeaderMap,
    Form(form): Form<ConsentForm>,
) -> Result<Response, PageError> {
    let allowed = form.allowed();
    let request = form.into_request();
    engine.oidc().check_authorization_request(&request)?;

    let tgc = read_cookie(&headers, &engine.config().tgc.name);
    let principal = engine
        .sessions()
        .session_principal(tgc.as_deref())
        .ok_or_else(|| DomainError::AuthenticationFailed("no single sign-on session".to_owned()))?;

    if !allowed {
        warn!(principal = %principal.id, "Consent denied");
        let mut url = Url::parse(&request.redirect_uri)
            .map_err(|e| DomainError::validation(format!("invalid redirect_uri: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("error", "access_denied");
            if let Some(state) = &request.state {
                query.append_pair("state", state);
            }
        }
        return Ok(found(url.as_str()));
    }

    let oidc = engine.oidc();
    oidc.grant_consent(&principal.id, &request.client_id);
    let tgt = tgc.unwrap_or_default();
    let location = oidc.issue_authorization_code(&tgt, &request)?;
    Ok(found(&location))
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_owned(), secret.to_owned()))
}

fn oauth_error(e: &DomainError) -> Response {
    let (status, error) = match e {
        DomainError::InvalidGrant(_) => (StatusCode::BAD_REQUEST, "invalid_grant"),
        DomainError::InvalidClient(_) => (StatusCode::UNAUTHORIZED, "invalid_client"),
        DomainError::Validation(msg) if msg.starts_with("unsupported grant_type") => {
            (StatusCode::BAD_REQUEST, "unsupported_grant_type")
        }
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        DomainError::StorageUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "server_error"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
    };
    if status.is_server_error() {
        tracing::error!(error = %e, "Token request failed");
    }
    let description = if status.is_server_error() {
        "internal error".to_owned()
    } else {
        e.to_string()
    };
    (
        status,
        [(header::CACHE_CONTROL, "no-store")],
        Json(OAuthErrorDto {
            error,
            error_description: description,
        }),
    )
        .into_response()
}

fn token(engine: &SsoEngine, headers: &HeaderMap, params: TokenParams) -> Response {
    let request = params.into_request(basic_credentials(headers));
    match engine.oidc().exchange_code(&request) {
        Ok(response) => token_response(response),
        Err(e) => oauth_error(&e),
    }
}

fn token_response(response: TokenResponse) -> Response {
    (
        [(header::CACHE_CONTROL, "no-store"), (header::PRAGMA, "no-cache")],
        Json(response),
    )
        .into_response()
}

/// `GET /oidc/token`
pub async fn token_get(
    Extension(engine): Extension<Arc<SsoEngine>>,
    headers: HeaderMap,
    Query(params): Query<TokenParams>,
) -> Response {
    token(&engine, &headers, params)
}

/// `POST /oidc/token`
pub async fn token_post(
    Extension(engine): Extension<Arc<SsoEngine>>,
    headers: HeaderMap,
    Form(params): Form<TokenParams>,
) -> Response {
    token(&engine, &headers, params)
}

/// `GET /oidc/profile`: claims for a bearer access token.
pub async fn profile(
    Extension(engine): Extension<Arc<SsoEngine>>,
    headers: HeaderMap,
    Query(query): Query<ProfileQuery>,
) -> ApiResult<Json<Map<String, Value>>> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_owned());
    let Some(access_token) = bearer.or(query.access_token) else {
        let problem = Problem::new(
            StatusCode::UNAUTHORIZED,
            "Invalid Token",
            "missing access token",
        );
        return Err(problem.with_code("invalid_token"));
    };

    match engine.oidc().user_info(&access_token) {
        Ok(claims) => Ok(Json(claims)),
        Err(e @ (DomainError::TicketNotFound(_) | DomainError::TicketExpired(_))) => {
            let problem = Problem::new(StatusCode::UNAUTHORIZED, "Invalid Token", e.to_string());
            Err(problem.with_code("invalid_token"))
        }
        Err(other) => Err(other.into()),
    }
}

/// `GET /oidc/.well-known/openid-configuration`
pub async fn discovery(Extension(engine): Extension<Arc<SsoEngine>>) -> Json<Value> {
    Json(engine.oidc().discovery())
}
