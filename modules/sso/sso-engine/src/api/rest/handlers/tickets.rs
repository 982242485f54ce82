//! REST ticket API.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Form, Path};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tracing::{field::Empty, info};

use super::ApiResult;
use crate::api::rest::dto::{
    AuthenticationDto, RestCredentialsForm, RestServiceForm, TgtStatusDto, UserAuthenticationDto,
};
use crate::domain::error::DomainError;
use crate::module::SsoEngine;

/// Explicit surrogate target for REST authentication.
pub const SURROGATE_HEADER: &str = "x-surrogate-principal";

fn surrogate_target(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SURROGATE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToOwned::to_owned)
}

fn plain(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

/// `POST /v1/tickets`: authenticate and create a TGT.
#[tracing::instrument(skip(engine, headers, form), fields(username = %form.username, request_id = Empty))]
pub async fn create_tgt(
    Extension(engine): Extension<Arc<SsoEngine>>,
    headers: HeaderMap,
    Form(form): Form<RestCredentialsForm>,
) -> ApiResult<Response> {
    let (tgt, principal) = engine
        .sessions()
        .authenticate_direct(
            form.credential(),
            surrogate_target(&headers),
            form.token.as_deref(),
        )
        .await?;
    info!(principal = %principal.id, "Created TGT over REST");

    let location = format!(
        "{}/v1/tickets/{tgt}",
        engine.config().server.prefix.trim_end_matches('/')
    );
    let mut response = plain(StatusCode::CREATED, tgt);
    if let Ok(value) = HeaderValue::from_str(&location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    Ok(response)
}

/// `POST /v1/tickets/{tgt}`: issue a service ticket.
#[tracing::instrument(skip(engine, tgt, form), fields(service = %form.service, request_id = Empty))]
pub async fn create_st(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Path(tgt): Path<String>,
    Form(form): Form<RestServiceForm>,
) -> ApiResult<Response> {
    if form.service.trim().is_empty() {
        return Err(DomainError::validation("'service' is required").into());
    }
    let st = engine.sessions().issue_service_ticket(&tgt, &form.service)?;
    Ok(plain(StatusCode::OK, st))
}

/// `GET /v1/tickets/{tgt}`: state of a live TGT.
pub async fn tgt_status(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Path(tgt): Path<String>,
) -> ApiResult<Json<TgtStatusDto>> {
    let status = engine.registry().tgt_status(&tgt)?;
    Ok(Json(status.into()))
}

/// `DELETE /v1/tickets/{tgt}`: logout.
pub async fn delete_tgt(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Path(tgt): Path<String>,
) -> ApiResult<Response> {
    engine.sessions().logout(Some(&tgt), None)?;
    Ok(plain(StatusCode::OK, tgt))
}

/// `POST /v1/users`: authenticate without creating a session.
#[tracing::instrument(skip(engine, headers, form), fields(username = %form.username, request_id = Empty))]
pub async fn authenticate_user(
    Extension(engine): Extension<Arc<SsoEngine>>,
    headers: HeaderMap,
    Form(form): Form<RestCredentialsForm>,
) -> ApiResult<Json<UserAuthenticationDto>> {
    let principal = engine
        .sessions()
        .verify_credentials(
            form.credential(),
            surrogate_target(&headers),
            form.token.as_deref(),
        )
        .await?;
    Ok(Json(UserAuthenticationDto {
        authentication: AuthenticationDto::new(principal, engine.registry().now()),
    }))
}
