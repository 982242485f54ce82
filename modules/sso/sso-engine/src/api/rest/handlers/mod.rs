//! HTTP handlers, grouped by surface.

pub mod login;
pub mod oidc;
pub mod tickets;
pub mod trust;
pub mod validate;

use std::sync::Arc;

use axum::Json;
use axum::extract::Extension;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::api::rest::dto::HealthDto;
use crate::api::rest::error::{Problem, classify};
use crate::api::rest::views;
use crate::domain::error::DomainError;
use crate::module::SsoEngine;

pub type ApiResult<T> = Result<T, Problem>;

/// Domain error rendered as an HTML page, for browser-facing endpoints.
#[derive(Debug)]
pub struct PageError(pub DomainError);

impl From<DomainError> for PageError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, title, _) = classify(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let detail = match &self.0 {
            DomainError::Internal(_) => "internal error".to_owned(),
            other => other.to_string(),
        };
        (status, views::error_page(title, &detail)).into_response()
    }
}

/// `302 Found` to `location`.
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => PageError(DomainError::validation("redirect location is not a valid header"))
            .into_response(),
    }
}

/// Append `Set-Cookie` headers to a response.
pub fn with_cookies(
    mut response: Response,
    cookies: impl IntoIterator<Item = HeaderValue>,
) -> Response {
    for cookie in cookies {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

/// Liveness and registry size.
pub async fn health(Extension(engine): Extension<Arc<SsoEngine>>) -> ApiResult<Json<HealthDto>> {
    let tickets = engine.registry().len()?;
    Ok(Json(HealthDto {
        status: "ok",
        tickets,
        pending_flows: engine.sessions().pending_flows(),
    }))
}
