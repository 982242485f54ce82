//! Browser login, usage policy, second factor and logout.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Extension, Form, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::field::Empty;

use super::{ApiResult, PageError, found, with_cookies};
use crate::api::rest::cookies::{clear_tgc_cookie, device_context, read_cookie, tgc_cookie};
use crate::api::rest::dto::{
    AupForm, AupStatusDto, FlowQuery, LoginForm, LoginQuery, LogoutParams, MfaForm,
};
use crate::api::rest::views;
use crate::domain::error::DomainError;
use crate::domain::session::{CredentialSubmission, LoginOutcome, TrustRequest};
use crate::module::SsoEngine;

const AUTHENTICATION_FAILED_MESSAGE: &str =
    "Authentication attempt has failed, likely due to invalid credentials. Please verify and try again.";
const SURROGATE_FAILED_MESSAGE: &str =
    "You are not authorized to impersonate the requested account.";
const INVALID_TOKEN_MESSAGE: &str = "The token you provided is invalid. Please try again.";

fn tgc(engine: &SsoEngine, headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, &engine.config().tgc.name)
}

fn render_outcome(engine: &SsoEngine, outcome: LoginOutcome, renew: bool) -> Response {
    match outcome {
        LoginOutcome::CredentialsRequired { service } => {
            let name = &engine.config().server.name;
            views::login_page(name, service.as_deref(), renew, None).into_response()
        }
        LoginOutcome::AupPending {
            flow_id,
            principal,
            terms,
        } => views::aup_page(&flow_id, &principal, &terms).into_response(),
        LoginOutcome::MfaPending {
            flow_id,
            provider,
            can_trust_device,
            ..
        } => views::mfa_page(&flow_id, &provider, can_trust_device, None).into_response(),
        LoginOutcome::Authenticated(session) => {
            let response = match &session.redirect {
                Some(location) => found(location),
                None => views::logged_in_page(&session.principal.id).into_response(),
            };
            if session.new_login {
                with_cookies(response, tgc_cookie(&engine.config().tgc, &session.tgt_id))
            } else {
                response
            }
        }
    }
}

/// `GET /login`: SSO reuse or the credential prompt.
#[tracing::instrument(skip(engine, headers, query), fields(service = ?query.service, request_id = Empty))]
pub async fn login_form(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Query(query): Query<LoginQuery>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let renew = query.renew();
    let outcome = engine.sessions().begin(
        tgc(&engine, &headers).as_deref(),
        query.service().as_deref(),
        renew,
    )?;

    let cfg = engine.config();
    let (_, device_cookie) = device_context(&headers, &cfg.mfa.device_cookie_name, cfg.tgc.secure);
    Ok(with_cookies(render_outcome(&engine, outcome, renew), device_cookie))
}

/// `POST /login`: credential submission.
#[tracing::instrument(skip(engine, headers, form), fields(username = %form.username, request_id = Empty))]
pub async fn submit_login(
    Extension(engine): Extension<Arc<SsoEngine>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    let cfg = engine.config();
    let (device, device_cookie) =
        device_context(&headers, &cfg.mfa.device_cookie_name, cfg.tgc.secure);
    let renew = form.renew();
    let service = form.service();

    let submission = CredentialSubmission::new(form.credential())
        .service(service.clone())
        .renew(renew)
        .surrogate_target(form.surrogate())
        .device(device);

    let response = match engine.sessions().submit_credentials(submission).await {
        Ok(outcome) => render_outcome(&engine, outcome, renew),
        Err(e) => {
            let message = match e {
                DomainError::AuthenticationFailed(_) => Some(AUTHENTICATION_FAILED_MESSAGE),
                DomainError::SurrogateNotAuthorized { .. }
                | DomainError::UnknownSurrogateTarget(_) => Some(SURROGATE_FAILED_MESSAGE),
                _ => None,
            };
            match message {
                Some(message) => (
                    StatusCode::UNAUTHORIZED,
                    views::login_page(&cfg.server.name, service.as_deref(), renew, Some(message)),
                )
                    .into_response(),
                None => PageError(e).into_response(),
            }
        }
    };
    with_cookies(response, device_cookie)
}

/// `POST /login/aup`: accept or decline the usage policy.
#[tracing::instrument(skip(engine, form), fields(decision = %form.decision, request_id = Empty))]
pub async fn submit_aup(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Form(form): Form<AupForm>,
) -> Result<Response, PageError> {
    if form.decision.eq_ignore_ascii_case("decline") {
        let principal = engine.sessions().decline_aup(&form.execution)?;
        return Err(DomainError::PolicyNotAccepted(principal.id).into());
    }
    let outcome = engine.sessions().accept_aup(&form.execution).await?;
    Ok(render_outcome(&engine, outcome, false))
}

/// `GET /login/aup/status`: polling-safe acceptance check.
pub async fn aup_status(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Query(query): Query<FlowQuery>,
) -> ApiResult<Json<AupStatusDto>> {
    let accepted = engine.sessions().aup_status(&query.execution).await?;
    Ok(Json(AupStatusDto {
        execution: query.execution,
        accepted,
    }))
}

/// `POST /login/mfa`: second factor, optionally trusting the device.
#[tracing::instrument(skip(engine, form), fields(remember = form.remember(), request_id = Empty))]
pub async fn submit_mfa(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Form(form): Form<MfaForm>,
) -> Response {
    let trust = TrustRequest {
        remember: form.remember(),
        name: form.device_name.clone(),
    };
    match engine
        .sessions()
        .submit_token(&form.execution, form.token.trim(), trust)
        .await
    {
        Ok(outcome) => render_outcome(&engine, outcome, false),
        Err(e @ DomainError::MultifactorFailed(_)) => {
            let Some((provider, can_trust)) = engine.sessions().pending_mfa(&form.execution) else {
                return PageError(e).into_response();
            };
            let page = views::mfa_page(
                &form.execution,
                &provider,
                can_trust,
                Some(INVALID_TOKEN_MESSAGE),
            );
            (StatusCode::UNAUTHORIZED, page).into_response()
        }
        Err(e) => PageError(e).into_response(),
    }
}

/// `GET /logout`: confirmation page, or immediate logout when disabled.
pub async fn logout_form(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Query(params): Query<LogoutParams>,
    headers: HeaderMap,
) -> Result<Response, PageError> {
    let tgc = tgc(&engine, &headers);
    if engine.config().logout.confirm
        && let Some(principal) = engine.sessions().session_principal(tgc.as_deref())
    {
        let page = views::logout_confirm_page(&principal.id, params.target().as_deref());
        return Ok(page.into_response());
    }
    logout(&engine, tgc.as_deref(), params.target().as_deref())
}

/// `POST /logout`.
pub async fn submit_logout(
    Extension(engine): Extension<Arc<SsoEngine>>,
    headers: HeaderMap,
    Form(params): Form<LogoutParams>,
) -> Result<Response, PageError> {
    let tgc = tgc(&engine, &headers);
    logout(&engine, tgc.as_deref(), params.target().as_deref())
}

fn logout(
    engine: &SsoEngine,
    tgc: Option<&str>,
    target: Option<&str>,
) -> Result<Response, PageError> {
    let outcome = engine.sessions().logout(tgc, target)?;
    let response = match &outcome.redirect {
        Some(location) => found(location),
        None => views::logged_out_page().into_response(),
    };
    Ok(with_cookies(response, clear_tgc_cookie(&engine.config().tgc)))
}
