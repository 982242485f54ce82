#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Browser login: SSO reuse, renew, failures, logout.

mod common;

use axum::http::StatusCode;
use common::*;

#[tokio::test]
async fn login_issues_ticket_and_sso_reuses_session() {
    let router = engine().router();

    let response = send(&router, get(&login_uri(SERVICE), &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("name=\"username\""));

    let response = send(
        &router,
        post_form(
            "/login",
            &[
                ("username", "casuser"),
                ("password", "Mellon"),
                ("service", SERVICE),
            ],
            &[],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with(&format!("{SERVICE}?ticket=ST-")));
    let tgc = set_cookie(&response, "TGC").unwrap();
    let first = redirect_param(&response, "ticket").unwrap();

    let body = validate_json(&router, SERVICE, &first).await;
    let success = &body["serviceResponse"]["authenticationSuccess"];
    assert_eq!(success["user"], "casuser");
    assert_eq!(success["attributes"]["isFromNewLogin"][0], "true");
    assert_eq!(success["attributes"]["cn"][0], "CAS User");

    // Second visit rides on the TGC and sets no new cookie.
    let response = send(&router, get(&login_uri(SERVICE), &[("TGC", &tgc)])).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(set_cookie(&response, "TGC").is_none());
    let second = redirect_param(&response, "ticket").unwrap();
    assert_ne!(first, second);

    let body = validate_json(&router, SERVICE, &second).await;
    assert_eq!(
        body["serviceResponse"]["authenticationSuccess"]["attributes"]["isFromNewLogin"][0],
        "false"
    );
}

#[tokio::test]
async fn service_ticket_is_single_use() {
    let router = engine().router();
    let tgc = login(&router, "casuser").await;

    let response = send(&router, get(&login_uri(SERVICE), &[("TGC", &tgc)])).await;
    let ticket = redirect_param(&response, "ticket").unwrap();

    let first = validate_json(&router, SERVICE, &ticket).await;
    assert!(first["serviceResponse"]["authenticationSuccess"].is_object());

    let replay = validate_json(&router, SERVICE, &ticket).await;
    assert!(replay["serviceResponse"]["authenticationFailure"].is_object());
}

#[tokio::test]
async fn validation_rejects_other_service() {
    let router = engine().router();
    let tgc = login(&router, "casuser").await;
    let response = send(&router, get(&login_uri(SERVICE), &[("TGC", &tgc)])).await;
    let ticket = redirect_param(&response, "ticket").unwrap();

    let body = validate_json(&router, "https://partner.example.org/app", &ticket).await;
    assert_eq!(
        body["serviceResponse"]["authenticationFailure"]["code"],
        "INVALID_SERVICE"
    );
}

#[tokio::test]
async fn xml_validation_uses_cas_envelope() {
    let router = engine().router();
    let response = send(
        &router,
        post_form(
            "/login",
            &[
                ("username", "casuser"),
                ("password", "Mellon"),
                ("service", SERVICE),
            ],
            &[],
        ),
    )
    .await;
    let ticket = redirect_param(&response, "ticket").unwrap();

    let uri = format!(
        "/serviceValidate?{}",
        query(&[("service", SERVICE), ("ticket", &ticket)])
    );
    let body = body_string(send(&router, get(&uri, &[])).await).await;
    assert!(body.contains("<cas:authenticationSuccess>"));
    assert!(body.contains("<cas:user>casuser</cas:user>"));
}

#[tokio::test]
async fn renew_forces_credentials_and_keeps_old_session() {
    let router = engine().router();
    let old = login(&router, "casuser").await;

    let uri = format!(
        "/login?{}",
        query(&[("service", SERVICE), ("renew", "true")])
    );
    let response = send(&router, get(&uri, &[("TGC", &old)])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("name=\"password\""));

    let response = send(
        &router,
        post_form(
            "/login",
            &[
                ("username", "casuser"),
                ("password", "Mellon"),
                ("service", SERVICE),
                ("renew", "true"),
            ],
            &[("TGC", &old)],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let new = set_cookie(&response, "TGC").unwrap();
    assert_ne!(old, new);

    let response = send(&router, get(&format!("/v1/tickets/{old}"), &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn wrong_password_renders_generic_failure() {
    let router = engine().router();
    let fields = [("username", "casuser"), ("password", "nope")];
    let response = send(&router, post_form("/login", &fields, &[])).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie(&response, "TGC").is_none());
    let html = body_string(response).await;
    assert!(html.contains("Authentication attempt has failed"));
}

#[tokio::test]
async fn unregistered_service_is_refused() {
    let router = engine().router();
    let response = send(
        &router,
        post_form(
            "/login",
            &[
                ("username", "casuser"),
                ("password", "Mellon"),
                ("service", "https://evil.example.com/"),
            ],
            &[],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_confirmation_then_redirect_to_registered_service() {
    let router = engine().router();
    let tgc = login(&router, "casuser").await;

    let uri = format!("/logout?{}", query(&[("service", SERVICE)]));
    let response = send(&router, get(&uri, &[("TGC", &tgc)])).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("want to log out completely"));

    let fields = [("service", SERVICE)];
    let response = send(&router, post_form("/logout", &fields, &[("TGC", &tgc)])).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), SERVICE);
    assert_eq!(set_cookie(&response, "TGC").as_deref(), Some(""));

    let response = send(&router, get(&format!("/v1/tickets/{tgc}"), &[])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn logout_ignores_unregistered_redirect() {
    let router = engine().router();
    let tgc = login(&router, "casuser").await;

    let fields = [("service", "https://evil.example.com/")];
    let response = send(&router, post_form("/logout", &fields, &[("TGC", &tgc)])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("location").is_none());
}

#[tokio::test]
async fn logout_revokes_outstanding_service_tickets() {
    let router = engine().router();
    let tgc = login(&router, "casuser").await;
    let response = send(&router, get(&login_uri(SERVICE), &[("TGC", &tgc)])).await;
    let ticket = redirect_param(&response, "ticket").unwrap();

    send(&router, post_form("/logout", &[], &[("TGC", &tgc)])).await;

    let body = validate_json(&router, SERVICE, &ticket).await;
    assert!(body["serviceResponse"]["authenticationFailure"].is_object());
}

#[tokio::test]
async fn health_reports_ticket_count() {
    let router = engine().router();
    login(&router, "casuser").await;

    let body = body_json(send(&router, get("/health", &[])).await).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["tickets"], 1);
}
