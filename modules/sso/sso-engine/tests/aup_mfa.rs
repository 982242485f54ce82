#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Usage policy gating, second factor and trusted devices.

mod common;

use axum::http::StatusCode;
use common::*;

fn credentials<'a>(username: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("username", username),
        ("password", "Mellon"),
        ("service", SERVICE),
    ]
}

#[tokio::test]
async fn aup_must_be_accepted_once() {
    let router = engine_with(engine_config(), true).router();

    let response = send(&router, post_form("/login", &credentials("casuser"), &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, "TGC").is_none());
    let html = body_string(response).await;
    assert!(html.contains("Acceptable Usage Policy"));
    assert!(html.contains("Be nice."));
    let flow = execution(&html);

    let uri = format!("/login/aup/status?{}", query(&[("execution", &flow)]));
    let status = body_json(send(&router, get(&uri, &[])).await).await;
    assert_eq!(status["accepted"], false);

    let accept = [("execution", flow.as_str()), ("decision", "accept")];
    let response = send(&router, post_form("/login/aup", &accept, &[])).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let tgc = set_cookie(&response, "TGC").unwrap();
    let ticket = redirect_param(&response, "ticket").unwrap();
    let body = validate_json(&router, SERVICE, &ticket).await;
    assert_eq!(
        body["serviceResponse"]["authenticationSuccess"]["user"],
        "casuser"
    );

    // SSO skips the policy.
    let response = send(&router, get(&login_uri(SERVICE), &[("TGC", &tgc)])).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    // So does a fresh login after logout, since acceptance is remembered.
    send(&router, post_form("/logout", &[], &[("TGC", &tgc)])).await;
    let response = send(&router, post_form("/login", &credentials("casuser"), &[])).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn declined_aup_creates_no_session() {
    let router = engine_with(engine_config(), true).router();

    let response = send(&router, post_form("/login", &credentials("casuser"), &[])).await;
    let html = body_string(response).await;
    let flow = execution(&html);

    let decline = [("execution", flow.as_str()), ("decision", "decline")];
    let response = send(&router, post_form("/login/aup", &decline, &[])).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(set_cookie(&response, "TGC").is_none());

    // The flow is gone.
    let accept = [("execution", flow.as_str()), ("decision", "accept")];
    let response = send(&router, post_form("/login/aup", &accept, &[])).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn mfa_then_trusted_device_skips_second_factor() {
    let router = engine().router();

    let response = send(&router, get("/login", &[])).await;
    let device = set_cookie(&response, "MFADEVICE").unwrap();
    let cookies = [("MFADEVICE", device.as_str())];
    let fields = credentials("mfauser");

    let response = send(&router, post_form("/login", &fields, &cookies)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("mfa-gauth"));
    let flow = execution(&html);

    let wrong = [("execution", flow.as_str()), ("token", "000000")];
    let response = send(&router, post_form("/login/mfa", &wrong, &cookies)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_string(response).await.contains("invalid"));

    let response = send(
        &router,
        post_form(
            "/login/mfa",
            &[
                ("execution", &flow),
                ("token", "123456"),
                ("remember", "true"),
                ("deviceName", "Laptop"),
            ],
            &cookies,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let tgc = set_cookie(&response, "TGC").unwrap();
    assert!(redirect_param(&response, "ticket").is_some());

    let uri = "/actuator/multifactorTrustedDevices/mfauser";
    let records = body_json(send(&router, get(uri, &[])).await).await;
    assert_eq!(records.as_array().unwrap().len(), 1);
    assert_eq!(records[0]["name"], "Laptop");

    send(&router, post_form("/logout", &[], &[("TGC", &tgc)])).await;

    let response = send(&router, post_form("/login", &fields, &cookies)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn untrusted_device_still_needs_second_factor() {
    let router = engine().router();
    let fields = credentials("mfauser");
    let one = [("MFADEVICE", "one")];
    let two = [("MFADEVICE", "two")];

    let response = send(&router, post_form("/login", &fields, &one)).await;
    let flow = execution(&body_string(response).await);
    let remember = [
        ("execution", flow.as_str()),
        ("token", "123456"),
        ("remember", "true"),
    ];
    let response = send(&router, post_form("/login/mfa", &remember, &one)).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let response = send(&router, post_form("/login", &fields, &two)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains("name=\"token\""));
}

#[tokio::test]
async fn passwordless_account_goes_straight_to_its_provider() {
    let router = engine().router();

    let fields = [("username", "yubiuser")];
    let response = send(&router, post_form("/login", &fields, &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains("mfa-yubikey"));
    let flow = execution(&html);

    let otp = [
        ("execution", flow.as_str()),
        ("token", "cccccckdvvulgjvtkjdhtlrbjjctggdihuevikehtlil"),
    ];
    let response = send(&router, post_form("/login/mfa", &otp, &[])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response, "TGC").is_some());
}
