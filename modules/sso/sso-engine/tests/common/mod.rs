#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Shared fixtures for the HTTP integration tests.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sso_engine::domain::clock::SystemClock;
use sso_engine::{Collaborators, SsoEngine, SsoEngineConfig};
use sso_engine_sdk::AupPluginClient;
use static_sso_plugin::{Service, StaticSsoPluginConfig};
use tower::ServiceExt;

pub const SERVICE: &str = "https://app.example.org/cb";
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0";

pub fn plugin_config(aup_enabled: bool) -> StaticSsoPluginConfig {
    serde_json::from_value(json!({
        "users": [
            {
                "username": "casuser",
                "password": "Mellon",
                "attributes": {
                    "cn": ["CAS User"],
                    "mail": ["casuser@example.org"],
                    "employeeNumber": ["123"]
                }
            },
            {
                "username": "user3",
                "password": "Mellon",
                "attributes": {
                    "fname": ["Jane"],
                    "lname": ["Doe"],
                    "employeeNumber": ["456"]
                }
            },
            {
                "username": "mfauser",
                "password": "Mellon",
                "mfa_provider": "mfa-gauth",
                "otp_tokens": ["123456"]
            },
            {
                "username": "yubiuser",
                "passwordless": true,
                "mfa_provider": "mfa-yubikey",
                "otp_tokens": ["cccccckdvvulgjvtkjdhtlrbjjctggdihuevikehtlil"]
            }
        ],
        "surrogates": { "casuser": ["user3"] },
        "aup": { "enabled": aup_enabled, "code": "screen.aup.policyterms", "default_text": "Be nice." }
    }))
    .unwrap()
}

pub fn engine_config() -> SsoEngineConfig {
    serde_json::from_value(json!({
        "server": { "prefix": "https://sso.example.org/cas", "name": "Test SSO" },
        "services": [
            {
                "id": 1,
                "name": "app",
                "service_id": "https://app\\.example\\.org/.*"
            },
            {
                "id": 2,
                "name": "partner",
                "service_id": "https://partner\\.example\\.org/.*",
                "attribute_release": { "type": "return_allowed", "allowed": ["cn"] }
            }
        ],
        "surrogate": {
            "attribute_release": { "type": "return_allowed", "allowed": ["employeeNumber"] }
        },
        "oidc": {
            "signing_secret": "0123456789abcdef0123456789abcdef",
            "clients": [
                {
                    "client_id": "client",
                    "client_secret": "secret",
                    "name": "Relying Party",
                    "redirect_uris": ["https://rp.example.org/cb"],
                    "claims": {
                        "employee": { "attribute": "employeeNumber", "format": "E-{}" },
                        "org": { "unit": { "name": "engineering", "floor": 3 } }
                    }
                },
                {
                    "client_id": "consenting",
                    "client_secret": "secret",
                    "redirect_uris": ["https://consent.example.org/cb"],
                    "require_consent": true
                }
            ]
        }
    }))
    .unwrap()
}

pub fn engine_with(config: SsoEngineConfig, aup_enabled: bool) -> Arc<SsoEngine> {
    let plugin = Arc::new(Service::from_config(&plugin_config(aup_enabled)));
    let collaborators = Collaborators {
        credentials: plugin.clone(),
        second_factor: plugin.clone(),
        aup: plugin
            .aup_enabled()
            .then(|| plugin.clone() as Arc<dyn AupPluginClient>),
        surrogates: plugin,
    };
    SsoEngine::new(config, collaborators, Arc::new(SystemClock)).unwrap()
}

pub fn engine() -> Arc<SsoEngine> {
    engine_with(engine_config(), false)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    with_cookies(Request::get(uri), cookies)
        .body(Body::empty())
        .unwrap()
}

pub fn post_form(uri: &str, fields: &[(&str, &str)], cookies: &[(&str, &str)]) -> Request<Body> {
    with_cookies(Request::post(uri), cookies)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(serde_urlencoded::to_string(fields).unwrap()))
        .unwrap()
}

fn with_cookies(
    builder: axum::http::request::Builder,
    cookies: &[(&str, &str)],
) -> axum::http::request::Builder {
    let builder = builder.header(header::USER_AGENT, USER_AGENT);
    if cookies.is_empty() {
        return builder;
    }
    let value = cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ");
    builder.header(header::COOKIE, value)
}

pub fn query(pairs: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(pairs).unwrap()
}

pub fn login_uri(service: &str) -> String {
    format!("/login?{}", query(&[("service", service)]))
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// Value of a cookie set by the response, if any.
pub fn set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix(&prefix))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_owned())
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
        .to_owned()
}

/// Value of a query parameter of the redirect target.
pub fn redirect_param(response: &Response<Body>, name: &str) -> Option<String> {
    let url = url::Url::parse(&location(response)).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Flow id carried by the hidden `execution` field of a rendered form.
pub fn execution(html: &str) -> String {
    let marker = "name=\"execution\" value=\"";
    let start = html.find(marker).expect("no execution field") + marker.len();
    let end = html[start..].find('"').unwrap();
    html[start..start + end].to_owned()
}

/// Log in with a password and return the TGC value.
pub async fn login(router: &Router, username: &str) -> String {
    let fields = [("username", username), ("password", "Mellon")];
    let response = send(router, post_form("/login", &fields, &[])).await;
    set_cookie(&response, "TGC").expect("login did not set a TGC")
}

/// Validate a service ticket over the JSON protocol 3 endpoint.
pub async fn validate_json(router: &Router, service: &str, ticket: &str) -> Value {
    let uri = format!(
        "/p3/serviceValidate?{}",
        query(&[("service", service), ("ticket", ticket), ("format", "JSON")])
    );
    body_json(send(router, get(&uri, &[])).await).await
}
