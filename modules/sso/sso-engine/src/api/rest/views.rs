//! Minimal HTML prompts for the browser flows.

use axum::response::Html;
use sso_engine_sdk::AupTerms;

use crate::domain::oidc::AuthorizationRequest;

#[must_use]
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{body}\n</body></html>\n",
        escape(title)
    ))
}

fn hidden(name: &str, value: Option<&str>) -> String {
    value.map_or_else(String::new, |v| {
        format!(
            "<input type=\"hidden\" name=\"{name}\" value=\"{}\">",
            escape(v)
        )
    })
}

fn error_line(error: Option<&str>) -> String {
    error.map_or_else(String::new, |e| {
        let e = escape(e);
        format!("<div id=\"loginErrorsPanel\" class=\"error\">{e}</div>")
    })
}

#[must_use]
pub fn login_page(
    server_name: &str,
    service: Option<&str>,
    renew: bool,
    error: Option<&str>,
) -> Html<String> {
    let body = format!(
        "<h1>{name}</h1>\n{err}\n<form id=\"fm1\" method=\"post\" action=\"/login\">\n\
         <input id=\"username\" name=\"username\" type=\"text\" autocomplete=\"username\">\n\
         <input id=\"password\" name=\"password\" type=\"password\" autocomplete=\"current-password\">\n\
         {service}{renew}\n<button type=\"submit\" name=\"submit\">Login</button>\n</form>",
        name = escape(server_name),
        err = error_line(error),
        service = hidden("service", service),
        renew = hidden("renew", renew.then_some("true")),
    );
    page(&format!("{server_name} Login"), &body)
}

#[must_use]
pub fn aup_page(flow_id: &str, principal: &str, terms: &AupTerms) -> Html<String> {
    let body = format!(
        "<h1>Acceptable Usage Policy</h1>\n<p>Hello, {principal}.</p>\n\
         <div id=\"aupTerms\" data-code=\"{code}\">{text}</div>\n\
         <form id=\"fm1\" method=\"post\" action=\"/login/aup\">\n{exec}\n\
         <button type=\"submit\" name=\"decision\" value=\"accept\">Accept</button>\n\
         <button type=\"submit\" name=\"decision\" value=\"decline\">Decline</button>\n</form>",
        principal = escape(principal),
        code = escape(&terms.code),
        text = escape(&terms.default_text),
        exec = hidden("execution", Some(flow_id)),
    );
    page("Acceptable Usage Policy", &body)
}

#[must_use]
pub fn mfa_page(
    flow_id: &str,
    provider: &str,
    can_trust_device: bool,
    error: Option<&str>,
) -> Html<String> {
    let trust = if can_trust_device {
        "<label><input type=\"checkbox\" name=\"remember\" value=\"true\"> Trust this device</label>\n\
         <input id=\"deviceName\" name=\"deviceName\" type=\"text\" placeholder=\"Device name\">\n"
    } else {
        ""
    };
    let body = format!(
        "<h1>Multifactor Authentication</h1>\n{err}\n<p>Provider: {provider}</p>\n\
         <form id=\"fm1\" method=\"post\" action=\"/login/mfa\">\n{exec}\n\
         <input id=\"token\" name=\"token\" type=\"text\" autocomplete=\"one-time-code\">\n{trust}\
         <button type=\"submit\" name=\"submit\">Verify</button>\n</form>",
        err = error_line(error),
        provider = escape(provider),
        exec = hidden("execution", Some(flow_id)),
    );
    page("Multifactor Authentication", &body)
}

#[must_use]
pub fn logged_in_page(principal: &str) -> Html<String> {
    page(
        "Log In Successful",
        &format!(
            "<h1>Log In Successful</h1>\n<p>You, {}, have successfully logged into the Central Authentication Service.</p>",
            escape(principal)
        ),
    )
}

#[must_use]
pub fn logout_confirm_page(principal: &str, service: Option<&str>) -> Html<String> {
    let body = format!(
        "<h1>Logout</h1>\n<form id=\"fm1\" method=\"post\" action=\"/logout\">\n\
         <p>Do you, {principal}, want to log out completely?</p>\n{service}\n\
         <button type=\"submit\" name=\"submit\">Log Out</button>\n</form>",
        principal = escape(principal),
        service = hidden("service", service),
    );
    page("Logout", &body)
}

#[must_use]
pub fn logged_out_page() -> Html<String> {
    page(
        "Logout Successful",
        "<h1>Logout Successful</h1>\n<p>You have successfully logged out. For security reasons, exit your web browser.</p>",
    )
}

#[must_use]
pub fn consent_page(
    client_name: &str,
    principal: &str,
    request: &AuthorizationRequest,
) -> Html<String> {
    let body = format!(
        "<h1>Authorize {client}</h1>\n<p>{principal}, {client} requests access to: {scope}</p>\n\
         <form id=\"fm1\" method=\"post\" action=\"/oidc/authorize\">\n{fields}\n\
         <button type=\"submit\" name=\"decision\" value=\"allow\">Allow</button>\n\
         <button type=\"submit\" name=\"decision\" value=\"deny\">Deny</button>\n</form>",
        client = escape(client_name),
        principal = escape(principal),
        scope = escape(&request.scope),
        fields = [
            hidden("response_type", Some(request.response_type.as_str())),
            hidden("client_id", Some(request.client_id.as_str())),
            hidden("redirect_uri", Some(request.redirect_uri.as_str())),
            hidden("scope", Some(request.scope.as_str())),
            hidden("state", request.state.as_deref()),
            hidden("nonce", request.nonce.as_deref()),
        ]
        .concat(),
    );
    page("Authorize", &body)
}

#[must_use]
pub fn error_page(title: &str, detail: &str) -> Html<String> {
    page(
        title,
        &format!(
            "<h1>{}</h1>\n<div id=\"errorPanel\" class=\"error\">{}</div>",
            escape(title),
            escape(detail)
        ),
    )
}
