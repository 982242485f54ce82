//! CAS-style service ticket validation (`serviceValidate`, `p3/serviceValidate`).

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::{Extension, Form, Query};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value, json};
use sso_engine_sdk::{Attributes, ServiceValidation};
use time::format_description::well_known::Rfc3339;
use tracing::field::Empty;

use crate::api::rest::dto::ValidateParams;
use crate::api::rest::error::classify;
use crate::api::rest::views::escape;
use crate::domain::error::DomainError;
use crate::module::SsoEngine;

const CAS_NAMESPACE: &str = "http://www.yale.edu/tp/cas";
const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Protocol {
    V2,
    V3,
}

pub async fn service_validate_get(
    engine: Extension<Arc<SsoEngine>>,
    Query(params): Query<ValidateParams>,
) -> Response {
    validate(&engine, &params, Protocol::V2)
}

pub async fn service_validate_post(
    engine: Extension<Arc<SsoEngine>>,
    Form(params): Form<ValidateParams>,
) -> Response {
    validate(&engine, &params, Protocol::V2)
}

pub async fn p3_service_validate_get(
    engine: Extension<Arc<SsoEngine>>,
    Query(params): Query<ValidateParams>,
) -> Response {
    validate(&engine, &params, Protocol::V3)
}

pub async fn p3_service_validate_post(
    engine: Extension<Arc<SsoEngine>>,
    Form(params): Form<ValidateParams>,
) -> Response {
    validate(&engine, &params, Protocol::V3)
}

#[tracing::instrument(skip_all, fields(protocol = ?protocol, json = params.json(), request_id = Empty))]
fn validate(engine: &SsoEngine, params: &ValidateParams, protocol: Protocol) -> Response {
    let result = engine.validator().validate(&params.ticket, &params.service);
    let attributes = result
        .as_ref()
        .ok()
        .map(|v| released_attributes(v, protocol));
    match (result, params.json()) {
        (Ok(v), true) => json_success(&v, attributes.unwrap_or_default()),
        (Ok(v), false) => xml_success(&v, &attributes.unwrap_or_default()),
        (Err(e), json) => {
            let (status, _, code) = classify(&e);
            // Ticket and request failures are protocol answers, not HTTP errors.
            let status = if status.is_server_error() {
                status
            } else {
                StatusCode::OK
            };
            let description = match &e {
                DomainError::Internal(_) => "internal error".to_owned(),
                other => other.to_string(),
            };
            if json {
                json_failure(status, code, &description)
            } else {
                xml_failure(status, code, &description)
            }
        }
    }
}

/// Released attributes plus, for protocol 3, the authentication metadata.
fn released_attributes(v: &ServiceValidation, protocol: Protocol) -> Attributes {
    let mut attributes = v.attributes.clone();
    if protocol == Protocol::V3 {
        attributes.insert_single("isFromNewLogin", v.from_new_login.to_string());
        if let Ok(date) = v.authentication_date.format(&Rfc3339) {
            attributes.insert_single("authenticationDate", date);
        }
    }
    attributes
}

fn json_success(v: &ServiceValidation, attributes: Attributes) -> Response {
    let mut success = Map::new();
    success.insert("user".to_owned(), json!(v.user));
    if !attributes.is_empty() {
        success.insert("attributes".to_owned(), json!(attributes));
    }
    axum::Json(json!({ "serviceResponse": { "authenticationSuccess": Value::Object(success) } }))
        .into_response()
}

fn json_failure(status: StatusCode, code: &str, description: &str) -> Response {
    (
        status,
        axum::Json(json!({
            "serviceResponse": {
                "authenticationFailure": { "code": code, "description": description }
            }
        })),
    )
        .into_response()
}

/// Attribute names become element names; names that are not plain XML
/// names are left out of the XML rendering.
fn xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

fn xml_success(v: &ServiceValidation, attributes: &Attributes) -> Response {
    let mut xml = format!(
        "<cas:serviceResponse xmlns:cas=\"{CAS_NAMESPACE}\">\n    <cas:authenticationSuccess>\n        <cas:user>{}</cas:user>\n",
        escape(&v.user)
    );
    if !attributes.is_empty() {
        xml.push_str("        <cas:attributes>\n");
        for (name, values) in attributes.iter().filter(|(name, _)| xml_name(name)) {
            for value in values {
                let value = escape(value);
                let _ = writeln!(xml, "            <cas:{name}>{value}</cas:{name}>");
            }
        }
        xml.push_str("        </cas:attributes>\n");
    }
    xml.push_str("    </cas:authenticationSuccess>\n</cas:serviceResponse>\n");
    ([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], xml).into_response()
}

fn xml_failure(status: StatusCode, code: &str, description: &str) -> Response {
    let xml = format!(
        "<cas:serviceResponse xmlns:cas=\"{CAS_NAMESPACE}\">\n    <cas:authenticationFailure code=\"{code}\">{}</cas:authenticationFailure>\n</cas:serviceResponse>\n",
        escape(description)
    );
    (status, [(header::CONTENT_TYPE, XML_CONTENT_TYPE)], xml).into_response()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn xml_names_are_restricted() {
        assert!(xml_name("employeeNumber"));
        assert!(xml_name("first.name"));
        assert!(!xml_name("1abc"));
        assert!(!xml_name("a b"));
        assert!(!xml_name(""));
    }
}
