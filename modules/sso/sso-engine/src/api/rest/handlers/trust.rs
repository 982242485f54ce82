//! Trusted-device administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use sso_engine_sdk::TrustedDeviceRecord;
use tracing::{field::Empty, info};

use super::ApiResult;
use crate::api::rest::error::Problem;
use crate::domain::error::DomainError;
use crate::module::SsoEngine;

const EXPORT_FILENAME: &str = "trusted-devices.json.gz";

/// `GET /actuator/multifactorTrustedDevices`
pub async fn list_all(
    Extension(engine): Extension<Arc<SsoEngine>>,
) -> Json<Vec<TrustedDeviceRecord>> {
    Json(engine.trust().list_all())
}

/// `GET /actuator/multifactorTrustedDevices/{principal}`
pub async fn list_by_principal(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Path(principal): Path<String>,
) -> Json<Vec<TrustedDeviceRecord>> {
    Json(engine.trust().list_by_principal(&principal))
}

/// `DELETE /actuator/multifactorTrustedDevices/{id}`
#[tracing::instrument(skip(engine), fields(request_id = Empty))]
pub async fn delete_record(
    Extension(engine): Extension<Arc<SsoEngine>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TrustedDeviceRecord>> {
    let id: u64 = id
        .parse()
        .map_err(|_| DomainError::validation(format!("'{id}' is not a record id")))?;
    engine.trust().delete(id).map(Json).ok_or_else(|| {
        Problem::new(
            StatusCode::NOT_FOUND,
            "Record Not Found",
            format!("trusted device record {id} not found"),
        )
        .with_code("RECORD_NOT_FOUND")
    })
}

/// `GET /actuator/multifactorTrustedDevices/export`: gzip-compressed JSON.
pub async fn export(Extension(engine): Extension<Arc<SsoEngine>>) -> ApiResult<Response> {
    let body = engine.trust().export_all()?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/gzip".to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILENAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// `POST /actuator/multifactorTrustedDevices/import`: all-or-nothing.
#[tracing::instrument(skip(engine, body), fields(size = body.len(), request_id = Empty))]
pub async fn import(
    Extension(engine): Extension<Arc<SsoEngine>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<Vec<TrustedDeviceRecord>>)> {
    let imported = engine.trust().import_all(&body)?;
    info!(count = imported.len(), "Imported trusted devices");
    Ok((StatusCode::CREATED, Json(imported)))
}
