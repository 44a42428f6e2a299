//! Info & health handlers.
//!
//! - GET /         -> static greeting
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the bucket is reachable

use crate::services::gateway_service::GatewayService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// `GET /`
pub async fn read_root() -> Json<Greeting> {
    Json(Greeting {
        message: "Object gateway API backed by S3 storage!".into(),
    })
}

/// `GET /healthz`
///
/// Liveness probe: always 200, never touches the backend.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
            bucket: None,
            error: None,
        }),
    )
}

/// `GET /readyz`
///
/// 200 when the backend answers and the bucket exists, 503 otherwise.
pub async fn readyz(State(service): State<GatewayService>) -> impl IntoResponse {
    let error = match service.storage.bucket_exists(service.bucket()).await {
        Ok(true) => None,
        Ok(false) => Some(format!("bucket `{}` does not exist", service.bucket())),
        Err(err) => Some(format!("storage unreachable: {err}")),
    };

    let status = if error.is_none() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        status: if error.is_none() { "ok" } else { "error" }.into(),
        bucket: Some(service.bucket().to_string()),
        error,
    };
    (status, Json(body))
}

#[derive(Serialize)]
pub struct Greeting {
    message: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}
