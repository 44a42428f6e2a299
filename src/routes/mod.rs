//! Routes of the gateway.
//!
//! - `GET  /`                        greeting
//! - `GET  /healthz`, `GET /readyz`  probes
//! - `POST /uploadfile/`             upload one multipart `file` field
//! - `GET  /list_objects/`           list keys in the configured bucket
//! - `GET  /download/{object_name}`  download one object as an attachment

use crate::{
    handlers::{
        health_handlers::{healthz, read_root, readyz},
        object_handlers::{download_file, list_objects, upload_file},
    },
    services::gateway_service::GatewayService,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

/// Build the router with `max_upload_bytes` as the request body limit.
///
/// The returned router still needs its `GatewayService` state.
pub fn routes(max_upload_bytes: usize) -> Router<GatewayService> {
    Router::new()
        .route("/", get(read_root))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/uploadfile/", post(upload_file))
        .route("/list_objects/", get(list_objects))
        .route("/download/{object_name}", get(download_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

/// Router with state attached, ready to serve.
pub fn app(service: GatewayService, max_upload_bytes: usize) -> Router {
    routes(max_upload_bytes).with_state(service)
}
