// Not every helper is used in every test file.
#![allow(dead_code)]

use axum::{Router, body::Body, http::Request, response::Response};
use http_body_util::BodyExt;
use object_gateway::{
    routes,
    services::{gateway_service::GatewayService, memory_storage::MemoryStorage},
};
use std::sync::Arc;
use tower::ServiceExt;

pub const BUCKET: &str = "mybucket";
pub const BOUNDARY: &str = "gateway-test-boundary";
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024;

pub struct TestContext {
    pub router: Router,
    pub storage: Arc<MemoryStorage>,
    pub service: GatewayService,
}

impl TestContext {
    /// Router over an in-memory store that has already been bootstrapped.
    pub async fn new() -> Self {
        Self::with_limit(MAX_UPLOAD_BYTES).await
    }

    pub async fn with_limit(max_upload_bytes: usize) -> Self {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();

        let storage = Arc::new(MemoryStorage::new());
        let service = GatewayService::new(storage.clone(), BUCKET);
        service
            .ensure_bucket()
            .await
            .expect("bootstrap against memory storage");

        Self {
            router: routes::app(service.clone(), max_upload_bytes),
            storage,
            service,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str) -> Response {
        let request = Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    pub async fn upload(&self, file_name: &str, content_type: &str, data: &[u8]) -> Response {
        let body = multipart_body(&[Part::file("file", file_name, content_type, data)]);
        self.send(multipart_request(body)).await
    }
}

/// One part of a hand-built `multipart/form-data` body.
pub struct Part<'a> {
    pub name: &'a str,
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(name: &'a str, file_name: &'a str, content_type: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            file_name: Some(file_name),
            content_type: Some(content_type),
            data,
        }
    }

    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            file_name: None,
            content_type: None,
            data: value.as_bytes(),
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        let mut disposition = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
        if let Some(file_name) = part.file_name {
            disposition.push_str(&format!("; filename=\"{file_name}\""));
        }
        body.extend_from_slice(disposition.as_bytes());
        body.extend_from_slice(b"\r\n");
        if let Some(content_type) = part.content_type {
            body.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        body.extend_from_slice(b"\r\n");
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .uri("/uploadfile/")
        .method("POST")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("valid request")
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("readable body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON body")
}
