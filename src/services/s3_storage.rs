//! [`ObjectStorage`] backed by an S3-compatible service (MinIO, AWS S3, ...).

use super::storage::{ObjectReader, ObjectStorage, StorageError, StorageResult, UploadReader};
use crate::config::AppConfig;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{
        BehaviorVersion, Credentials, Region, retry::RetryConfig, timeout::TimeoutConfig,
    },
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::{get_object::GetObjectError, head_bucket::HeadBucketError},
    primitives::ByteStream,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use futures::TryStreamExt;
use http_body::Frame;
use http_body_util::StreamBody;
use std::{error::Error as StdError, time::Duration, time::Instant};
use tokio_util::io::ReaderStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_REGION: &str = "us-east-1";

/// S3 client bound to one endpoint and one set of static credentials.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    region: String,
}

impl S3Storage {
    /// Build a client for an S3-compatible endpoint.
    ///
    /// Path-style addressing is always used so bucket names never have to
    /// resolve as DNS labels. SDK retries are disabled; a failed call is
    /// reported to the caller as-is.
    pub fn new(endpoint_url: &str, region: &str, access_key: &str, secret_key: &str) -> Self {
        let credentials = Credentials::new(access_key, secret_key, None, None, "object-gateway");
        let timeouts = TimeoutConfig::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build();

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(endpoint_url)
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .timeout_config(timeouts)
            .build();

        tracing::info!(endpoint = %endpoint_url, region = %region, "initialized S3 client");

        Self {
            client: Client::from_conf(config),
            region: region.to_string(),
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            &cfg.endpoint_url(),
            &cfg.region,
            &cfg.access_key,
            &cfg.secret_key,
        )
    }
}

fn backend_error<E>(operation: &str, err: SdkError<E>) -> StorageError
where
    E: StdError + ProvideErrorMetadata + 'static,
{
    let message = match err.code() {
        Some(code) => format!(
            "{operation}: {code}: {}",
            err.message().unwrap_or("no message")
        ),
        None => format!("{operation}: {}", display_chain(&err)),
    };
    StorageError::Backend(message)
}

/// `Display` of `err` and each of its sources, joined with `: `.
///
/// Unlike `DisplayErrorContext` this never includes the raw HTTP response.
fn display_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

fn is_no_such_key(err: &SdkError<GetObjectError>) -> bool {
    if let SdkError::ServiceError(service) = err {
        if matches!(service.err(), GetObjectError::NoSuchKey(_)) {
            return true;
        }
    }
    err.code() == Some("NoSuchKey")
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(service))
                if matches!(service.err(), HeadBucketError::NotFound(_))
                    || service.raw().status().as_u16() == 404 =>
            {
                Ok(false)
            }
            Err(err) => {
                tracing::error!(bucket = %bucket, error = %DisplayErrorContext(&err), "HeadBucket failed");
                Err(backend_error("HeadBucket", err))
            }
        }
    }

    async fn make_bucket(&self, bucket: &str) -> StorageResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request.send().await.map_err(|err| {
            tracing::error!(bucket = %bucket, error = %DisplayErrorContext(&err), "CreateBucket failed");
            backend_error("CreateBucket", err)
        })?;
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        reader: UploadReader,
        length: u64,
        content_type: &str,
    ) -> StorageResult<()> {
        let start = Instant::now();
        let content_length = i64::try_from(length)
            .map_err(|_| StorageError::Backend(format!("object too large: {length} bytes")))?;

        let frames = ReaderStream::new(reader).map_ok(Frame::data);
        let body = ByteStream::from_body_1_x(StreamBody::new(frames));

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_length(content_length)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| {
                tracing::error!(
                    bucket = %bucket,
                    key = %key,
                    size_bytes = length,
                    error = %DisplayErrorContext(&err),
                    "PutObject failed"
                );
                backend_error("PutObject", err)
            })?;

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "stored object"
        );
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<String>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| {
                tracing::error!(bucket = %bucket, error = %DisplayErrorContext(&err), "ListObjectsV2 failed");
                backend_error("ListObjectsV2", err)
            })?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_owned)),
            );
        }

        tracing::debug!(bucket = %bucket, count = keys.len(), "listed objects");
        Ok(keys)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if is_no_such_key(&err) {
                    StorageError::NoSuchKey {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    tracing::error!(
                        bucket = %bucket,
                        key = %key,
                        error = %DisplayErrorContext(&err),
                        "GetObject failed"
                    );
                    backend_error("GetObject", err)
                }
            })?;

        Ok(Box::pin(output.body.into_async_read()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{routes, services::gateway_service::GatewayService};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };
    use tower::ServiceExt;
    use tracing_subscriber::{layer::SubscriberExt, Layer};

    const NO_SUCH_KEY: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Key>k</Key></Error>"#;
    const ACCESS_DENIED: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>"#;

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Answer every request with `response` and return the endpoint URL.
    async fn canned_endpoint(response: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response: Arc<str> = response.into();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let response = response.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 4096];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        format!("http://{addr}")
    }

    async fn storage_answering(status_line: &str, body: &str) -> S3Storage {
        let endpoint = canned_endpoint(http_response(status_line, body)).await;
        S3Storage::new(&endpoint, "us-east-1", "test-access", "test-secret")
    }

    #[tokio::test]
    async fn get_object_maps_no_such_key() {
        let storage = storage_answering("404 Not Found", NO_SUCH_KEY).await;
        let err = storage.get_object("b", "k").await.err().unwrap();
        assert!(
            matches!(err, StorageError::NoSuchKey { ref bucket, ref key } if bucket == "b" && key == "k"),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn head_bucket_404_means_absent() {
        let storage = storage_answering("404 Not Found", "").await;
        assert!(!storage.bucket_exists("b").await.unwrap());
    }

    #[tokio::test]
    async fn head_bucket_403_is_backend_error() {
        let storage = storage_answering("403 Forbidden", "").await;
        let err = storage.bucket_exists("b").await.unwrap_err();
        let message = match err {
            StorageError::Backend(message) => message,
            other => panic!("expected backend error, got {other:?}"),
        };
        assert!(message.starts_with("HeadBucket:"), "{message}");
    }

    #[tokio::test]
    async fn get_object_denied_carries_code_and_message() {
        let storage = storage_answering("403 Forbidden", ACCESS_DENIED).await;
        let err = storage.get_object("b", "k").await.err().unwrap();
        let message = match err {
            StorageError::Backend(message) => message,
            other => panic!("expected backend error, got {other:?}"),
        };
        assert_eq!(message, "GetObject: AccessDenied: Access Denied");
    }

    #[tokio::test]
    async fn uncoded_failure_message_omits_raw_response() {
        let storage = storage_answering("500 Internal Server Error", "").await;
        let err = storage.list_objects("b").await.unwrap_err();
        let message = match err {
            StorageError::Backend(message) => message,
            other => panic!("expected backend error, got {other:?}"),
        };
        assert!(message.starts_with("ListObjectsV2:"), "{message}");
        assert!(!message.contains("SdkBody"), "{message}");
        assert!(!message.contains("headers"), "{message}");
    }

    /// Counts ERROR events emitted from this crate.
    struct CrateErrors(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for CrateErrors {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let meta = event.metadata();
            if *meta.level() == tracing::Level::ERROR && meta.target().starts_with("object_gateway")
            {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn failed_download_is_logged_once() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(CrateErrors(errors.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let storage = storage_answering("403 Forbidden", ACCESS_DENIED).await;
        let app = routes::app(GatewayService::new(Arc::new(storage), "b"), 1024);
        let request = Request::builder()
            .uri("/download/k")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body["detail"],
            "Error downloading file from storage: GetObject: AccessDenied: Access Denied"
        );

        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }
}
