//! HTTP handlers for the upload, list, and download operations.
//! Uploads are streamed through a temporary spool file; downloads are
//! buffered so the exact Content-Length is known before the body is sent.

use crate::{
    errors::AppError,
    models::{
        bucket::BucketListing,
        object::{DownloadedObject, UploadReceipt},
    },
    services::gateway_service::GatewayService,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use futures::StreamExt;
use std::io;

/// Name of the multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// `POST /uploadfile/`: store the `file` field under its file name.
pub async fn upload_file(
    State(service): State<GatewayService>,
    mut multipart: Multipart,
) -> Result<Json<UploadReceipt>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(err.status(), err.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = match field.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(AppError::unprocessable(
                    "Field `file` must carry a non-empty file name",
                ));
            }
        };
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let stream = field.map(|chunk| chunk.map_err(io::Error::other));
        let size_bytes = service
            .upload_object_stream(&file_name, &content_type, stream)
            .await
            .map_err(|err| AppError::from_storage(err, "Error uploading file to storage"))?;

        tracing::info!(key = %file_name, size_bytes, content_type = %content_type, "upload complete");
        return Ok(Json(UploadReceipt {
            filename: file_name,
            message: "File uploaded to storage successfully".into(),
        }));
    }

    Err(AppError::unprocessable("Missing multipart field `file`"))
}

/// `GET /list_objects/`: every key in the configured bucket.
pub async fn list_objects(
    State(service): State<GatewayService>,
) -> Result<Json<BucketListing>, AppError> {
    let objects = service
        .list_objects()
        .await
        .map_err(|err| AppError::from_storage(err, "Error listing objects in storage"))?;

    Ok(Json(BucketListing {
        bucket: service.bucket().to_string(),
        objects,
    }))
}

/// `GET /download/{object_name}`: the whole object as an attachment.
pub async fn download_file(
    State(service): State<GatewayService>,
    Path(object_name): Path<String>,
) -> Result<Response, AppError> {
    let object = service
        .download_object(&object_name)
        .await
        .map_err(|err| AppError::from_storage(err, "Error downloading file from storage"))?;

    let mut headers = HeaderMap::new();
    set_attachment_headers(&mut headers, &object)?;

    let mut response = Response::new(Body::from(object.data));
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = headers;
    Ok(response)
}

fn set_attachment_headers(
    headers: &mut HeaderMap,
    object: &DownloadedObject,
) -> Result<(), AppError> {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&object.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(object.data.len()));

    let disposition = HeaderValue::from_str(&format!("attachment; filename={}", object.key))
        .map_err(|err| AppError::internal(format!("Internal error: {err}")))?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok(())
}
