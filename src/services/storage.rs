//! Storage capability used by the gateway.
//!
//! The gateway never talks to a concrete backend directly; it goes through
//! [`ObjectStorage`], which is implemented by [`S3Storage`](super::s3_storage::S3Storage)
//! for production and by an in-memory store for tests.

use async_trait::async_trait;
use std::{io, pin::Pin};
use thiserror::Error;
use tokio::io::AsyncRead;

/// Readable object body handed to [`ObjectStorage::put_object`].
pub type UploadReader = Pin<Box<dyn AsyncRead + Send + Sync>>;

/// Readable object body returned by [`ObjectStorage::get_object`].
///
/// The reader owns the backend connection; dropping it releases the connection.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("NoSuchKey: object `{key}` not found in bucket `{bucket}`")]
    NoSuchKey { bucket: String, key: String },
    #[error("{0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Operations the gateway needs from an object-storage backend.
///
/// Implementations must report a missing key on `get_object` as
/// [`StorageError::NoSuchKey`]; every other backend failure is
/// [`StorageError::Backend`].
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Whether the bucket exists.
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool>;

    /// Create the bucket.
    async fn make_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Store `length` bytes read from `reader` under `key`, replacing any
    /// previous object with the same key.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        reader: UploadReader,
        length: u64,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Every key in the bucket, in backend order.
    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<String>>;

    /// Open an object for reading.
    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader>;
}
