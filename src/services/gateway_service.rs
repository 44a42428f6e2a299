//! GatewayService: the bucket-scoped operations behind every HTTP handler.
//!
//! Holds the shared storage handle and the configured bucket name. Cloning is
//! cheap; the router hands one clone to each request.

use super::storage::{ObjectStorage, StorageResult};
use crate::models::object::{DownloadedObject, content_type_for_key};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use std::{io, sync::Arc};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, error, info};

/// Outcome of [`GatewayService::ensure_bucket`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStatus {
    Created,
    AlreadyExists,
}

#[derive(Clone)]
pub struct GatewayService {
    pub storage: Arc<dyn ObjectStorage>,
    pub bucket: Arc<str>,
}

impl GatewayService {
    pub fn new(storage: Arc<dyn ObjectStorage>, bucket: impl Into<Arc<str>>) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Make sure the configured bucket exists, creating it when missing.
    ///
    /// Must complete before the server accepts traffic.
    pub async fn ensure_bucket(&self) -> StorageResult<BucketStatus> {
        if self.storage.bucket_exists(&self.bucket).await? {
            info!(bucket = %self.bucket, "bucket already exists");
            return Ok(BucketStatus::AlreadyExists);
        }

        self.storage.make_bucket(&self.bucket).await?;
        info!(bucket = %self.bucket, "bucket created");
        Ok(BucketStatus::Created)
    }

    /// Store the bytes of `stream` under `key`.
    ///
    /// The stream is spooled to an anonymous temporary file so the exact
    /// length is known up front without holding the payload in memory; the
    /// file is then streamed to the backend. Returns the stored byte count.
    pub async fn upload_object_stream<S>(
        &self,
        key: &str,
        content_type: &str,
        stream: S,
    ) -> StorageResult<u64>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        let (file, size_bytes) = spool_to_tempfile(stream).await.map_err(|err| {
            error!(key = %key, error = %err, "spooling upload failed");
            err
        })?;
        debug!(key = %key, size_bytes, "spooled upload");

        self.storage
            .put_object(&self.bucket, key, Box::pin(file), size_bytes, content_type)
            .await?;
        Ok(size_bytes)
    }

    pub async fn list_objects(&self) -> StorageResult<Vec<String>> {
        self.storage.list_objects(&self.bucket).await
    }

    /// Fetch an object fully into memory.
    ///
    /// The backend reader is dropped as soon as reading stops, whether or not
    /// the read succeeded.
    pub async fn download_object(&self, key: &str) -> StorageResult<DownloadedObject> {
        let mut reader = self.storage.get_object(&self.bucket, key).await?;
        let mut data = Vec::new();
        let read = reader.read_to_end(&mut data).await;
        drop(reader);
        if let Err(err) = read {
            error!(key = %key, read_bytes = data.len(), error = %err, "object read failed");
            return Err(err.into());
        }

        Ok(DownloadedObject {
            key: key.to_string(),
            content_type: content_type_for_key(key),
            data: Bytes::from(data),
        })
    }
}

/// Write every chunk of `stream` to a fresh temporary file and rewind it.
///
/// The file is unlinked on creation, so it disappears once the handle is dropped.
async fn spool_to_tempfile<S>(stream: S) -> io::Result<(File, u64)>
where
    S: Stream<Item = io::Result<Bytes>> + Send,
{
    let std_file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(io::Error::other)??;
    let mut file = File::from_std(std_file);

    let mut size_bytes: u64 = 0;
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.rewind().await?;

    Ok((file, size_bytes))
}
