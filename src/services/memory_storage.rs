//! In-process [`ObjectStorage`] used by the test suite.
//!
//! Keys are kept in a `BTreeMap`, so listings come back sorted. The store can
//! be switched offline to simulate a backend outage, or made to hand out
//! readers that fail halfway through an object.

use super::storage::{ObjectReader, ObjectStorage, StorageError, StorageResult, UploadReader};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::{BTreeMap, HashMap},
    io::{self, Cursor},
    pin::Pin,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

#[derive(Clone, Debug)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct MemoryStorage {
    buckets: RwLock<HashMap<String, BTreeMap<String, StoredObject>>>,
    offline: AtomicBool,
    broken_reads: AtomicBool,
    bucket_creations: AtomicUsize,
    released_readers: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds an empty `bucket`.
    pub fn with_bucket(bucket: &str) -> Self {
        let storage = Self::default();
        storage
            .write_buckets()
            .insert(bucket.to_string(), BTreeMap::new());
        storage
    }

    /// While offline every call fails with [`StorageError::Backend`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// While set, `get_object` returns a reader that yields the first half of
    /// the object and then fails with `ConnectionReset`.
    pub fn set_broken_reads(&self, broken: bool) {
        self.broken_reads.store(broken, Ordering::SeqCst);
    }

    /// Number of readers from broken reads that have been dropped.
    pub fn released_readers(&self) -> usize {
        self.released_readers.load(Ordering::SeqCst)
    }

    /// Number of successful `make_bucket` calls.
    pub fn bucket_creations(&self) -> usize {
        self.bucket_creations.load(Ordering::SeqCst)
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.read_buckets()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Backend(
                "connection refused: storage backend unreachable".into(),
            ));
        }
        Ok(())
    }

    fn read_buckets(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, BTreeMap<String, StoredObject>>> {
        self.buckets.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_buckets(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, BTreeMap<String, StoredObject>>> {
        self.buckets
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Serves `data` and then fails; counts itself in `released` when dropped.
struct BrokenReader {
    data: Bytes,
    served: usize,
    released: Arc<AtomicUsize>,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let served = self.served;
        if served < self.data.len() {
            let n = buf.remaining().min(self.data.len() - served);
            buf.put_slice(&self.data[served..served + n]);
            self.served += n;
            return Poll::Ready(Ok(()));
        }
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "storage stream reset mid-transfer",
        )))
    }
}

impl Drop for BrokenReader {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

fn no_such_bucket(bucket: &str) -> StorageError {
    StorageError::Backend(format!("NoSuchBucket: bucket `{bucket}` does not exist"))
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        self.ensure_online()?;
        Ok(self.read_buckets().contains_key(bucket))
    }

    async fn make_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.ensure_online()?;
        let mut buckets = self.write_buckets();
        if buckets.contains_key(bucket) {
            return Err(StorageError::Backend(format!(
                "BucketAlreadyOwnedByYou: bucket `{bucket}` already exists"
            )));
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        self.bucket_creations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut reader: UploadReader,
        length: u64,
        content_type: &str,
    ) -> StorageResult<()> {
        self.ensure_online()?;
        if !self.read_buckets().contains_key(bucket) {
            return Err(no_such_bucket(bucket));
        }

        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        if data.len() as u64 != length {
            return Err(StorageError::Backend(format!(
                "IncompleteBody: expected {length} bytes, received {}",
                data.len()
            )));
        }

        let mut buckets = self.write_buckets();
        let objects = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data: Bytes::from(data),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<String>> {
        self.ensure_online()?;
        self.read_buckets()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .ok_or_else(|| no_such_bucket(bucket))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectReader> {
        self.ensure_online()?;
        let buckets = self.read_buckets();
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        let object = objects.get(key).ok_or_else(|| StorageError::NoSuchKey {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })?;
        if self.broken_reads.load(Ordering::SeqCst) {
            return Ok(Box::pin(BrokenReader {
                data: object.data.slice(..object.data.len() / 2),
                served: 0,
                released: self.released_readers.clone(),
            }));
        }
        Ok(Box::pin(Cursor::new(object.data.clone())))
    }
}
