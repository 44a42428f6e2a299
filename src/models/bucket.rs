//! Listing of the configured bucket.

use serde::{Deserialize, Serialize};

/// Body of `GET /list_objects/`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BucketListing {
    /// Name of the bucket that was listed.
    pub bucket: String,

    /// Object keys in the order the backend returned them.
    pub objects: Vec<String>,
}
