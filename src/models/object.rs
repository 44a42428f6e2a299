//! Objects as seen by the HTTP layer.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Body of a successful `POST /uploadfile/`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Key the file was stored under (its original file name).
    pub filename: String,

    pub message: String,
}

/// A stored object read fully into memory, ready to be sent as an attachment.
#[derive(Clone, Debug)]
pub struct DownloadedObject {
    pub key: String,

    /// Content type derived from the key, see [`content_type_for_key`].
    pub content_type: String,

    pub data: Bytes,
}

/// Guess a content type from the text after the last `.` in `key`.
///
/// `report.pdf` gives `application/pdf`; a key without a dot gives
/// `application/octet-stream`. No MIME table is consulted.
pub fn content_type_for_key(key: &str) -> String {
    match key.rsplit_once('.') {
        Some((_, ext)) => format!("application/{ext}"),
        None => "application/octet-stream".to_string(),
    }
}
