//! Response payloads and the in-memory object representation used by the
//! download path. Everything here serializes as JSON via `serde`.

pub mod bucket;
pub mod object;
