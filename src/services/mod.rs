pub mod gateway_service;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory_storage;
pub mod s3_storage;
pub mod storage;
