//! HTTP gateway exposing upload, list, and download over a single
//! object-storage bucket.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
