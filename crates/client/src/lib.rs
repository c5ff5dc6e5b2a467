//! Blocking HTTP client for chunked upload sessions.
//!
//! [`UploadClient`] opens sessions; [`HttpUploadSession`] implements
//! [`boxkit_transfer::UploadSession`] so a
//! [`ChunkedUploader`](boxkit_transfer::ChunkedUploader) can drive it.

pub mod client;
pub mod config;
pub mod error;
pub mod session;

#[cfg(test)]
mod mock;

pub use client::UploadClient;
pub use config::{ACCESS_TOKEN_ENV, ClientConfig};
pub use error::{ClientError, commit_retry_after};
pub use session::HttpUploadSession;
