//! Chunked upload engine with resume support and progress tracking.
//!
//! A [`ChunkedUploader`] splits a byte stream into the fixed-size parts an
//! [`UploadSession`] expects, uploads them one at a time while folding every
//! part into a rolling SHA-1, and commits the session once all parts are
//! accounted for. After a failure, [`ChunkedUploader::resume`] reconciles
//! local state with the server's part listing and continues.

mod chunked;
mod progress;
mod session;
mod types;
mod validation;

pub use chunked::{
    ChunkSource, ChunkedUploader, NOT_READY_BACKOFF, Reconciliation, Sha1Digest, digest_header,
    reconcile, sha1_bytes,
};
pub use progress::{ProgressCallback, ProgressTracker, SpeedCalculator};
pub use session::UploadSession;
pub use types::{InFlightPart, PartSlot};
pub use validation::validate_session_geometry;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("the upload has been previously aborted; retry with a new upload session")]
    Aborted,

    #[error("upload session error: {0}")]
    Session(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("part at offset {offset} was already read from the stream but is not on the server")]
    PartUnavailable { offset: u64 },

    #[error("content stream ended before the part at offset {offset}")]
    TruncatedStream { offset: u64 },

    #[error("invalid session geometry: {0}")]
    InvalidGeometry(String),
}

impl TransferError {
    /// Wraps a collaborator failure.
    pub fn session<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Session(err.into())
    }
}
