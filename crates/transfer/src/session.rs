use boxkit_protocol::{FileObject, UploadPart};

use crate::{Sha1Digest, TransferError};

/// Server-side upload session driven by a [`ChunkedUploader`](crate::ChunkedUploader).
///
/// `boxkit-client` implements this over HTTP. Implementations report their
/// own failures through [`TransferError::Session`] so the engine can pass
/// them to the caller unchanged.
pub trait UploadSession {
    /// Session identifier, used for logging and progress reports.
    fn id(&self) -> &str;

    /// Number of parts the server expects.
    fn total_parts(&self) -> u64;

    /// Size of every part except possibly the last.
    fn part_size(&self) -> u64;

    /// Parts the server has already persisted for this session.
    fn get_parts(&self) -> Result<Vec<UploadPart>, TransferError>;

    /// Uploads one byte range starting at `offset`.
    fn upload_part_bytes(
        &self,
        part_bytes: &[u8],
        offset: u64,
        total_size: u64,
    ) -> Result<UploadPart, TransferError>;

    /// Finalizes the session from the whole-file SHA-1 and the ordered parts.
    fn commit(
        &self,
        content_sha1: &Sha1Digest,
        parts: &[UploadPart],
    ) -> Result<FileObject, TransferError>;

    /// Cancels the session and discards uploaded parts.
    fn abort(&self) -> Result<bool, TransferError>;
}

impl<S: UploadSession + ?Sized> UploadSession for &S {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn total_parts(&self) -> u64 {
        (**self).total_parts()
    }

    fn part_size(&self) -> u64 {
        (**self).part_size()
    }

    fn get_parts(&self) -> Result<Vec<UploadPart>, TransferError> {
        (**self).get_parts()
    }

    fn upload_part_bytes(
        &self,
        part_bytes: &[u8],
        offset: u64,
        total_size: u64,
    ) -> Result<UploadPart, TransferError> {
        (**self).upload_part_bytes(part_bytes, offset, total_size)
    }

    fn commit(
        &self,
        content_sha1: &Sha1Digest,
        parts: &[UploadPart],
    ) -> Result<FileObject, TransferError> {
        (**self).commit(content_sha1, parts)
    }

    fn abort(&self) -> Result<bool, TransferError> {
        (**self).abort()
    }
}
