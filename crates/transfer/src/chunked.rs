use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use boxkit_protocol::{FileObject, UploadPart, UploadProgress, UploadStatus};
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use crate::progress::ProgressCallback;
use crate::types::{InFlightPart, PartSlot};
use crate::{TransferError, UploadSession, validate_session_geometry};

/// Raw SHA-1 digest bytes.
pub type Sha1Digest = [u8; 20];

/// Pause after a `WouldBlock` read before polling the stream again.
pub const NOT_READY_BACKOFF: Duration = Duration::from_millis(5);

// ---------------------------------------------------------------------------
// Checksum helpers
// ---------------------------------------------------------------------------

/// Computes the SHA-1 of `data`.
pub fn sha1_bytes(data: &[u8]) -> Sha1Digest {
    finish(Sha1::new_with_prefix(data))
}

/// Formats a digest as the value of a `Digest` request header.
pub fn digest_header(digest: &Sha1Digest) -> String {
    format!("sha={}", STANDARD.encode(digest))
}

fn finish(hasher: Sha1) -> Sha1Digest {
    let mut out = [0u8; 20];
    out.copy_from_slice(&hasher.finalize());
    out
}

// ---------------------------------------------------------------------------
// ChunkSource
// ---------------------------------------------------------------------------

/// Assembles fixed-size chunks from a byte stream.
///
/// Bytes of a partially assembled chunk are kept across calls, so a read
/// error does not lose data already pulled from the stream.
pub struct ChunkSource<R> {
    reader: R,
    position: u64,
    pending: Vec<u8>,
    exhausted: bool,
}

impl<R: Read> ChunkSource<R> {
    /// Wraps `reader`, positioned at the start of the content.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            position: 0,
            pending: Vec::new(),
            exhausted: false,
        }
    }

    /// Reads the next chunk of up to `len` bytes.
    ///
    /// Returns fewer bytes only when the stream is exhausted, and an empty
    /// chunk once nothing is left. `WouldBlock` and `Interrupted` reads mean
    /// "no bytes yet" and assembly keeps going; a `WouldBlock` read sleeps for
    /// [`NOT_READY_BACKOFF`] first so a slow non-blocking reader does not spin.
    pub fn next_chunk(&mut self, len: usize) -> Result<Vec<u8>, TransferError> {
        while self.pending.len() < len && !self.exhausted {
            let filled = self.pending.len();
            self.pending.resize(len, 0);
            match self.reader.read(&mut self.pending[filled..]) {
                Ok(0) => {
                    self.pending.truncate(filled);
                    self.exhausted = true;
                }
                Ok(n) => self.pending.truncate(filled + n),
                Err(e) if e.kind() == ErrorKind::Interrupted => self.pending.truncate(filled),
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    self.pending.truncate(filled);
                    std::thread::sleep(NOT_READY_BACKOFF);
                }
                Err(e) => {
                    self.pending.truncate(filled);
                    return Err(e.into());
                }
            }
        }

        let chunk = std::mem::take(&mut self.pending);
        self.position += chunk.len() as u64;
        Ok(chunk)
    }

    /// Bytes handed out as complete chunks so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns `true` once the stream has signalled end of data.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.pending.is_empty()
    }

    /// Unwraps the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

// ---------------------------------------------------------------------------
// Resume reconciliation
// ---------------------------------------------------------------------------

/// Local state rebuilt from the server's part listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Parts to treat as committed, in offset order.
    pub committed: Vec<UploadPart>,
    /// The in-flight part reached the server before its response was lost.
    pub in_flight_landed: bool,
}

/// Rebuilds the committed list from `listing` given the offset of the part
/// that was in flight when the previous attempt failed.
///
/// With a part in flight, the committed list is the longest run of listed
/// parts that starts at offset 0, has no gaps, and ends at or below the
/// in-flight offset. Without one, the committed list starts empty and the
/// uploader walks the stream again, taking server records from its offset
/// cache.
pub fn reconcile(in_flight_offset: Option<u64>, listing: &[UploadPart]) -> Reconciliation {
    let Some(in_flight) = in_flight_offset else {
        return Reconciliation {
            committed: Vec::new(),
            in_flight_landed: false,
        };
    };

    let mut sorted: Vec<&UploadPart> = listing.iter().collect();
    sorted.sort_by_key(|part| part.offset);
    sorted.dedup_by_key(|part| part.offset);

    let mut committed = Vec::new();
    let mut expected = 0;
    for part in sorted {
        if part.offset > in_flight || part.offset != expected {
            break;
        }
        expected = part.end();
        committed.push(part.clone());
    }

    let in_flight_landed = listing.iter().any(|part| part.offset == in_flight);

    Reconciliation {
        committed,
        in_flight_landed,
    }
}

// ---------------------------------------------------------------------------
// ChunkedUploader
// ---------------------------------------------------------------------------

/// Uploads a byte stream through an [`UploadSession`], one part at a time.
///
/// Call [`start`](Self::start) for a fresh upload or [`resume`](Self::resume)
/// after a failure. Both return the committed file. [`abort`](Self::abort)
/// makes the uploader permanently unusable.
pub struct ChunkedUploader<S, R> {
    session: S,
    content: Option<ChunkSource<R>>,
    file_size: u64,
    committed: Vec<UploadPart>,
    definitions: HashMap<u64, UploadPart>,
    slot: PartSlot,
    digest: Sha1,
    digested_through: u64,
    aborted: bool,
    on_progress: Option<ProgressCallback>,
}

impl<S: UploadSession, R: Read> ChunkedUploader<S, R> {
    /// Binds `content` (exactly `file_size` bytes) to `session`.
    pub fn new(session: S, content: R, file_size: u64) -> Self {
        Self {
            session,
            content: Some(ChunkSource::new(content)),
            file_size,
            committed: Vec::new(),
            definitions: HashMap::new(),
            slot: PartSlot::Idle,
            digest: Sha1::new(),
            digested_through: 0,
            aborted: false,
            on_progress: None,
        }
    }

    /// Reports progress after every accounted part and around commit.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Uploads every part and commits the session.
    pub fn start(&mut self) -> Result<FileObject, TransferError> {
        self.ensure_active()?;
        self.upload()?;
        self.commit()
    }

    /// Continues a failed upload from the server's record of persisted parts.
    pub fn resume(&mut self) -> Result<FileObject, TransferError> {
        self.ensure_active()?;

        let listing = self.session.get_parts()?;
        let in_flight = self.slot.offset();
        let Reconciliation {
            committed,
            in_flight_landed,
        } = reconcile(in_flight, &listing);

        self.committed = committed;
        if in_flight_landed {
            self.slot = PartSlot::Idle;
        }
        self.definitions = listing
            .into_iter()
            .map(|part| (part.offset, part))
            .collect();

        info!(
            session = %self.session.id(),
            listed = self.definitions.len(),
            committed = self.committed.len(),
            in_flight = ?self.slot.offset(),
            "resuming upload"
        );

        self.upload()?;
        self.commit()
    }

    /// Cancels the upload and discards the server-side session.
    ///
    /// Safe to call more than once; every call re-issues the remote abort.
    pub fn abort(&mut self) -> Result<bool, TransferError> {
        self.content = None;
        self.committed.clear();
        self.slot = PartSlot::Idle;
        self.aborted = true;

        let aborted = self.session.abort()?;
        info!(session = %self.session.id(), aborted, "upload aborted");
        self.emit(UploadStatus::Aborted);
        Ok(aborted)
    }

    /// Parts accounted for so far, in offset order.
    pub fn committed_parts(&self) -> &[UploadPart] {
        &self.committed
    }

    /// The part currently in flight, if any.
    pub fn in_flight(&self) -> &PartSlot {
        &self.slot
    }

    /// Returns `true` once [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Total size of the content in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// The session this uploader drives.
    pub fn session(&self) -> &S {
        &self.session
    }

    fn ensure_active(&self) -> Result<(), TransferError> {
        if self.aborted {
            Err(TransferError::Aborted)
        } else {
            Ok(())
        }
    }

    fn upload(&mut self) -> Result<(), TransferError> {
        let total_parts = self.session.total_parts();
        let part_size = self.session.part_size();
        validate_session_geometry(self.file_size, part_size, total_parts)?;

        while (self.committed.len() as u64) < total_parts {
            let offset = self.committed.len() as u64 * part_size;
            let part = match self.slot.take() {
                Some(part) if part.offset() == offset => part,
                Some(part) => {
                    // The slot is ahead of a gap in the committed list.
                    self.slot = PartSlot::InFlight(part);
                    self.recover_consumed(offset)?;
                    continue;
                }
                None if offset < self.digested_through => {
                    self.recover_consumed(offset)?;
                    continue;
                }
                None => self.read_part(offset, part_size)?,
            };

            if part.offset() == self.digested_through {
                self.digest.update(part.chunk());
                self.digested_through = part.end();
            }

            let uploaded = match self.definitions.get(&part.offset()) {
                Some(existing) => {
                    debug!(offset = part.offset(), size = part.size(), "reusing uploaded part");
                    Ok(existing.clone())
                }
                None => part.upload(&self.session, self.file_size),
            };

            match uploaded {
                Ok(record) => {
                    debug!(offset = record.offset, size = record.size, part_id = %record.part_id, "part uploaded");
                    self.record(record);
                }
                Err(e) => {
                    self.slot = PartSlot::InFlight(part);
                    return Err(e);
                }
            }
        }

        Ok(())
    }

    /// Accounts for a part whose bytes an earlier attempt already consumed and
    /// hashed. Only the server's record can stand in for it.
    fn recover_consumed(&mut self, offset: u64) -> Result<(), TransferError> {
        let record = self
            .definitions
            .get(&offset)
            .cloned()
            .ok_or(TransferError::PartUnavailable { offset })?;
        debug!(offset, size = record.size, "part already on server");
        self.record(record);
        Ok(())
    }

    fn read_part(&mut self, offset: u64, part_size: u64) -> Result<InFlightPart, TransferError> {
        let source = self.content.as_mut().ok_or(TransferError::Aborted)?;
        if source.position() != offset {
            return Err(TransferError::PartUnavailable { offset });
        }

        let expected = part_size.min(self.file_size.saturating_sub(offset));
        let len = usize::try_from(expected)
            .map_err(|_| TransferError::InvalidGeometry(format!("part size {part_size}")))?;
        let chunk = source.next_chunk(len)?;
        if chunk.len() != len {
            return Err(TransferError::TruncatedStream { offset });
        }
        Ok(InFlightPart::new(offset, chunk))
    }

    fn record(&mut self, part: UploadPart) {
        self.definitions.insert(part.offset, part.clone());
        self.committed.push(part);
        self.emit(UploadStatus::InProgress);
    }

    fn commit(&mut self) -> Result<FileObject, TransferError> {
        let content_sha1 = finish(self.digest.clone());
        info!(
            session = %self.session.id(),
            parts = self.committed.len(),
            sha1 = %hex::encode(content_sha1),
            "committing upload session"
        );
        self.emit(UploadStatus::Committing);

        let file = self.session.commit(&content_sha1, &self.committed)?;
        info!(session = %self.session.id(), file_id = %file.id, "upload committed");
        self.emit(UploadStatus::Committed);
        Ok(file)
    }

    fn emit(&self, status: UploadStatus) {
        let Some(cb) = &self.on_progress else {
            return;
        };
        cb(UploadProgress {
            session_id: self.session.id().to_string(),
            status,
            total_bytes: self.file_size,
            transferred_bytes: self.committed.iter().map(|p| p.size).sum(),
            parts_done: self.committed.len() as u64,
            total_parts: self.session.total_parts(),
        });
    }
}
