use boxkit_protocol::UploadPart;

use crate::{TransferError, UploadSession};

/// A part read from the content stream that the server has not confirmed yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightPart {
    offset: u64,
    chunk: Vec<u8>,
}

impl InFlightPart {
    /// Creates a part holding `chunk` at byte `offset` within the file.
    pub fn new(offset: u64, chunk: Vec<u8>) -> Self {
        Self { offset, chunk }
    }

    /// Byte offset within the file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Raw part content.
    pub fn chunk(&self) -> &[u8] {
        &self.chunk
    }

    /// Size of this part in bytes.
    pub fn size(&self) -> u64 {
        self.chunk.len() as u64
    }

    /// Byte offset one past the end of this part.
    pub fn end(&self) -> u64 {
        self.offset + self.size()
    }

    /// Sends this part to `session`.
    pub fn upload<S: UploadSession + ?Sized>(
        &self,
        session: &S,
        total_size: u64,
    ) -> Result<UploadPart, TransferError> {
        session.upload_part_bytes(&self.chunk, self.offset, total_size)
    }
}

/// The uploader's single in-flight slot.
///
/// Transitions are `Idle -> InFlight` before a part is transferred and
/// `InFlight -> Idle` once the server confirms it. A failed transfer leaves
/// the part in the slot so the next attempt picks it up unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PartSlot {
    #[default]
    Idle,
    InFlight(InFlightPart),
}

impl PartSlot {
    /// Empties the slot, returning the part it held.
    pub fn take(&mut self) -> Option<InFlightPart> {
        match std::mem::take(self) {
            PartSlot::Idle => None,
            PartSlot::InFlight(part) => Some(part),
        }
    }

    /// Offset of the in-flight part, if any.
    pub fn offset(&self) -> Option<u64> {
        match self {
            PartSlot::Idle => None,
            PartSlot::InFlight(part) => Some(part.offset()),
        }
    }

    /// Returns `true` when no part is in flight.
    pub fn is_idle(&self) -> bool {
        matches!(self, PartSlot::Idle)
    }
}
