use crate::TransferError;

/// Validates that a session's part layout can describe a file of `file_size` bytes.
///
/// Rejects:
/// - A zero part size
/// - A part count that differs from `ceil(file_size / part_size)`
/// - Part counts or sizes that cannot be addressed on this platform
pub fn validate_session_geometry(
    file_size: u64,
    part_size: u64,
    total_parts: u64,
) -> Result<(), TransferError> {
    if part_size == 0 {
        return Err(TransferError::InvalidGeometry("part size is zero".into()));
    }

    if usize::try_from(part_size).is_err() {
        return Err(TransferError::InvalidGeometry(format!(
            "part size {part_size} exceeds addressable memory"
        )));
    }

    let expected = file_size.div_ceil(part_size);
    if total_parts != expected {
        return Err(TransferError::InvalidGeometry(format!(
            "{total_parts} parts of {part_size} bytes cannot hold {file_size} bytes \
             (expected {expected})"
        )));
    }

    Ok(())
}
