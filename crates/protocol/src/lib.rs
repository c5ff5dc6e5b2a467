//! Wire types for the upload-session REST endpoints.
//!
//! Field names follow the API's snake_case JSON, so most structs need no
//! renaming. Optional fields are omitted on serialization when empty.

pub mod messages;
pub mod types;

pub use messages::{
    ApiErrorBody, CommitRequest, CreateUploadSessionRequest, FileCollection, PartsPage,
    UploadPartResponse,
};
pub use types::{
    FileObject, FileVersion, FolderMini, SessionEndpoints, UploadPart, UploadProgress,
    UploadSessionInfo, UploadStatus,
};
