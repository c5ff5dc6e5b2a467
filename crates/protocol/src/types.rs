use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A part the server has accepted for an upload session.
///
/// Returned by the part upload and part listing endpoints, and sent back
/// verbatim (in offset order) when the session is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPart {
    pub part_id: String,
    pub offset: u64,
    pub size: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha1: String,
}

impl UploadPart {
    /// Byte offset one past the last byte of this part.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// URLs the server advertises for driving an upload session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEndpoints {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub upload_part: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub commit: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub abort: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub list_parts: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log_event: String,
}

/// Server-side state of a chunked upload session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSessionInfo {
    pub id: String,
    #[serde(rename = "type", default = "default_session_type")]
    pub kind: String,
    pub total_parts: u64,
    pub part_size: u64,
    #[serde(default)]
    pub num_parts_processed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_endpoints: Option<SessionEndpoints>,
}

fn default_session_type() -> String {
    "upload_session".into()
}

/// A specific version of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersion {
    pub id: String,
    #[serde(rename = "type", default = "default_file_version_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha1: String,
}

fn default_file_version_type() -> String {
    "file_version".into()
}

/// Minimal folder reference embedded in file objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderMini {
    pub id: String,
    #[serde(rename = "type", default = "default_folder_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

fn default_folder_type() -> String {
    "folder".into()
}

/// A file as returned once an upload session is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(rename = "type", default = "default_file_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sha1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_version: Option<FileVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<FolderMini>,
}

fn default_file_type() -> String {
    "file".into()
}

/// Current state of a chunked upload, as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "committing")]
    Committing,
    #[serde(rename = "committed")]
    Committed,
    #[serde(rename = "aborted")]
    Aborted,
}

/// Progress snapshot emitted by the chunked uploader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub session_id: String,
    pub status: UploadStatus,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub parts_done: u64,
    pub total_parts: u64,
}

impl UploadProgress {
    /// Returns the upload progress as a percentage (0-100).
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.transferred_bytes as f64 / self.total_bytes as f64 * 100.0
    }

    /// Bytes not yet accounted for.
    pub fn remaining_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.transferred_bytes)
    }
}
