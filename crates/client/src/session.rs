//! [`UploadSession`] over the upload-session REST endpoints.

use std::io::Read;
use std::time::Duration;

use boxkit_protocol::{
    CommitRequest, FileCollection, FileObject, PartsPage, SessionEndpoints, UploadPart,
    UploadPartResponse, UploadSessionInfo,
};
use boxkit_transfer::{
    ChunkedUploader, Sha1Digest, TransferError, UploadSession, digest_header, sha1_bytes,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_RANGE, CONTENT_TYPE, RETRY_AFTER};
use tracing::{debug, warn};

use crate::ClientError;

/// Page size requested from the part listing endpoint.
const PARTS_PAGE_LIMIT: i64 = 1000;

/// Wait suggested when a 202 commit response carries no `Retry-After`.
const DEFAULT_COMMIT_RETRY: Duration = Duration::from_secs(5);

/// An upload session driven over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUploadSession {
    http: Client,
    upload_url: String,
    info: UploadSessionInfo,
    commit_attributes: Option<serde_json::Value>,
}

impl HttpUploadSession {
    pub(crate) fn new(http: Client, upload_url: String, info: UploadSessionInfo) -> Self {
        Self {
            http,
            upload_url,
            info,
            commit_attributes: None,
        }
    }

    /// File attributes sent with the commit request (e.g. `content_modified_at`).
    pub fn with_commit_attributes(mut self, attributes: serde_json::Value) -> Self {
        self.commit_attributes = Some(attributes);
        self
    }

    /// Server-side session state as of creation.
    pub fn info(&self) -> &UploadSessionInfo {
        &self.info
    }

    /// Binds a [`ChunkedUploader`] to this session.
    pub fn chunked_uploader<R: Read>(self, content: R, file_size: u64) -> ChunkedUploader<Self, R> {
        ChunkedUploader::new(self, content, file_size)
    }

    /// Lists every part the server holds, walking limit-offset pages.
    pub fn list_parts(&self) -> Result<Vec<UploadPart>, ClientError> {
        let url = self.endpoint(|e| &e.list_parts, "/parts");
        let mut parts = Vec::new();
        let mut offset: u64 = 0;
        let mut limit = PARTS_PAGE_LIMIT;

        loop {
            let request = self
                .http
                .get(&url)
                .query(&[("offset", offset.to_string()), ("limit", limit.to_string())]);
            let page: PartsPage = send(request, "GET", &url)?.json()?;

            let fetched = page.entries.len();
            parts.extend(page.entries);

            if let Some(reported) = page.limit {
                if reported <= 0 {
                    return Err(ClientError::InvalidPaging(format!(
                        "server reported limit {reported} for a request of {limit}"
                    )));
                }
                limit = reported;
            }

            // `limit` is positive here.
            offset = page.offset.unwrap_or(offset) + limit as u64;
            if fetched == 0 || offset >= page.total_count {
                break;
            }
        }

        Ok(parts)
    }

    /// Uploads one byte range.
    pub fn upload_part(
        &self,
        part_bytes: &[u8],
        offset: u64,
        total_size: u64,
    ) -> Result<UploadPart, ClientError> {
        let url = self.endpoint(|e| &e.upload_part, "");
        let last = (offset + part_bytes.len() as u64).saturating_sub(1);

        let request = self
            .http
            .put(&url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header("Digest", digest_header(&sha1_bytes(part_bytes)))
            .header(CONTENT_RANGE, format!("bytes {offset}-{last}/{total_size}"))
            .body(part_bytes.to_vec());

        let resp: UploadPartResponse = send(request, "PUT", &url)?.json()?;
        Ok(resp.part)
    }

    /// Commits the session.
    ///
    /// A `202 Accepted` means the server is still processing parts and is
    /// reported as [`ClientError::CommitPending`].
    pub fn commit_parts(
        &self,
        content_sha1: &Sha1Digest,
        parts: &[UploadPart],
    ) -> Result<FileObject, ClientError> {
        let url = self.endpoint(|e| &e.commit, "/commit");
        let body = CommitRequest {
            parts: parts.to_vec(),
            attributes: self.commit_attributes.clone(),
        };

        let request = self
            .http
            .post(&url)
            .header("Digest", digest_header(content_sha1))
            .json(&body);

        let resp = send(request, "POST", &url)?;
        if resp.status() == StatusCode::ACCEPTED {
            let retry_after = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(DEFAULT_COMMIT_RETRY, Duration::from_secs);
            return Err(ClientError::CommitPending { retry_after });
        }

        let files: FileCollection = resp.json()?;
        files
            .entries
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::UnexpectedResponse("commit returned no file".into()))
    }

    /// Deletes the session. Returns `false` when the server refuses.
    pub fn abort_session(&self) -> Result<bool, ClientError> {
        let url = self.endpoint(|e| &e.abort, "");
        let resp = self.http.delete(&url).send()?;
        let status = resp.status();
        debug!(method = "DELETE", url = %url, status = status.as_u16(), "upload session request");

        if !status.is_success() {
            warn!(session = %self.info.id, status = status.as_u16(), "abort rejected");
        }
        Ok(status.is_success())
    }

    /// Resolves an endpoint, preferring the URL the server advertised.
    fn endpoint(&self, advertised: fn(&SessionEndpoints) -> &String, suffix: &str) -> String {
        self.info
            .session_endpoints
            .as_ref()
            .map(advertised)
            .filter(|url| !url.is_empty())
            .cloned()
            .unwrap_or_else(|| {
                format!(
                    "{}/files/upload_sessions/{}{suffix}",
                    self.upload_url, self.info.id
                )
            })
    }
}

/// Sends a request, turning non-2xx responses into [`ClientError::Api`].
pub(crate) fn send(request: RequestBuilder, method: &str, url: &str) -> Result<Response, ClientError> {
    let resp = request.send()?;
    let status = resp.status();
    debug!(method, url, status = status.as_u16(), "upload session request");

    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(ClientError::from_response(status.as_u16(), &body))
}

impl UploadSession for HttpUploadSession {
    fn id(&self) -> &str {
        &self.info.id
    }

    fn total_parts(&self) -> u64 {
        self.info.total_parts
    }

    fn part_size(&self) -> u64 {
        self.info.part_size
    }

    fn get_parts(&self) -> Result<Vec<UploadPart>, TransferError> {
        Ok(self.list_parts()?)
    }

    fn upload_part_bytes(
        &self,
        part_bytes: &[u8],
        offset: u64,
        total_size: u64,
    ) -> Result<UploadPart, TransferError> {
        Ok(self.upload_part(part_bytes, offset, total_size)?)
    }

    fn commit(
        &self,
        content_sha1: &Sha1Digest,
        parts: &[UploadPart],
    ) -> Result<FileObject, TransferError> {
        Ok(self.commit_parts(content_sha1, parts)?)
    }

    fn abort(&self) -> Result<bool, TransferError> {
        Ok(self.abort_session()?)
    }
}
