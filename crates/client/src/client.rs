//! Upload-session client.
//!
//! Blocking HTTP client using `reqwest` with Bearer token authentication.

use std::fs::File;
use std::path::Path;

use boxkit_protocol::{CreateUploadSessionRequest, UploadSessionInfo};
use boxkit_transfer::ChunkedUploader;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::info;

use crate::session::{HttpUploadSession, send};
use crate::{ClientConfig, ClientError};

/// Opens and looks up chunked upload sessions.
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: Client,
    upload_url: String,
}

impl UploadClient {
    /// Creates a client from `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        if config.access_token.is_empty() {
            return Err(ClientError::Config("access token is not set".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.access_token))
                .map_err(|_| ClientError::Config("access token is not a valid header".into()))?,
        );

        let http = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            upload_url: config.upload_url.trim_end_matches('/').to_string(),
        })
    }

    /// Opens a session for a new file in `folder_id`.
    pub fn create_upload_session(
        &self,
        folder_id: &str,
        file_size: u64,
        file_name: &str,
    ) -> Result<HttpUploadSession, ClientError> {
        let url = format!("{}/files/upload_sessions", self.upload_url);
        let body = CreateUploadSessionRequest {
            folder_id: Some(folder_id.to_string()),
            file_size,
            file_name: Some(file_name.to_string()),
        };
        self.open(&url, &body)
    }

    /// Opens a session that uploads a new version of `file_id`.
    pub fn create_upload_session_for_new_version(
        &self,
        file_id: &str,
        file_size: u64,
        file_name: Option<&str>,
    ) -> Result<HttpUploadSession, ClientError> {
        let url = format!("{}/files/{file_id}/upload_sessions", self.upload_url);
        let body = CreateUploadSessionRequest {
            folder_id: None,
            file_size,
            file_name: file_name.map(str::to_string),
        };
        self.open(&url, &body)
    }

    /// Fetches an existing session, e.g. to resume it from another process.
    pub fn get_upload_session(&self, session_id: &str) -> Result<HttpUploadSession, ClientError> {
        let url = format!("{}/files/upload_sessions/{session_id}", self.upload_url);
        let info: UploadSessionInfo = send(self.http.get(&url), "GET", &url)?.json()?;
        Ok(self.upload_session(info))
    }

    /// Wraps session state obtained elsewhere.
    pub fn upload_session(&self, info: UploadSessionInfo) -> HttpUploadSession {
        HttpUploadSession::new(self.http.clone(), self.upload_url.clone(), info)
    }

    /// Opens a session for the file at `path` and binds an uploader to it.
    pub fn chunked_uploader_for_path(
        &self,
        folder_id: &str,
        path: &Path,
    ) -> Result<ChunkedUploader<HttpUploadSession, File>, ClientError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Config(format!("no file name in {}", path.display())))?;

        let file = File::open(path)?;
        let file_size = file.metadata()?.len();
        let session = self.create_upload_session(folder_id, file_size, file_name)?;
        Ok(session.chunked_uploader(file, file_size))
    }

    fn open(
        &self,
        url: &str,
        body: &CreateUploadSessionRequest,
    ) -> Result<HttpUploadSession, ClientError> {
        let info: UploadSessionInfo = send(self.http.post(url).json(body), "POST", url)?.json()?;
        info!(
            session = %info.id,
            total_parts = info.total_parts,
            part_size = info.part_size,
            "upload session created"
        );
        Ok(self.upload_session(info))
    }
}
