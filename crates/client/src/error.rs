use std::time::Duration;

use boxkit_protocol::ApiErrorBody;
use boxkit_transfer::TransferError;

/// Errors from the upload-session client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("commit accepted but parts are still processing; retry in {retry_after:?}")]
    CommitPending { retry_after: Duration },

    #[error("invalid paging: {0}")]
    InvalidPaging(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Builds an [`ClientError::Api`] from a non-2xx status and its body.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(err) if !err.code.is_empty() || !err.message.is_empty() => Self::Api {
                status,
                code: err.code,
                message: err.message,
            },
            _ => Self::Api {
                status,
                code: String::new(),
                message: body.to_string(),
            },
        }
    }
}

impl From<ClientError> for TransferError {
    fn from(err: ClientError) -> Self {
        TransferError::session(err)
    }
}

/// Retry hint carried by an upload that failed because its commit is still
/// being processed by the server.
pub fn commit_retry_after(err: &TransferError) -> Option<Duration> {
    let TransferError::Session(inner) = err else {
        return None;
    };
    match inner.downcast_ref::<ClientError>() {
        Some(ClientError::CommitPending { retry_after }) => Some(*retry_after),
        _ => None,
    }
}
