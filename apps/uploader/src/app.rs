//! Upload orchestration: opens the session, drives the uploader, and resumes
//! after failures.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use boxkit_client::{UploadClient, commit_retry_after};
use boxkit_protocol::{FileObject, UploadProgress, UploadStatus};
use boxkit_transfer::{
    ChunkedUploader, ProgressCallback, ProgressTracker, SpeedCalculator, TransferError,
    UploadSession,
};

use crate::config::Config;

/// What to upload and where.
pub struct UploadRequest<'a> {
    pub path: &'a Path,
    pub folder_id: &'a str,
    /// Continue an existing session instead of opening a new one.
    pub session_id: Option<&'a str>,
    pub resume_attempts: Option<u32>,
}

/// How failed attempts are retried.
#[derive(Debug, Clone, Copy)]
pub struct ResumePolicy {
    pub max_attempts: u32,
    /// Wait before resume attempt `n` is `backoff * n`.
    pub backoff: Duration,
}

/// Uploads one file and returns the committed file object.
pub fn run(config: &Config, request: &UploadRequest<'_>) -> anyhow::Result<FileObject> {
    let client = UploadClient::new(&config.client)?;

    let file = File::open(request.path)
        .with_context(|| format!("opening {}", request.path.display()))?;
    let file_size = file.metadata()?.len();
    let file_name = request
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .context("file name is not valid UTF-8")?;

    let session = match request.session_id {
        Some(id) => client.get_upload_session(id)?,
        None => client.create_upload_session(request.folder_id, file_size, file_name)?,
    };
    tracing::info!(
        session = %session.id(),
        file = %request.path.display(),
        size = file_size,
        parts = session.total_parts(),
        "uploading"
    );

    let tracker = ProgressTracker::new();
    tracker.on_progress(progress_logger());

    let mut uploader = session
        .chunked_uploader(file, file_size)
        .with_progress(tracker.reporter());

    let first = if request.session_id.is_some() {
        uploader.resume()
    } else {
        uploader.start()
    };

    let policy = ResumePolicy {
        max_attempts: request
            .resume_attempts
            .unwrap_or(config.max_resume_attempts),
        backoff: Duration::from_secs(2),
    };
    let file = drive(&mut uploader, first, policy)?;
    tracker.untrack(uploader.session().id());
    Ok(file)
}

/// Resumes `uploader` until it commits or the policy gives up, aborting the
/// session in the latter case.
pub fn drive<S: UploadSession, R: Read>(
    uploader: &mut ChunkedUploader<S, R>,
    first: Result<FileObject, TransferError>,
    policy: ResumePolicy,
) -> anyhow::Result<FileObject> {
    let mut result = first;
    let mut attempt = 0;

    loop {
        let err = match result {
            Ok(file) => return Ok(file),
            Err(err) => err,
        };

        if !is_resumable(&err) || attempt >= policy.max_attempts {
            tracing::error!(error = %err, attempts = attempt, "upload failed, aborting session");
            if let Err(abort_err) = uploader.abort() {
                tracing::warn!(error = %abort_err, "abort failed");
            }
            return Err(err.into());
        }

        attempt += 1;
        let wait = commit_retry_after(&err).unwrap_or(policy.backoff * attempt);
        tracing::warn!(error = %err, attempt, wait = ?wait, "upload interrupted, resuming");
        std::thread::sleep(wait);
        result = uploader.resume();
    }
}

/// Failures a later `resume()` can get past.
fn is_resumable(err: &TransferError) -> bool {
    matches!(err, TransferError::Session(_) | TransferError::Io(_))
}

/// Logs each part with throughput and ETA.
fn progress_logger() -> ProgressCallback {
    let speed = SpeedCalculator::new(None, None);
    let last = AtomicU64::new(0);
    let speed = Arc::new(speed);

    Box::new(move |p: UploadProgress| match p.status {
        UploadStatus::InProgress => {
            let previous = last.swap(p.transferred_bytes, Ordering::Relaxed);
            speed.add_sample(p.transferred_bytes.saturating_sub(previous));
            tracing::info!(
                parts = format!("{}/{}", p.parts_done, p.total_parts),
                percent = format!("{:.1}", p.percentage()),
                speed_kib_s = format!("{:.1}", speed.bytes_per_second() / 1024.0),
                eta = ?speed.eta(p.remaining_bytes()),
                "upload progress"
            );
        }
        UploadStatus::Committing => tracing::info!("all parts uploaded, committing"),
        _ => {}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxkit_protocol::UploadPart;
    use boxkit_transfer::Sha1Digest;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Debug, thiserror::Error)]
    #[error("connection reset")]
    struct Reset;

    /// Session whose first `failures` uploads fail before reaching the server.
    struct FlakySession {
        failures: Mutex<u32>,
        stored: Mutex<Vec<UploadPart>>,
        aborts: Mutex<u32>,
    }

    impl FlakySession {
        fn new(failures: u32) -> Self {
            Self {
                failures: Mutex::new(failures),
                stored: Mutex::new(Vec::new()),
                aborts: Mutex::new(0),
            }
        }
    }

    impl UploadSession for FlakySession {
        fn id(&self) -> &str {
            "S1"
        }

        fn total_parts(&self) -> u64 {
            3
        }

        fn part_size(&self) -> u64 {
            1000
        }

        fn get_parts(&self) -> Result<Vec<UploadPart>, TransferError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        fn upload_part_bytes(
            &self,
            part_bytes: &[u8],
            offset: u64,
            _total_size: u64,
        ) -> Result<UploadPart, TransferError> {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TransferError::session(Reset));
            }
            let part = UploadPart {
                part_id: format!("P{offset}"),
                offset,
                size: part_bytes.len() as u64,
                sha1: String::new(),
            };
            self.stored.lock().unwrap().push(part.clone());
            Ok(part)
        }

        fn commit(
            &self,
            _content_sha1: &Sha1Digest,
            parts: &[UploadPart],
        ) -> Result<FileObject, TransferError> {
            Ok(FileObject {
                id: "F1".into(),
                kind: "file".into(),
                name: "a.bin".into(),
                size: Some(parts.iter().map(|p| p.size).sum()),
                sha1: String::new(),
                etag: None,
                file_version: None,
                parent: None,
            })
        }

        fn abort(&self) -> Result<bool, TransferError> {
            *self.aborts.lock().unwrap() += 1;
            Ok(true)
        }
    }

    fn policy(max_attempts: u32) -> ResumePolicy {
        ResumePolicy {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn resumes_until_committed() {
        let session = FlakySession::new(2);
        let mut uploader = ChunkedUploader::new(&session, Cursor::new(vec![9u8; 2500]), 2500);

        let first = uploader.start();
        let file = drive(&mut uploader, first, policy(3)).unwrap();

        assert_eq!(file.size, Some(2500));
        assert_eq!(*session.aborts.lock().unwrap(), 0);
    }

    #[test]
    fn aborts_when_attempts_run_out() {
        let session = FlakySession::new(10);
        let mut uploader = ChunkedUploader::new(&session, Cursor::new(vec![9u8; 2500]), 2500);

        let first = uploader.start();
        assert!(drive(&mut uploader, first, policy(2)).is_err());
        assert_eq!(*session.aborts.lock().unwrap(), 1);
        assert!(uploader.is_aborted());
    }

    #[test]
    fn truncated_stream_is_not_resumed() {
        let session = FlakySession::new(0);
        let mut uploader = ChunkedUploader::new(&session, Cursor::new(vec![9u8; 1200]), 2500);

        let first = uploader.start();
        let err = drive(&mut uploader, first, policy(5)).unwrap_err();

        assert!(err.to_string().contains("ended before"));
        assert_eq!(*session.aborts.lock().unwrap(), 1);
    }

    #[test]
    fn progress_logger_accepts_every_status() {
        let log = progress_logger();
        for (status, done) in [
            (UploadStatus::InProgress, 1000),
            (UploadStatus::InProgress, 2500),
            (UploadStatus::Committing, 2500),
            (UploadStatus::Committed, 2500),
        ] {
            log(UploadProgress {
                session_id: "S1".into(),
                status,
                total_bytes: 2500,
                transferred_bytes: done,
                parts_done: done / 1000,
                total_parts: 3,
            });
        }
    }
}
