use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use boxkit_protocol::{UploadProgress, UploadStatus};

/// Default window for throughput averaging.
const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Default cap on retained throughput samples.
const DEFAULT_MAX_SAMPLES: usize = 100;

/// Callback invoked with upload progress.
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send + Sync>;

/// Collects progress from any number of uploaders and fans it out to callbacks.
///
/// Hand each uploader a [`reporter`](Self::reporter); the tracker keeps the
/// latest snapshot per session so callers can poll as well as subscribe.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    inner: Arc<RwLock<TrackerInner>>,
}

#[derive(Default)]
struct TrackerInner {
    callbacks: Vec<ProgressCallback>,
    latest: HashMap<String, UploadProgress>,
}

impl ProgressTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a progress callback.
    pub fn on_progress(&self, callback: ProgressCallback) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.callbacks.push(callback);
    }

    /// Stores a snapshot and notifies every callback.
    pub fn record(&self, progress: UploadProgress) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner
            .latest
            .insert(progress.session_id.clone(), progress.clone());
        for cb in &inner.callbacks {
            cb(progress.clone());
        }
    }

    /// Returns a callback suitable for [`ChunkedUploader::with_progress`](crate::ChunkedUploader::with_progress).
    pub fn reporter(&self) -> ProgressCallback {
        let tracker = self.clone();
        Box::new(move |progress| tracker.record(progress))
    }

    /// Latest snapshot for a session.
    pub fn get_progress(&self, session_id: &str) -> Option<UploadProgress> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.latest.get(session_id).cloned()
    }

    /// Sessions still transferring or committing.
    pub fn active_sessions(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .latest
            .values()
            .filter(|p| matches!(p.status, UploadStatus::InProgress | UploadStatus::Committing))
            .map(|p| p.session_id.clone())
            .collect()
    }

    /// Drops the stored snapshot for a session.
    pub fn untrack(&self, session_id: &str) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.latest.remove(session_id);
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    at: Instant,
}

/// Sliding-window transfer speed estimate.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: VecDeque<SpeedSample>,
    max_samples: usize,
    window: Duration,
}

impl SpeedCalculator {
    /// Creates a calculator.
    ///
    /// - `window`: time span averaged over (default 5 s).
    /// - `max_samples`: retained sample cap (default 100).
    pub fn new(window: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: VecDeque::new(),
                max_samples: max_samples.unwrap_or(DEFAULT_MAX_SAMPLES),
                window: window.unwrap_or(DEFAULT_WINDOW),
            }),
        }
    }

    /// Records `bytes` transferred now.
    pub fn add_sample(&self, bytes: u64) {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        s.samples.push_back(SpeedSample { bytes, at: now });

        let window = s.window;
        while s
            .samples
            .front()
            .is_some_and(|sample| now.duration_since(sample.at) > window)
        {
            s.samples.pop_front();
        }
        while s.samples.len() > s.max_samples {
            s.samples.pop_front();
        }
    }

    /// Average bytes per second across the window; 0.0 with fewer than two samples.
    pub fn bytes_per_second(&self) -> f64 {
        let s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let (Some(first), Some(last)) = (s.samples.front(), s.samples.back()) else {
            return 0.0;
        };
        if s.samples.len() < 2 {
            return 0.0;
        }

        let elapsed = last.at.duration_since(first.at);
        if elapsed.is_zero() {
            return 0.0;
        }

        let total: u64 = s.samples.iter().map(|sample| sample.bytes).sum();
        total as f64 / elapsed.as_secs_f64()
    }

    /// Time needed for `remaining_bytes` at the current speed.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all samples.
    pub fn reset(&self) {
        let mut s = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        s.samples.clear();
    }
}
