use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::types::UploadPhase;

/// What happened to one chunk attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// The server accepted the chunk and expects more (308).
    Continue,
    /// The server created the resource (200/201).
    Complete,
    /// The attempt failed and the same chunk will be sent again after `delay`.
    Retrying {
        attempt: u32,
        delay: Duration,
        reason: String,
    },
    /// The chunk exhausted its attempts; the transfer is over.
    Aborted { attempts: u32, reason: String },
}

impl ChunkOutcome {
    /// Returns `true` if the chunk was accepted by the server.
    pub fn is_accepted(&self) -> bool {
        matches!(self, ChunkOutcome::Continue | ChunkOutcome::Complete)
    }
}

/// Progress notification emitted after every chunk attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkProgress {
    /// Bytes confirmed by the server so far.
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    pub chunk_index: usize,
    /// Time since the first chunk was sent.
    pub elapsed: Duration,
    pub outcome: ChunkOutcome,
}

impl ChunkProgress {
    /// Confirmed fraction of the upload in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return if matches!(self.outcome, ChunkOutcome::Complete) {
                1.0
            } else {
                0.0
            };
        }
        self.uploaded_bytes as f64 / self.total_bytes as f64
    }
}

/// Caller-owned receiver of progress updates and status lines.
///
/// Called from the transfer's own task, once per chunk attempt, never
/// batched. Implementations must not block for long.
pub trait ProgressSink: Send + Sync {
    fn on_chunk_result(&self, progress: &ChunkProgress);

    /// Human-readable status line.
    fn on_status(&self, _line: &str) {}

    /// Lifecycle transition.
    fn on_phase(&self, _phase: UploadPhase) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&ChunkProgress) + Send + Sync,
{
    fn on_chunk_result(&self, progress: &ChunkProgress) {
        self(progress)
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn on_chunk_result(&self, _progress: &ChunkProgress) {}
}

/// Event forwarded by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Chunk(ChunkProgress),
    Status(String),
    Phase(UploadPhase),
}

/// Forwards notifications to another task (e.g. a UI event loop).
///
/// The channel is unbounded so no update is ever dropped or coalesced.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<UploadEvent>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its events arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UploadEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: UploadEvent) {
        // A dropped receiver means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl ProgressSink for ChannelSink {
    fn on_chunk_result(&self, progress: &ChunkProgress) {
        self.forward(UploadEvent::Chunk(progress.clone()));
    }

    fn on_status(&self, line: &str) {
        self.forward(UploadEvent::Status(line.to_string()));
    }

    fn on_phase(&self, phase: UploadPhase) {
        self.forward(UploadEvent::Phase(phase));
    }
}

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    timestamp: Instant,
}

/// Calculates transfer speed using a sliding window of samples.
pub struct SpeedCalculator {
    inner: Mutex<SpeedInner>,
}

struct SpeedInner {
    samples: Vec<SpeedSample>,
    max_samples: usize,
    window_size: Duration,
}

impl SpeedCalculator {
    /// Creates a new calculator.
    ///
    /// Chunks are large, so the window is measured in minutes rather than
    /// seconds (default 5 min, at most 100 samples).
    pub fn new(window_size: Option<Duration>, max_samples: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(SpeedInner {
                samples: Vec::new(),
                max_samples: max_samples.unwrap_or(100),
                window_size: window_size.unwrap_or(Duration::from_secs(300)),
            }),
        }
    }

    /// Records that `bytes` were confirmed at the current instant.
    pub fn add_sample(&self, bytes: u64) {
        self.add_sample_at(bytes, Instant::now());
    }

    fn add_sample_at(&self, bytes: u64, now: Instant) {
        let Ok(mut s) = self.inner.lock() else {
            return;
        };
        s.samples.push(SpeedSample {
            bytes,
            timestamp: now,
        });

        if let Some(cutoff) = now.checked_sub(s.window_size) {
            s.samples.retain(|sample| sample.timestamp >= cutoff);
        }

        if s.samples.len() > s.max_samples {
            let excess = s.samples.len() - s.max_samples;
            s.samples.drain(..excess);
        }
    }

    /// Average speed in bytes/second within the window.
    ///
    /// The first sample only marks the start of the window, so its bytes are
    /// not counted. Returns 0.0 with fewer than 2 samples.
    pub fn bytes_per_second(&self) -> f64 {
        let Ok(s) = self.inner.lock() else {
            return 0.0;
        };
        if s.samples.len() < 2 {
            return 0.0;
        }

        let first = &s.samples[0];
        let last = &s.samples[s.samples.len() - 1];
        let elapsed = last.timestamp.duration_since(first.timestamp);
        if elapsed.is_zero() {
            return 0.0;
        }

        let bytes: u64 = s.samples[1..].iter().map(|sample| sample.bytes).sum();
        bytes as f64 / elapsed.as_secs_f64()
    }

    /// Estimates the time needed for `remaining_bytes`.
    ///
    /// Returns `None` while the speed is unknown.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&self) {
        if let Ok(mut s) = self.inner.lock() {
            s.samples.clear();
        }
    }
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(None, None)
    }
}
