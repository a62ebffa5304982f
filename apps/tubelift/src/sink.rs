//! Progress sink that renders upload progress as log lines.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{info, warn};
use tubelift_transfer::{ChunkOutcome, ChunkProgress, ProgressSink, SpeedCalculator, UploadPhase};

const MIB: f64 = 1024.0 * 1024.0;

/// Logs every chunk result with throughput and ETA.
#[derive(Default)]
pub struct LogSink {
    speed: SpeedCalculator,
    last_uploaded: AtomicU64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes confirmed since the previous accepted chunk.
    fn confirmed_delta(&self, uploaded: u64) -> u64 {
        let previous = self.last_uploaded.swap(uploaded, Ordering::Relaxed);
        uploaded.saturating_sub(previous)
    }
}

impl ProgressSink for LogSink {
    fn on_chunk_result(&self, progress: &ChunkProgress) {
        match &progress.outcome {
            ChunkOutcome::Continue | ChunkOutcome::Complete => {
                self.speed
                    .add_sample(self.confirmed_delta(progress.uploaded_bytes));
                let remaining = progress.total_bytes.saturating_sub(progress.uploaded_bytes);
                let eta_secs = self.speed.eta(remaining).map(|d| d.as_secs());
                info!(
                    chunk = progress.chunk_index,
                    uploaded = progress.uploaded_bytes,
                    total = progress.total_bytes,
                    percent = format_args!("{:.1}", progress.fraction() * 100.0),
                    speed_mib_s = format_args!("{:.2}", self.speed.bytes_per_second() / MIB),
                    eta_secs = ?eta_secs,
                    elapsed_secs = progress.elapsed.as_secs(),
                    "upload progress"
                );
            }
            ChunkOutcome::Retrying {
                attempt,
                delay,
                reason,
            } => {
                warn!(
                    chunk = progress.chunk_index,
                    attempt,
                    retry_in_secs = delay.as_secs_f64(),
                    reason = %reason,
                    "chunk failed, retrying"
                );
            }
            ChunkOutcome::Aborted { attempts, reason } => {
                warn!(
                    chunk = progress.chunk_index,
                    attempts,
                    uploaded = progress.uploaded_bytes,
                    reason = %reason,
                    "upload aborted"
                );
            }
        }
    }

    fn on_status(&self, line: &str) {
        info!("{line}");
    }

    fn on_phase(&self, phase: UploadPhase) {
        if phase == UploadPhase::Transferring {
            // Opens the speed window at the first byte sent.
            self.speed.reset();
            self.last_uploaded.store(0, Ordering::Relaxed);
            self.speed.add_sample(0);
        }
        info!(phase = ?phase, "upload phase");
    }
}
