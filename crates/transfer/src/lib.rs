//! Chunk planning, chunk sources and progress reporting for resumable uploads.
//!
//! Nothing in this crate talks to the network: it decides which byte ranges
//! go out, reads them from the source, and describes what happened to each
//! one so a caller-owned [`ProgressSink`] can render it.

mod chunked;
mod progress;
mod types;
mod validation;

pub use chunked::{ChunkSource, FileSource, MemorySource, plan};
pub use progress::{
    ChannelSink, ChunkOutcome, ChunkProgress, NoopSink, ProgressSink, SpeedCalculator, UploadEvent,
};
pub use types::{Chunk, Privacy, TransferSpec, UploadPhase};
pub use validation::{validate_file_name, validate_spec};

/// Default chunk size: 50 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 50 * 1024 * 1024;

/// Default number of requests issued for a single chunk before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default backoff base in seconds. The wait before retry `k + 1` is `base^k`.
pub const DEFAULT_BACKOFF_BASE: f64 = 2.0;

/// Default declared content type of the uploaded media.
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// File name declared to the server when the source does not carry one.
pub const DEFAULT_FILE_NAME: &str = "uploaded_file.mp4";

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),
}
