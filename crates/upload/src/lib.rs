//! Resumable chunked upload engine.
//!
//! This crate implements the **protocol logic** for moving one large byte
//! source to a video host. It has no knowledge of HTTP details: the
//! [`UploadTransport`] trait is the seam, and [`PeerTubeTransport`] bridges
//! it to the PeerTube REST client.
//!
//! # Pipeline
//!
//! 1. **Plan**: split the source into contiguous byte ranges
//! 2. **Negotiate**: open a resumable session declaring size and type
//! 3. **Transfer**: send each range in order, retrying in place with
//!    exponential backoff
//! 4. **Attach**: optionally link the created video into a playlist

pub mod attach;
pub mod error;
pub mod negotiate;
pub mod peertube;
pub mod retry;
pub mod transfer;
pub mod transport;
pub mod types;
pub mod uploader;

pub use error::UploadError;
pub use peertube::PeerTubeTransport;
pub use retry::RetryPolicy;
pub use transport::{ChunkReply, TransportError, UploadTransport};
pub use types::{AttachTarget, Session, UploadResult};
pub use uploader::Uploader;
