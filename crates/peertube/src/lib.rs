//! PeerTube REST client for resumable video uploads.
//!
//! Covers only the calls the upload engine needs: opening a resumable
//! session, sending one byte range to it, and adding the finished video to
//! a playlist.

pub mod client;
pub mod types;

pub use client::{Client, DEFAULT_TIMEOUT, Error};
pub use reqwest::Url;
pub use types::{ChunkResponse, InitUploadForm, PlaylistElement, PlaylistElementCreated};
