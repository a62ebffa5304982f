//! Request and response types for the PeerTube API.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Form body of `POST /api/v1/videos/upload-resumable`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<u64>,
    pub filename: String,
    pub name: String,
    /// Numeric privacy code (1 = public).
    pub privacy: u8,
}

/// Raw answer to a chunk `PUT`.
///
/// Any status is returned as-is; deciding what it means is up to the caller.
#[derive(Debug, Clone)]
pub struct ChunkResponse {
    pub status: u16,
    /// `Range` header acknowledging the bytes received so far (308 only).
    pub range: Option<String>,
    pub body: Bytes,
}

/// Body returned by `POST /api/v1/video-playlists/{id}/videos`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistElementCreated {
    pub video_playlist_element: PlaylistElement,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlaylistElement {
    pub id: u64,
}
