use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A negotiated resumable session. Lives for one transfer only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Server-assigned address every chunk is sent to.
    pub endpoint: String,
    pub total_size: u64,
    pub content_type: String,
}

/// The remote resource created by a completed upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Identifier used to address the resource (UUID when the server
    /// returns one, numeric id otherwise).
    pub id: String,
    pub numeric_id: Option<u64>,
    pub short_uuid: Option<String>,
    pub bytes_uploaded: u64,
    /// Raw body of the completing response.
    pub metadata: Value,
}

impl UploadResult {
    /// Builds a result from the body of a 200/201 chunk response.
    ///
    /// Accepts both `{"video": {...}}` and a bare object. Returns `None` if
    /// neither carries a `uuid` or `id`.
    pub fn from_body(body: &[u8], bytes_uploaded: u64) -> Option<Self> {
        let metadata: Value = serde_json::from_slice(body).ok()?;
        let video = metadata.get("video").unwrap_or(&metadata);

        let numeric_id = video.get("id").and_then(Value::as_u64);
        let uuid = video
            .get("uuid")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        let short_uuid = video
            .get("shortUUID")
            .and_then(Value::as_str)
            .map(str::to_string);

        let id = match (uuid, numeric_id) {
            (Some(uuid), _) => uuid.to_string(),
            (None, Some(n)) => n.to_string(),
            (None, None) => video.get("id").and_then(Value::as_str)?.to_string(),
        };

        Some(Self {
            id,
            numeric_id,
            short_uuid,
            bytes_uploaded,
            metadata,
        })
    }
}

/// Where to attach an uploaded resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachTarget {
    pub collection_id: String,
    /// 1-based position in the collection; appended when `None`.
    pub position: Option<u32>,
}

impl AttachTarget {
    pub fn new(collection_id: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            position: None,
        }
    }

    pub fn with_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }
}
