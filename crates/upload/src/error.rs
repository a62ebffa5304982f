//! Upload error types.

use tubelift_transfer::TransferError;

use crate::transport::TransportError;
use crate::types::UploadResult;

/// Errors produced by an upload or attachment.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("source read error: {0}")]
    SourceRead(#[from] std::io::Error),

    /// The session could not be opened. Nothing was transferred.
    #[error("session initialization failed: {0}")]
    Initialization(TransportError),

    /// A chunk failed on every allowed attempt.
    #[error("chunk {index} failed after {attempts} attempts ({uploaded_bytes} bytes confirmed): {reason}")]
    ChunkTransfer {
        index: usize,
        attempts: u32,
        uploaded_bytes: u64,
        reason: String,
    },

    /// Every chunk was acknowledged but the server never completed the upload.
    #[error("server acknowledged {uploaded_bytes} bytes but never completed the upload")]
    Incomplete { uploaded_bytes: u64 },

    #[error("invalid completion response ({status}): {reason}")]
    InvalidResponse { status: u16, reason: String },

    #[error("cancelled after {uploaded_bytes} bytes")]
    Cancelled { uploaded_bytes: u64 },

    /// The upload succeeded; only linking it into the collection failed.
    #[error("video {} uploaded but adding it to playlist {collection_id} failed: {reason}", .result.id)]
    Attachment {
        result: Box<UploadResult>,
        collection_id: String,
        reason: TransportError,
    },
}

impl UploadError {
    /// The created resource, if the error happened after the upload completed.
    pub fn upload_result(&self) -> Option<&UploadResult> {
        match self {
            UploadError::Attachment { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Bytes the server had confirmed when the transfer stopped.
    pub fn uploaded_bytes(&self) -> Option<u64> {
        match self {
            UploadError::ChunkTransfer { uploaded_bytes, .. }
            | UploadError::Incomplete { uploaded_bytes }
            | UploadError::Cancelled { uploaded_bytes } => Some(*uploaded_bytes),
            UploadError::Attachment { result, .. } => Some(result.bytes_uploaded),
            _ => None,
        }
    }
}

impl From<TransferError> for UploadError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Io(e) => UploadError::SourceRead(e),
            TransferError::InvalidConfig(msg) | TransferError::InvalidFileName(msg) => {
                UploadError::Config(msg)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn attachment_error_keeps_result() {
        let err = UploadError::Attachment {
            result: Box::new(UploadResult {
                id: "xyz".into(),
                numeric_id: None,
                short_uuid: None,
                bytes_uploaded: 300,
                metadata: json!({"video": {"uuid": "xyz"}}),
            }),
            collection_id: "9".into(),
            reason: TransportError::Network("timed out".into()),
        };
        assert_eq!(err.upload_result().map(|r| r.id.as_str()), Some("xyz"));
        assert_eq!(err.uploaded_bytes(), Some(300));
        assert!(err.to_string().contains("xyz"));
        assert!(err.to_string().contains("playlist 9"));
    }

    #[test]
    fn transfer_errors_map() {
        let err: UploadError = TransferError::InvalidConfig("chunk size".into()).into();
        assert!(matches!(err, UploadError::Config(_)));

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: UploadError = TransferError::Io(io).into();
        assert!(matches!(err, UploadError::SourceRead(_)));
        assert!(err.upload_result().is_none());
        assert!(err.uploaded_bytes().is_none());
    }
}
