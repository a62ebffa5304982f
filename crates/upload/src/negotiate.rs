//! Session negotiation.

use tracing::{debug, info, warn};
use tubelift_transfer::TransferSpec;

use crate::error::UploadError;
use crate::transport::UploadTransport;
use crate::types::Session;

/// Opens a resumable session declaring the total size and content type.
///
/// Single attempt: any failure is an [`UploadError::Initialization`] and no
/// chunk is sent.
pub async fn open<T>(transport: &T, spec: &TransferSpec) -> Result<Session, UploadError>
where
    T: UploadTransport + ?Sized,
{
    debug!(
        name = %spec.name,
        file_name = %spec.file_name,
        total_size = spec.total_size,
        content_type = %spec.content_type,
        "opening upload session"
    );

    let endpoint = transport.open_session(spec).await.map_err(|e| {
        warn!(error = %e, "upload session could not be opened");
        UploadError::Initialization(e)
    })?;

    info!(endpoint = %endpoint, "upload session opened");

    Ok(Session {
        endpoint,
        total_size: spec.total_size,
        content_type: spec.content_type.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportError;
    use crate::transport::mock::MockTransport;

    #[tokio::test]
    async fn session_carries_spec_fields() {
        let mock = MockTransport::new();
        let spec = TransferSpec::new("Match", 1234).with_content_type("video/webm");

        let session = open(&mock, &spec).await.unwrap();
        assert!(session.endpoint.contains("upload_id=u1"));
        assert_eq!(session.total_size, 1234);
        assert_eq!(session.content_type, "video/webm");
        assert_eq!(mock.opened.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failure_is_initialization_error() {
        let mock = MockTransport::default();
        mock.push_session(Err(TransportError::Status {
            status: 401,
            body: "unauthorized".into(),
        }));
        let spec = TransferSpec::new("Match", 10);

        let err = open(&mock, &spec).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Initialization(TransportError::Status { status: 401, .. })
        ));
        // Single attempt, nothing sent.
        assert_eq!(mock.opened.lock().unwrap().len(), 1);
        assert!(mock.sent().is_empty());
    }
}
