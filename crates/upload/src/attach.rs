//! Post-upload attachment of a created video to a playlist.

use tracing::{info, warn};

use crate::error::UploadError;
use crate::transport::UploadTransport;
use crate::types::{AttachTarget, UploadResult};

/// Links `result` into `target` with a single call.
///
/// On failure the returned [`UploadError::Attachment`] carries a copy of
/// `result`, so the caller can retry this step alone.
pub async fn attach<T>(
    transport: &T,
    result: &UploadResult,
    target: &AttachTarget,
) -> Result<(), UploadError>
where
    T: UploadTransport + ?Sized,
{
    match transport
        .attach(&target.collection_id, &result.id, target.position)
        .await
    {
        Ok(()) => {
            info!(
                video = %result.id,
                playlist = %target.collection_id,
                position = ?target.position,
                "video added to playlist"
            );
            Ok(())
        }
        Err(reason) => {
            warn!(
                video = %result.id,
                playlist = %target.collection_id,
                error = %reason,
                "failed to add video to playlist"
            );
            Err(UploadError::Attachment {
                result: Box::new(result.clone()),
                collection_id: target.collection_id.clone(),
                reason,
            })
        }
    }
}
