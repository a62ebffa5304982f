//! [`UploadTransport`] over the PeerTube REST client.

use bytes::Bytes;
use tracing::debug;
use tubelift_peertube::{Client, Error, InitUploadForm, Url};
use tubelift_transfer::TransferSpec;

use crate::transport::{ChunkReply, TransportError, TransportFuture, UploadTransport};

/// Status returned when the video is already in the playlist.
const CONFLICT: u16 = 409;

/// Bridges the engine to a PeerTube instance.
#[derive(Debug, Clone)]
pub struct PeerTubeTransport {
    client: Client,
}

impl PeerTubeTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl From<Error> for TransportError {
    fn from(err: Error) -> Self {
        match err {
            Error::Api { status, body } => TransportError::Status { status, body },
            Error::Http(e) => TransportError::Network(e.to_string()),
            Error::Timeout(_) => TransportError::Network(err.to_string()),
            other => TransportError::Protocol(other.to_string()),
        }
    }
}

impl UploadTransport for PeerTubeTransport {
    fn open_session<'a>(&'a self, spec: &'a TransferSpec) -> TransportFuture<'a, String> {
        Box::pin(async move {
            let form = InitUploadForm {
                channel_id: spec.channel_id,
                filename: spec.file_name.clone(),
                name: spec.name.clone(),
                privacy: spec.privacy.code(),
            };
            let url = self
                .client
                .init_resumable_upload(&form, spec.total_size, &spec.content_type)
                .await?;
            Ok(url.to_string())
        })
    }

    fn send_chunk<'a>(
        &'a self,
        endpoint: &'a str,
        content_range: &'a str,
        data: Bytes,
    ) -> TransportFuture<'a, ChunkReply> {
        Box::pin(async move {
            let url = Url::parse(endpoint)
                .map_err(|e| TransportError::Protocol(format!("bad session endpoint: {e}")))?;
            let resp = self.client.upload_chunk(&url, content_range, data).await?;
            Ok(ChunkReply {
                status: resp.status,
                range: resp.range,
                body: resp.body,
            })
        })
    }

    fn attach<'a>(
        &'a self,
        collection_id: &'a str,
        resource_id: &'a str,
        position: Option<u32>,
    ) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            match self
                .client
                .add_video_to_playlist(collection_id, resource_id, position)
                .await
            {
                Ok(element) => {
                    debug!(playlist = %collection_id, element = ?element, "playlist element created");
                    Ok(())
                }
                Err(Error::Api { status, .. }) if status == CONFLICT => {
                    debug!(playlist = %collection_id, video = %resource_id, "video already in playlist");
                    Ok(())
                }
                Err(e) => Err(e.into()),
            }
        })
    }
}
