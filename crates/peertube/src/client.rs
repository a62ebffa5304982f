//! PeerTube API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, HeaderValue, LOCATION,
    RANGE,
};
use reqwest::{StatusCode, Url};
use tokio::time::Instant;
use tracing::debug;

use crate::types::{ChunkResponse, InitUploadForm, PlaylistElementCreated};

/// Idle timeout used unless the caller picks another one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Slice size handed to the connection while streaming a chunk body.
const BODY_SLICE: usize = 64 * 1024;

const UPLOAD_CONTENT_LENGTH: &str = "x-upload-content-length";
const UPLOAD_CONTENT_TYPE: &str = "x-upload-content-type";

/// Errors from the PeerTube client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid API token")]
    InvalidToken,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("upload session response carried no Location header")]
    MissingLocation,

    #[error("no progress for {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// HTTP status returned by the server, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// PeerTube API client.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl Client {
    /// Creates a client for the instance at `base_url` using [`DEFAULT_TIMEOUT`].
    pub fn new(base_url: &str, token: &str) -> Result<Self, Error> {
        Self::with_timeout(base_url, token, DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom timeout.
    ///
    /// The timeout bounds connecting and any stretch without progress. It is
    /// not a deadline for the whole request: a chunk body that keeps moving
    /// may take as long as it needs.
    pub fn with_timeout(base_url: &str, token: &str, timeout: Duration) -> Result<Self, Error> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| Error::InvalidToken)?,
        );

        // 308 is the resumable protocol's "keep going", not a redirect.
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    /// Base URL of the instance.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// Opens a resumable upload session and returns its endpoint.
    ///
    /// The total size and content type are declared up front so the server
    /// can reject the upload before any bytes are sent.
    pub async fn init_resumable_upload(
        &self,
        form: &InitUploadForm,
        total_size: u64,
        content_type: &str,
    ) -> Result<Url, Error> {
        let url = self.endpoint("/api/v1/videos/upload-resumable");
        let resp = self
            .http
            .post(&url)
            .header(UPLOAD_CONTENT_LENGTH, total_size)
            .header(UPLOAD_CONTENT_TYPE, content_type)
            .form(form)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(Error::MissingLocation)?;

        // The server answers with a relative or scheme-relative location.
        let session = self
            .base_url
            .join(location)
            .map_err(|e| Error::InvalidUrl(format!("{location}: {e}")))?;
        debug!(session = %session, total_size, "resumable upload session opened");
        Ok(session)
    }

    /// Sends one byte range to a session endpoint.
    ///
    /// Only transport failures are errors; every HTTP status, including
    /// 308, is handed back in the [`ChunkResponse`].
    pub async fn upload_chunk(
        &self,
        session: &Url,
        content_range: &str,
        data: Bytes,
    ) -> Result<ChunkResponse, Error> {
        let progress = Progress::new();
        let len = data.len();
        let body = {
            let progress = progress.clone();
            let slices: Vec<Bytes> = (0..len)
                .step_by(BODY_SLICE)
                .map(|start| data.slice(start..len.min(start + BODY_SLICE)))
                .collect();
            futures_util::stream::iter(slices).map(move |slice| {
                progress.touch();
                Ok::<_, std::io::Error>(slice)
            })
        };

        let request = self
            .http
            .put(session.clone())
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_RANGE, content_range)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(body))
            .send();

        let resp = tokio::select! {
            resp = request => resp?,
            () = progress.stalled(self.timeout) => return Err(Error::Timeout(self.timeout)),
        };

        let status = resp.status().as_u16();
        let range = resp
            .headers()
            .get(RANGE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = tokio::time::timeout(self.timeout, resp.bytes())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        Ok(ChunkResponse {
            status,
            range,
            body,
        })
    }

    /// Adds a video to a playlist, optionally at a 1-based `position`.
    ///
    /// Returns the id of the created playlist element when the server
    /// reports one.
    pub async fn add_video_to_playlist(
        &self,
        playlist_id: &str,
        video_id: &str,
        position: Option<u32>,
    ) -> Result<Option<u64>, Error> {
        let encoded = utf8_percent_encode(playlist_id, NON_ALPHANUMERIC).to_string();
        let url = self.endpoint(&format!("/api/v1/video-playlists/{encoded}/videos"));

        let mut form = vec![("videoId", video_id.to_string())];
        if let Some(position) = position {
            form.push(("position", position.to_string()));
        }

        let resp = self
            .http
            .post(&url)
            .form(&form)
            .timeout(self.timeout)
            .send()
            .await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = resp.bytes().await?;
        let element = serde_json::from_slice::<PlaylistElementCreated>(&body)
            .ok()
            .map(|created| created.video_playlist_element.id);
        Ok(element)
    }
}

/// Time of the last slice the connection took from a chunk body.
#[derive(Debug, Clone)]
struct Progress(Arc<Mutex<Instant>>);

impl Progress {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }

    fn touch(&self) {
        if let Ok(mut last) = self.0.lock() {
            *last = Instant::now();
        }
    }

    fn last(&self) -> Instant {
        self.0.lock().map(|last| *last).unwrap_or_else(|_| Instant::now())
    }

    /// Resolves once nothing has moved for `idle`.
    async fn stalled(&self, idle: Duration) {
        loop {
            let deadline = self.last() + idle;
            if Instant::now() >= deadline {
                return;
            }
            tokio::time::sleep_until(deadline).await;
        }
    }
}
