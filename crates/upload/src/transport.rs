//! Transport trait between the engine and the remote service.
//!
//! The CLI (or any other host) plugs in [`crate::PeerTubeTransport`]; tests
//! plug in scripted mocks. Keeping HTTP behind this trait is what lets the
//! retry and ordering rules be tested without a network.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tubelift_transfer::TransferSpec;

/// Boxed future returned by [`UploadTransport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Failure of a single request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// The server answered with a status the caller treats as failure.
    #[error("server answered {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response (connect, timeout, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The response was received but could not be used.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Raw answer to one chunk request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkReply {
    pub status: u16,
    /// Server acknowledgement of received bytes, if any.
    pub range: Option<String>,
    pub body: Bytes,
}

impl ChunkReply {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            range: None,
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_range(mut self, range: impl Into<String>) -> Self {
        self.range = Some(range.into());
        self
    }
}

/// Abstract connection to the video host.
pub trait UploadTransport: Send + Sync {
    /// Opens a resumable session for `spec` and returns its endpoint.
    fn open_session<'a>(&'a self, spec: &'a TransferSpec) -> TransportFuture<'a, String>;

    /// Sends one chunk body to `endpoint` with the given `Content-Range`.
    ///
    /// Every HTTP status is returned as a [`ChunkReply`]; only failures to
    /// obtain a response are errors.
    fn send_chunk<'a>(
        &'a self,
        endpoint: &'a str,
        content_range: &'a str,
        data: Bytes,
    ) -> TransportFuture<'a, ChunkReply>;

    /// Links `resource_id` into `collection_id`, optionally at `position`.
    ///
    /// Repeating an identical call must not fail.
    fn attach<'a>(
        &'a self,
        collection_id: &'a str,
        resource_id: &'a str,
        position: Option<u32>,
    ) -> TransportFuture<'a, ()>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A chunk request as seen by [`MockTransport`].
    #[derive(Debug, Clone)]
    pub(crate) struct SentChunk {
        pub content_range: String,
        pub len: usize,
        pub at: tokio::time::Instant,
    }

    /// Scripted transport. Chunk requests with no scripted reply fail with
    /// a network error.
    #[derive(Default)]
    pub(crate) struct MockTransport {
        sessions: Mutex<VecDeque<Result<String, TransportError>>>,
        chunks: Mutex<VecDeque<Result<ChunkReply, TransportError>>>,
        attaches: Mutex<VecDeque<Result<(), TransportError>>>,
        pub opened: Mutex<Vec<TransferSpec>>,
        pub sent: Mutex<Vec<SentChunk>>,
        pub attached: Mutex<Vec<(String, String, Option<u32>)>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            let mock = Self::default();
            mock.push_session(Ok("https://peertube.example/api/v1/videos/upload-resumable?upload_id=u1".into()));
            mock
        }

        pub fn push_session(&self, result: Result<String, TransportError>) {
            self.sessions.lock().unwrap().push_back(result);
        }

        pub fn push_chunk(&self, result: Result<ChunkReply, TransportError>) {
            self.chunks.lock().unwrap().push_back(result);
        }

        pub fn push_status(&self, status: u16) {
            self.push_chunk(Ok(ChunkReply::new(status)));
        }

        pub fn push_complete(&self, uuid: &str) {
            let body = format!(r#"{{"video":{{"id":42,"uuid":"{uuid}","shortUUID":"s-{uuid}"}}}}"#);
            self.push_chunk(Ok(ChunkReply::new(201).with_body(body)));
        }

        pub fn push_attach(&self, result: Result<(), TransportError>) {
            self.attaches.lock().unwrap().push_back(result);
        }

        pub fn sent(&self) -> Vec<SentChunk> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl UploadTransport for MockTransport {
        fn open_session<'a>(&'a self, spec: &'a TransferSpec) -> TransportFuture<'a, String> {
            self.opened.lock().unwrap().push(spec.clone());
            let result = self
                .sessions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("no session scripted".into())));
            Box::pin(async move { result })
        }

        fn send_chunk<'a>(
            &'a self,
            _endpoint: &'a str,
            content_range: &'a str,
            data: Bytes,
        ) -> TransportFuture<'a, ChunkReply> {
            self.sent.lock().unwrap().push(SentChunk {
                content_range: content_range.to_string(),
                len: data.len(),
                at: tokio::time::Instant::now(),
            });
            let result = self
                .chunks
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Network("connection reset".into())));
            Box::pin(async move { result })
        }

        fn attach<'a>(
            &'a self,
            collection_id: &'a str,
            resource_id: &'a str,
            position: Option<u32>,
        ) -> TransportFuture<'a, ()> {
            self.attached.lock().unwrap().push((
                collection_id.to_string(),
                resource_id.to_string(),
                position,
            ));
            let result = self.attaches.lock().unwrap().pop_front().unwrap_or(Ok(()));
            Box::pin(async move { result })
        }
    }
}
