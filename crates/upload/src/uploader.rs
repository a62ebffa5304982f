//! Upload orchestrator: plan, negotiate, transfer, attach.

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tubelift_transfer::{ChunkSource, ProgressSink, TransferSpec, UploadPhase, plan, validate_spec};

use crate::error::UploadError;
use crate::retry::RetryPolicy;
use crate::transport::UploadTransport;
use crate::types::{AttachTarget, UploadResult};
use crate::{attach, negotiate, transfer};

/// Runs uploads over a transport.
///
/// Every [`Uploader::upload`] call owns its session, transfer state and
/// cancellation token, so one uploader can serve several concurrent uploads.
/// Each per-upload token is a child of the uploader's token: cancelling the
/// uploader stops them all, cancelling one stops only that upload.
pub struct Uploader<T> {
    transport: T,
    cancel: CancellationToken,
}

impl<T: UploadTransport> Uploader<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an externally owned cancellation token.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the token that cancels every upload run by this uploader.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns a fresh token for a single upload, for use with
    /// [`Uploader::upload_with_cancel`].
    pub fn upload_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Uploads `source` as described by `spec`.
    ///
    /// `spec.total_size` must match the source length.
    pub async fn upload(
        &self,
        source: &mut dyn ChunkSource,
        spec: &TransferSpec,
        sink: &dyn ProgressSink,
    ) -> Result<UploadResult, UploadError> {
        self.upload_with_cancel(source, spec, sink, &self.upload_token())
            .await
    }

    /// Like [`Uploader::upload`], stopping when `cancel` fires.
    ///
    /// Pass a token from [`Uploader::upload_token`] to also stop when the
    /// uploader itself is cancelled.
    pub async fn upload_with_cancel(
        &self,
        source: &mut dyn ChunkSource,
        spec: &TransferSpec,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<UploadResult, UploadError> {
        validate_spec(spec)?;
        if source.len() != spec.total_size {
            return Err(UploadError::Config(format!(
                "declared size {} does not match source size {}",
                spec.total_size,
                source.len()
            )));
        }
        let chunks = plan(spec.total_size, spec.chunk_size)?;

        sink.on_phase(UploadPhase::Negotiating);
        sink.on_status(&format!("Opening upload session for \"{}\"", spec.name));
        let session = match negotiate::open(&self.transport, spec).await {
            Ok(session) => session,
            Err(e) => return Err(self.finish_failed(sink, e)),
        };

        sink.on_phase(UploadPhase::Transferring);
        let outcome = transfer::run(
            &self.transport,
            &session,
            &chunks,
            source,
            RetryPolicy::from_spec(spec),
            sink,
            cancel,
        )
        .await;

        match outcome {
            Ok(result) => {
                sink.on_phase(UploadPhase::Completed);
                info!(id = %result.id, name = %spec.name, "upload completed");
                Ok(result)
            }
            Err(e) => Err(self.finish_failed(sink, e)),
        }
    }

    /// Adds an already uploaded video to a playlist.
    ///
    /// Used on its own to retry after an [`UploadError::Attachment`].
    pub async fn attach(
        &self,
        result: &UploadResult,
        target: &AttachTarget,
    ) -> Result<(), UploadError> {
        attach::attach(&self.transport, result, target).await
    }

    /// Uploads `source` and then, if `target` is set, adds it to a playlist.
    pub async fn upload_and_attach(
        &self,
        source: &mut dyn ChunkSource,
        spec: &TransferSpec,
        target: Option<&AttachTarget>,
        sink: &dyn ProgressSink,
    ) -> Result<UploadResult, UploadError> {
        let result = self.upload(source, spec, sink).await?;

        let Some(target) = target else {
            return Ok(result);
        };

        sink.on_phase(UploadPhase::Attaching);
        sink.on_status(&format!("Adding {} to playlist {}", result.id, target.collection_id));
        self.attach(&result, target).await?;
        Ok(result)
    }

    fn finish_failed(&self, sink: &dyn ProgressSink, err: UploadError) -> UploadError {
        if matches!(err, UploadError::Cancelled { .. }) {
            sink.on_phase(UploadPhase::Cancelled);
            info!(error = %err, "upload cancelled");
        } else {
            sink.on_phase(UploadPhase::Failed);
            error!(error = %err, "upload failed");
        }
        sink.on_status(&err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use tubelift_transfer::{ChannelSink, FileSource, MemorySource, NoopSink, UploadEvent};

    use crate::transport::TransportError;
    use crate::transport::mock::MockTransport;

    #[derive(Default)]
    struct PhaseSink {
        phases: Mutex<Vec<UploadPhase>>,
    }

    impl ProgressSink for PhaseSink {
        fn on_chunk_result(&self, _progress: &tubelift_transfer::ChunkProgress) {}

        fn on_phase(&self, phase: UploadPhase) {
            self.phases.lock().unwrap().push(phase);
        }
    }

    fn spec(total: u64) -> TransferSpec {
        TransferSpec::new("Match", total).with_chunk_size(4)
    }

    #[tokio::test]
    async fn upload_runs_all_phases() {
        let mock = MockTransport::new();
        mock.push_status(308);
        mock.push_complete("abc123");
        let uploader = Uploader::new(mock);
        let sink = PhaseSink::default();

        let result = uploader
            .upload(&mut MemorySource::new(vec![1u8; 8]), &spec(8), &sink)
            .await
            .unwrap();

        assert_eq!(result.id, "abc123");
        assert_eq!(
            *sink.phases.lock().unwrap(),
            [
                UploadPhase::Negotiating,
                UploadPhase::Transferring,
                UploadPhase::Completed
            ]
        );
        let opened = uploader.transport().opened.lock().unwrap().clone();
        assert_eq!(opened[0].total_size, 8);
    }

    #[tokio::test]
    async fn invalid_spec_never_reaches_transport() {
        let uploader = Uploader::new(MockTransport::new());
        let bad = spec(8).with_max_attempts(0);

        let err = uploader
            .upload(&mut MemorySource::new(vec![1u8; 8]), &bad, &NoopSink)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Config(_)));
        assert!(uploader.transport().opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn size_mismatch_is_config_error() {
        let uploader = Uploader::new(MockTransport::new());

        let err = uploader
            .upload(&mut MemorySource::new(vec![1u8; 8]), &spec(9), &NoopSink)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Config(msg) if msg.contains("does not match")));
    }

    #[tokio::test]
    async fn negotiation_failure_sends_no_chunks() {
        let mock = MockTransport::default();
        mock.push_session(Err(TransportError::Status {
            status: 403,
            body: "quota exceeded".into(),
        }));
        let uploader = Uploader::new(mock);
        let sink = PhaseSink::default();

        let err = uploader
            .upload(&mut MemorySource::new(vec![1u8; 8]), &spec(8), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Initialization(_)));
        assert!(uploader.transport().sent().is_empty());
        assert_eq!(
            *sink.phases.lock().unwrap(),
            [UploadPhase::Negotiating, UploadPhase::Failed]
        );
    }

    #[tokio::test]
    async fn cancelled_upload_reports_cancelled_phase() {
        let cancel = CancellationToken::new();
        let uploader = Uploader::new(MockTransport::new()).with_cancel_token(cancel.clone());
        cancel.cancel();
        let sink = PhaseSink::default();

        let err = uploader
            .upload(&mut MemorySource::new(vec![1u8; 8]), &spec(8), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Cancelled { uploaded_bytes: 0 }));
        assert_eq!(sink.phases.lock().unwrap().last(), Some(&UploadPhase::Cancelled));
        assert!(uploader.cancel_token().is_cancelled());
    }

    #[tokio::test]
    async fn attachment_timeout_keeps_upload_result() {
        let mock = MockTransport::new();
        mock.push_complete("xyz");
        mock.push_attach(Err(TransportError::Network("operation timed out".into())));
        let uploader = Uploader::new(mock);
        let target = AttachTarget::new("12");

        let err = uploader
            .upload_and_attach(
                &mut MemorySource::new(vec![1u8; 4]),
                &spec(4),
                Some(&target),
                &NoopSink,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Attachment { .. }));
        let result = err.upload_result().unwrap().clone();
        assert_eq!(result.id, "xyz");

        // Retry attachment alone, without re-uploading.
        uploader.attach(&result, &target).await.unwrap();
        assert_eq!(uploader.transport().sent().len(), 1);
        assert_eq!(uploader.transport().attached.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn upload_without_target_skips_attachment() {
        let mock = MockTransport::new();
        mock.push_complete("abc");
        let uploader = Uploader::new(mock);

        let result = uploader
            .upload_and_attach(&mut MemorySource::new(vec![1u8; 4]), &spec(4), None, &NoopSink)
            .await
            .unwrap();

        assert_eq!(result.id, "abc");
        assert!(uploader.transport().attached.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_source_with_channel_sink() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"0123456789").unwrap();

        let mock = MockTransport::new();
        mock.push_status(308);
        mock.push_status(308);
        mock.push_complete("clip");
        let uploader = Uploader::new(mock);
        let (sink, mut rx) = ChannelSink::new();

        let mut source = FileSource::open(&path).await.unwrap();
        let spec = spec(10).with_file_name("clip.mp4");
        let result = uploader
            .upload_and_attach(&mut source, &spec, Some(&AttachTarget::new("3")), &sink)
            .await
            .unwrap();
        drop(sink);

        assert_eq!(result.bytes_uploaded, 10);
        let ranges: Vec<_> = uploader
            .transport()
            .sent()
            .into_iter()
            .map(|s| s.content_range)
            .collect();
        assert_eq!(ranges, ["bytes 0-3/10", "bytes 4-7/10", "bytes 8-9/10"]);

        let mut chunk_events = 0;
        let mut phases = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                UploadEvent::Chunk(_) => chunk_events += 1,
                UploadEvent::Phase(phase) => phases.push(phase),
                UploadEvent::Status(_) => {}
            }
        }
        assert_eq!(chunk_events, 3);
        assert_eq!(phases.last(), Some(&UploadPhase::Attaching));
    }

    #[tokio::test]
    async fn concurrent_uploads_share_nothing() {
        let mock = MockTransport::default();
        mock.push_session(Ok("https://peertube.example/a".into()));
        mock.push_session(Ok("https://peertube.example/b".into()));
        mock.push_complete("first");
        mock.push_complete("second");
        let uploader = Arc::new(Uploader::new(mock));

        let a = {
            let uploader = Arc::clone(&uploader);
            tokio::spawn(async move {
                uploader
                    .upload(&mut MemorySource::new(vec![0u8; 4]), &spec(4), &NoopSink)
                    .await
            })
        };
        let b = {
            let uploader = Arc::clone(&uploader);
            tokio::spawn(async move {
                uploader
                    .upload(&mut MemorySource::new(vec![0u8; 4]), &spec(4), &NoopSink)
                    .await
            })
        };

        let mut ids = vec![a.await.unwrap().unwrap().id, b.await.unwrap().unwrap().id];
        ids.sort();
        assert_eq!(ids, ["first", "second"]);
    }

    #[tokio::test]
    async fn cancelling_one_upload_leaves_others_running() {
        let mock = MockTransport::default();
        mock.push_session(Ok("https://peertube.example/a".into()));
        mock.push_session(Ok("https://peertube.example/b".into()));
        mock.push_complete("survivor");
        let uploader = Uploader::new(mock);

        let doomed = uploader.upload_token();
        doomed.cancel();
        let err = uploader
            .upload_with_cancel(
                &mut MemorySource::new(vec![0u8; 4]),
                &spec(4),
                &NoopSink,
                &doomed,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Cancelled { uploaded_bytes: 0 }));

        let result = uploader
            .upload(&mut MemorySource::new(vec![0u8; 4]), &spec(4), &NoopSink)
            .await
            .unwrap();
        assert_eq!(result.id, "survivor");
        assert!(!uploader.cancel_token().is_cancelled());
        assert_eq!(uploader.transport().sent().len(), 1);
    }

    #[tokio::test]
    async fn uploader_token_cancels_per_upload_tokens() {
        let uploader = Uploader::new(MockTransport::new());
        let token = uploader.upload_token();

        uploader.cancel_token().cancel();

        assert!(token.is_cancelled());
        let err = uploader
            .upload(&mut MemorySource::new(vec![0u8; 4]), &spec(4), &NoopSink)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Cancelled { .. }));
    }
}
