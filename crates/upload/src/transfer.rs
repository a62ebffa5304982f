//! The transfer loop: sends planned chunks in order to a negotiated session.

use bytes::Bytes;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tubelift_transfer::{Chunk, ChunkOutcome, ChunkProgress, ChunkSource, ProgressSink};

use crate::error::UploadError;
use crate::retry::RetryPolicy;
use crate::transport::UploadTransport;
use crate::types::{Session, UploadResult};

/// Mutable bookkeeping of one run. Never outlives [`run`].
struct TransferState {
    uploaded_bytes: u64,
    started: Instant,
}

impl TransferState {
    fn progress(&self, total: u64, chunk: &Chunk, outcome: ChunkOutcome) -> ChunkProgress {
        ChunkProgress {
            uploaded_bytes: self.uploaded_bytes,
            total_bytes: total,
            chunk_index: chunk.index,
            elapsed: self.started.elapsed(),
            outcome,
        }
    }
}

/// What a single attempt produced.
enum Attempt {
    Continue,
    Complete(UploadResult),
    /// A completion response that does not identify the created resource.
    Invalid { status: u16, reason: String },
    Failed(String),
}

/// Sends `chunks` strictly in order, retrying each failed chunk in place.
///
/// * 308 advances to the next chunk.
/// * 200/201 ends the transfer, even if planned chunks remain.
/// * Anything else (including transport and source read errors) is retried
///   after `base^k` seconds until `policy.max_attempts` requests were made
///   for that chunk.
///
/// The sink is notified after every attempt. Cancellation is honoured
/// before each request and while waiting out a backoff; an in-flight
/// request is never interrupted.
pub async fn run<T>(
    transport: &T,
    session: &Session,
    chunks: &[Chunk],
    source: &mut dyn ChunkSource,
    policy: RetryPolicy,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<UploadResult, UploadError>
where
    T: UploadTransport + ?Sized,
{
    let total = session.total_size;
    let count = chunks.len();
    let mut state = TransferState {
        uploaded_bytes: 0,
        started: Instant::now(),
    };

    info!(total_size = total, chunks = count, "starting transfer");

    for chunk in chunks {
        let content_range = chunk.content_range(total);
        let mut data: Option<Bytes> = None;
        let mut failed: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                info!(
                    chunk = chunk.index,
                    uploaded_bytes = state.uploaded_bytes,
                    "transfer cancelled"
                );
                return Err(UploadError::Cancelled {
                    uploaded_bytes: state.uploaded_bytes,
                });
            }

            let attempt = failed + 1;
            debug!(chunk = chunk.index, attempt, range = %content_range, "sending chunk");

            let outcome = send_once(
                transport,
                session,
                chunk,
                &content_range,
                source,
                &mut data,
                state.uploaded_bytes + chunk.len,
            )
            .await;

            match outcome {
                Attempt::Continue => {
                    state.uploaded_bytes += chunk.len;
                    sink.on_chunk_result(&state.progress(total, chunk, ChunkOutcome::Continue));
                    sink.on_status(&format!(
                        "Chunk {}/{count} accepted ({}/{total} bytes)",
                        chunk.index + 1,
                        state.uploaded_bytes
                    ));
                    break;
                }
                Attempt::Complete(result) => {
                    state.uploaded_bytes += chunk.len;
                    sink.on_chunk_result(&state.progress(total, chunk, ChunkOutcome::Complete));
                    sink.on_status(&format!("Upload complete: {}", result.id));
                    info!(
                        id = %result.id,
                        uploaded_bytes = state.uploaded_bytes,
                        elapsed_ms = state.started.elapsed().as_millis() as u64,
                        "transfer complete"
                    );
                    return Ok(result);
                }
                Attempt::Invalid { status, reason } => {
                    warn!(chunk = chunk.index, status, reason = %reason, "invalid completion response");
                    let outcome = ChunkOutcome::Aborted {
                        attempts: attempt,
                        reason: reason.clone(),
                    };
                    sink.on_chunk_result(&state.progress(total, chunk, outcome));
                    return Err(UploadError::InvalidResponse { status, reason });
                }
                Attempt::Failed(reason) => {
                    failed += 1;

                    if !policy.allows_retry(failed) {
                        warn!(
                            chunk = chunk.index,
                            attempts = failed,
                            reason = %reason,
                            "chunk failed on every attempt, aborting"
                        );
                        let outcome = ChunkOutcome::Aborted {
                            attempts: failed,
                            reason: reason.clone(),
                        };
                        sink.on_chunk_result(&state.progress(total, chunk, outcome));
                        sink.on_status(&format!(
                            "Chunk {}/{count} failed after {failed} attempts: {reason}",
                            chunk.index + 1
                        ));
                        return Err(UploadError::ChunkTransfer {
                            index: chunk.index,
                            attempts: failed,
                            uploaded_bytes: state.uploaded_bytes,
                            reason,
                        });
                    }

                    let delay = policy.delay_for_attempt(failed);
                    warn!(
                        chunk = chunk.index,
                        attempt = failed,
                        delay_secs = delay.as_secs_f64(),
                        reason = %reason,
                        "chunk attempt failed, retrying"
                    );
                    sink.on_status(&format!(
                        "Chunk {}/{count} attempt {failed} failed ({reason}), retrying in {:.0}s",
                        chunk.index + 1,
                        delay.as_secs_f64()
                    ));
                    let outcome = ChunkOutcome::Retrying {
                        attempt: failed,
                        delay,
                        reason,
                    };
                    sink.on_chunk_result(&state.progress(total, chunk, outcome));

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!(chunk = chunk.index, "transfer cancelled during backoff");
                            return Err(UploadError::Cancelled {
                                uploaded_bytes: state.uploaded_bytes,
                            });
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    warn!(
        uploaded_bytes = state.uploaded_bytes,
        "every chunk acknowledged without completion"
    );
    Err(UploadError::Incomplete {
        uploaded_bytes: state.uploaded_bytes,
    })
}

/// Reads (once) and sends one chunk, classifying the reply.
///
/// `data` caches the chunk bytes so retries resend exactly the same body.
async fn send_once<T>(
    transport: &T,
    session: &Session,
    chunk: &Chunk,
    content_range: &str,
    source: &mut dyn ChunkSource,
    data: &mut Option<Bytes>,
    uploaded_on_success: u64,
) -> Attempt
where
    T: UploadTransport + ?Sized,
{
    let body = if let Some(bytes) = data.as_ref() {
        bytes.clone()
    } else {
        match source.read_chunk(chunk).await {
            Ok(bytes) => {
                *data = Some(bytes.clone());
                bytes
            }
            Err(e) => return Attempt::Failed(format!("source read failed: {e}")),
        }
    };

    let reply = match transport
        .send_chunk(&session.endpoint, content_range, body)
        .await
    {
        Ok(reply) => reply,
        Err(e) => return Attempt::Failed(e.to_string()),
    };

    match reply.status {
        308 => {
            if let Some(range) = &reply.range {
                debug!(chunk = chunk.index, acknowledged = %range, "server acknowledged range");
            }
            Attempt::Continue
        }
        200 | 201 => match UploadResult::from_body(&reply.body, uploaded_on_success) {
            Some(result) => Attempt::Complete(result),
            None => Attempt::Invalid {
                status: reply.status,
                reason: format!(
                    "no resource id in body: {}",
                    String::from_utf8_lossy(&reply.body)
                ),
            },
        },
        status => Attempt::Failed(format!(
            "unexpected status {status}: {}",
            String::from_utf8_lossy(&reply.body)
        )),
    }
}
