//! Command execution.

use anyhow::{Context, bail};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tubelift_peertube::Client;
use tubelift_transfer::{ChunkSource, FileSource, TransferSpec, validate_file_name};
use tubelift_upload::{AttachTarget, PeerTubeTransport, UploadError, UploadResult, Uploader};

use crate::cli::{Command, UploadArgs};
use crate::config::Config;
use crate::sink::LogSink;

/// Runs one command until it completes or Ctrl-C is pressed.
///
/// The first Ctrl-C stops after the current chunk; a second one aborts the
/// request in flight.
pub async fn run(config: Config, command: Command) -> anyhow::Result<()> {
    let uploader = build_uploader(&config)?;

    tokio::select! {
        result = execute(&uploader, &config, command) => result,
        () = stop_on_interrupts(ctrl_c_signals(), uploader.cancel_token()) => {
            bail!("interrupted")
        }
    }
}

async fn execute(
    uploader: &Uploader<PeerTubeTransport>,
    config: &Config,
    command: Command,
) -> anyhow::Result<()> {
    match command {
        Command::Upload(args) => upload(uploader, config, args).await,
        Command::Attach {
            video_id,
            playlist_id,
            position,
        } => {
            let target = attach_target(playlist_id.or(config.playlist_id.clone()), position)?
                .context("no playlist given (use --playlist-id or set playlist_id)")?;
            let result = UploadResult {
                id: video_id,
                numeric_id: None,
                short_uuid: None,
                bytes_uploaded: 0,
                metadata: Default::default(),
            };
            uploader.attach(&result, &target).await?;
            info!(video = %result.id, playlist = %target.collection_id, "done");
            Ok(())
        }
    }
}

fn ctrl_c_signals() -> mpsc::UnboundedReceiver<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });
    rx
}

/// Cancels `cancel` on the first interrupt and resolves on the second.
async fn stop_on_interrupts(mut signals: mpsc::UnboundedReceiver<()>, cancel: CancellationToken) {
    if signals.recv().await.is_none() {
        return std::future::pending().await;
    }
    info!("interrupt received, stopping after the current chunk (Ctrl-C again to abort)");
    cancel.cancel();

    if signals.recv().await.is_none() {
        return std::future::pending().await;
    }
    warn!("second interrupt received, aborting");
}

fn build_uploader(config: &Config) -> anyhow::Result<Uploader<PeerTubeTransport>> {
    if config.base_url.trim().is_empty() {
        bail!("no instance configured (use --base-url or set base_url)");
    }
    let token = config
        .resolve_token()
        .context("no API token (set TUBELIFT_TOKEN or token in the config file)")?;
    let client = Client::with_timeout(&config.base_url, &token, config.request_timeout())?;
    Ok(Uploader::new(PeerTubeTransport::new(client)))
}

async fn upload(
    uploader: &Uploader<PeerTubeTransport>,
    config: &Config,
    args: UploadArgs,
) -> anyhow::Result<()> {
    let mut source = FileSource::open(&args.file)
        .await
        .with_context(|| format!("opening {}", args.file.display()))?;

    let spec = build_spec(config, &args, &source);
    let target = attach_target(
        args.playlist_id.or(config.playlist_id.clone()),
        args.position,
    )?;

    info!(
        file = %args.file.display(),
        size = spec.total_size,
        chunk_size = spec.chunk_size,
        "uploading"
    );

    let sink = LogSink::new();
    match uploader
        .upload_and_attach(&mut source, &spec, target.as_ref(), &sink)
        .await
    {
        Ok(result) => {
            println!("{}", result.id);
            Ok(())
        }
        Err(err @ UploadError::Attachment { .. }) => {
            if let Some(result) = err.upload_result() {
                error!(
                    video = %result.id,
                    "video uploaded but not added to the playlist; retry with `tubelift attach {}`",
                    result.id
                );
                println!("{}", result.id);
            }
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

/// Merges configuration and flags into the transfer description.
fn build_spec(
    config: &Config,
    args: &UploadArgs,
    source: &dyn ChunkSource,
) -> TransferSpec {
    let mut spec = TransferSpec::new(&args.name, source.len())
        .with_chunk_size(
            args.chunk_size_mib
                .map(|mib| mib.saturating_mul(1024 * 1024))
                .unwrap_or_else(|| config.chunk_size_bytes()),
        )
        .with_max_attempts(args.max_attempts.unwrap_or(config.max_attempts))
        .with_backoff_base(args.backoff_base.unwrap_or(config.backoff_base))
        .with_content_type(
            args.content_type
                .clone()
                .unwrap_or_else(|| config.content_type.clone()),
        )
        .with_privacy(args.privacy.unwrap_or(config.privacy));

    if let Some(name) = source.file_name()
        && validate_file_name(name).is_ok()
    {
        spec = spec.with_file_name(name);
    }
    if let Some(channel_id) = args.channel_id.or(config.channel_id) {
        spec = spec.with_channel_id(channel_id);
    }
    spec
}

/// Resolves the playlist to attach to, if any.
///
/// The playlist may come from a flag or from the configuration, so a
/// position without either is only caught here.
fn attach_target(
    playlist_id: Option<String>,
    position: Option<u32>,
) -> anyhow::Result<Option<AttachTarget>> {
    let Some(playlist_id) = playlist_id else {
        if position.is_some() {
            bail!("--position needs a playlist (use --playlist-id or set playlist_id)");
        }
        return Ok(None);
    };
    let mut target = AttachTarget::new(playlist_id);
    if let Some(position) = position {
        target = target.with_position(position);
    }
    Ok(Some(target))
}
