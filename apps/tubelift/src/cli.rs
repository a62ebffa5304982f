use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tubelift_transfer::Privacy;

#[derive(Debug, Parser)]
#[command(name = "tubelift")]
#[command(author, version, about = "Resumable chunked uploads to PeerTube", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/tubelift/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Instance base URL, overriding the configuration file
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload a video file, then optionally add it to a playlist
    Upload(UploadArgs),

    /// Add an already uploaded video to a playlist
    Attach {
        /// Video UUID or numeric id
        video_id: String,
        #[arg(long)]
        playlist_id: Option<String>,
        /// 1-based position in the playlist
        #[arg(long)]
        position: Option<u32>,
    },
}

#[derive(Debug, clap::Args)]
pub struct UploadArgs {
    /// File to upload
    pub file: PathBuf,

    /// Display name of the video
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub channel_id: Option<u64>,

    /// Playlist to add the video to once uploaded
    #[arg(long)]
    pub playlist_id: Option<String>,

    /// 1-based position in the playlist
    #[arg(long)]
    pub position: Option<u32>,

    #[arg(long)]
    pub chunk_size_mib: Option<u64>,

    /// Requests per chunk before giving up
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Backoff base in seconds (wait before retry k+1 is base^k)
    #[arg(long)]
    pub backoff_base: Option<f64>,

    #[arg(long)]
    pub content_type: Option<String>,

    /// public, unlisted, private or internal
    #[arg(long)]
    pub privacy: Option<Privacy>,
}
