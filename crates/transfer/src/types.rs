use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_BACKOFF_BASE, DEFAULT_CHUNK_SIZE, DEFAULT_CONTENT_TYPE, DEFAULT_FILE_NAME,
    DEFAULT_MAX_ATTEMPTS,
};

/// One contiguous byte range of the source, sent as a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the plan (0-based).
    pub index: usize,
    /// First byte offset (inclusive).
    pub start: u64,
    /// Number of bytes in this chunk.
    pub len: u64,
}

impl Chunk {
    /// Last byte offset (inclusive), or `None` for the empty chunk of a
    /// zero-byte source.
    pub fn end(&self) -> Option<u64> {
        if self.len == 0 {
            None
        } else {
            Some(self.start + self.len - 1)
        }
    }

    /// Returns `true` for the single chunk planned for a zero-byte source.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Formats the `Content-Range` value for this chunk of a `total`-byte
    /// upload.
    ///
    /// The empty chunk uses the unsatisfied-range form `bytes */{total}`.
    pub fn content_range(&self, total: u64) -> String {
        match self.end() {
            Some(end) => format!("bytes {}-{end}/{total}", self.start),
            None => format!("bytes */{total}"),
        }
    }
}

/// Visibility of the created video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Unlisted,
    Private,
    Internal,
}

impl Privacy {
    /// Numeric code understood by the server.
    pub fn code(self) -> u8 {
        match self {
            Privacy::Public => 1,
            Privacy::Unlisted => 2,
            Privacy::Private => 3,
            Privacy::Internal => 4,
        }
    }
}

impl std::str::FromStr for Privacy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" | "1" => Ok(Privacy::Public),
            "unlisted" | "2" => Ok(Privacy::Unlisted),
            "private" | "3" => Ok(Privacy::Private),
            "internal" | "4" => Ok(Privacy::Internal),
            other => Err(format!("unknown privacy level: {other}")),
        }
    }
}

/// Immutable description of a single transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSpec {
    /// Total source length in bytes.
    pub total_size: u64,
    /// Declared media type of the whole upload.
    pub content_type: String,
    /// Human-readable display name of the created resource.
    pub name: String,
    /// File name declared at session initiation.
    pub file_name: String,
    /// Destination channel, if the server should not pick its default.
    pub channel_id: Option<u64>,
    pub privacy: Privacy,
    /// Upper bound on the length of each chunk.
    pub chunk_size: u64,
    /// Requests issued for one chunk before the whole transfer is aborted.
    pub max_attempts: u32,
    /// Backoff base in seconds.
    pub backoff_base: f64,
}

impl TransferSpec {
    /// Creates a spec with default chunking and retry settings.
    pub fn new(name: impl Into<String>, total_size: u64) -> Self {
        Self {
            total_size,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            name: name.into(),
            file_name: DEFAULT_FILE_NAME.to_string(),
            channel_id: None,
            privacy: Privacy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn with_channel_id(mut self, channel_id: u64) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    pub fn with_privacy(mut self, privacy: Privacy) -> Self {
        self.privacy = privacy;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: f64) -> Self {
        self.backoff_base = backoff_base;
        self
    }
}

/// Top-level lifecycle of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPhase {
    NotStarted,
    /// Opening the resumable session.
    Negotiating,
    /// Sending chunks to the session endpoint.
    Transferring,
    /// The remote resource exists.
    Completed,
    /// Linking the created resource into a collection.
    Attaching,
    Failed,
    Cancelled,
}

impl UploadPhase {
    /// Returns `true` once no further transitions are possible for the
    /// transfer itself.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UploadPhase::Completed | UploadPhase::Failed | UploadPhase::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_end_and_range() {
        let chunk = Chunk {
            index: 1,
            start: 100,
            len: 50,
        };
        assert_eq!(chunk.end(), Some(149));
        assert_eq!(chunk.content_range(1000), "bytes 100-149/1000");
        assert!(!chunk.is_empty());
    }

    #[test]
    fn empty_chunk_uses_unsatisfied_range() {
        let chunk = Chunk {
            index: 0,
            start: 0,
            len: 0,
        };
        assert_eq!(chunk.end(), None);
        assert!(chunk.is_empty());
        assert_eq!(chunk.content_range(0), "bytes */0");
    }

    #[test]
    fn spec_defaults() {
        let spec = TransferSpec::new("My video", 42);
        assert_eq!(spec.total_size, 42);
        assert_eq!(spec.chunk_size, 50 * 1024 * 1024);
        assert_eq!(spec.max_attempts, 10);
        assert!((spec.backoff_base - 2.0).abs() < f64::EPSILON);
        assert_eq!(spec.content_type, "video/mp4");
        assert_eq!(spec.file_name, "uploaded_file.mp4");
        assert_eq!(spec.privacy, Privacy::Public);
        assert!(spec.channel_id.is_none());
    }

    #[test]
    fn spec_builder_overrides() {
        let spec = TransferSpec::new("clip", 10)
            .with_chunk_size(4)
            .with_max_attempts(3)
            .with_backoff_base(3.0)
            .with_channel_id(12187)
            .with_privacy(Privacy::Unlisted)
            .with_file_name("clip.webm")
            .with_content_type("video/webm");
        assert_eq!(spec.chunk_size, 4);
        assert_eq!(spec.max_attempts, 3);
        assert_eq!(spec.channel_id, Some(12187));
        assert_eq!(spec.privacy.code(), 2);
        assert_eq!(spec.file_name, "clip.webm");
        assert_eq!(spec.content_type, "video/webm");
    }

    #[test]
    fn privacy_codes() {
        assert_eq!(Privacy::Public.code(), 1);
        assert_eq!(Privacy::Unlisted.code(), 2);
        assert_eq!(Privacy::Private.code(), 3);
        assert_eq!(Privacy::Internal.code(), 4);
    }

    #[test]
    fn privacy_from_str() {
        assert_eq!("unlisted".parse::<Privacy>(), Ok(Privacy::Unlisted));
        assert_eq!("Private".parse::<Privacy>(), Ok(Privacy::Private));
        assert_eq!("4".parse::<Privacy>(), Ok(Privacy::Internal));
        assert!("secret".parse::<Privacy>().is_err());
    }

    #[test]
    fn terminal_phases() {
        assert!(UploadPhase::Completed.is_terminal());
        assert!(UploadPhase::Failed.is_terminal());
        assert!(UploadPhase::Cancelled.is_terminal());
        assert!(!UploadPhase::Transferring.is_terminal());
        assert!(!UploadPhase::Attaching.is_terminal());
    }
}
