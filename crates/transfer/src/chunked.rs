use std::future::Future;
use std::io::SeekFrom;
use std::path::Path;
use std::pin::Pin;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::TransferError;
use crate::types::Chunk;

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Splits `total_size` bytes into contiguous chunks of at most `chunk_size`.
///
/// Always returns at least one chunk: a zero-byte source yields a single
/// empty chunk at offset 0.
pub fn plan(total_size: u64, chunk_size: u64) -> Result<Vec<Chunk>, TransferError> {
    if chunk_size == 0 {
        return Err(TransferError::InvalidConfig(
            "chunk size must be at least 1 byte".into(),
        ));
    }

    if total_size == 0 {
        return Ok(vec![Chunk {
            index: 0,
            start: 0,
            len: 0,
        }]);
    }

    let count = total_size.div_ceil(chunk_size);
    let chunks = (0..count)
        .map(|i| {
            let start = i * chunk_size;
            Chunk {
                index: i as usize,
                start,
                len: chunk_size.min(total_size - start),
            }
        })
        .collect();
    Ok(chunks)
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Read-only byte source accessed one chunk at a time.
///
/// Only the transfer loop reads from a source, so implementations take
/// `&mut self` and need no internal locking.
pub trait ChunkSource: Send {
    /// Total length of the source in bytes.
    fn len(&self) -> u64;

    /// Returns `true` for a zero-byte source.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Name to declare to the server, if the source has one.
    fn file_name(&self) -> Option<&str> {
        None
    }

    /// Reads exactly `chunk.len` bytes starting at `chunk.start`.
    fn read_chunk<'a>(
        &'a mut self,
        chunk: &'a Chunk,
    ) -> Pin<Box<dyn Future<Output = std::io::Result<Bytes>> + Send + 'a>>;
}

/// A file on local disk.
pub struct FileSource {
    file: tokio::fs::File,
    len: u64,
    file_name: Option<String>,
}

impl FileSource {
    /// Opens `path` for chunked reading.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        let len = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(Self {
            file,
            len,
            file_name,
        })
    }
}

impl ChunkSource for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    fn read_chunk<'a>(
        &'a mut self,
        chunk: &'a Chunk,
    ) -> Pin<Box<dyn Future<Output = std::io::Result<Bytes>> + Send + 'a>> {
        Box::pin(async move {
            let mut buf = vec![0u8; chunk.len as usize];
            if !buf.is_empty() {
                self.file.seek(SeekFrom::Start(chunk.start)).await?;
                self.file.read_exact(&mut buf).await?;
            }
            Ok(Bytes::from(buf))
        })
    }
}

/// An in-memory buffer, e.g. a file received by a web form.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
    file_name: Option<String>,
}

impl MemorySource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            file_name: None,
        }
    }

    /// Attaches the name the buffer was received under.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

impl ChunkSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    fn read_chunk<'a>(
        &'a mut self,
        chunk: &'a Chunk,
    ) -> Pin<Box<dyn Future<Output = std::io::Result<Bytes>> + Send + 'a>> {
        Box::pin(async move {
            let start = chunk.start as usize;
            let end = start + chunk.len as usize;
            if end > self.data.len() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "chunk {} wants bytes {start}..{end} but source holds {}",
                        chunk.index,
                        self.data.len()
                    ),
                ));
            }
            Ok(self.data.slice(start..end))
        })
    }
}
