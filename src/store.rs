//! src/store.rs
//!
//! Data stores and input streams.
//!
//! A [`DataStore`] is an opaque, append-only byte source with a stable id.
//! The reader only ever consumes stores sequentially: `reset` rewinds by
//! reopening, never by seeking. Streams expose an abort handle so the
//! cancellation path can force a blocked read to return promptly.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::buffer::ByteSlice;

/// Forces pending and future reads on the associated stream to return
/// promptly. Must be callable from any thread.
pub trait StreamAbort: Send + Sync {
    fn abort(&self);
}

/// A sequential, non-seekable byte stream.
pub trait InputStream: Send {
    /// Reads up to `buf.len()` bytes. Returns 0 at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Handle used by the cancellation path while a read may be blocked on
    /// another thread. The default handle is a no-op, which is adequate for
    /// streams whose reads cannot block indefinitely.
    fn abort_handle(&self) -> Arc<dyn StreamAbort> {
        Arc::new(NoopAbort)
    }
}

struct NoopAbort;

impl StreamAbort for NoopAbort {
    fn abort(&self) {}
}

/// An opaque byte-stream source identified by a stable id.
///
/// Stores are opened in the ingest task only; `reset` obtains a fresh stream
/// by calling `open` again.
pub trait DataStore: Send + Sync {
    /// Stable identifier used in diagnostics and fault reports.
    fn id(&self) -> &str;

    /// Opens a fresh stream positioned at the start of the store.
    fn open(&self) -> io::Result<Box<dyn InputStream>>;
}

// ================================================================================================
// Local file store
// ================================================================================================

/// A data store backed by a local file. The id is the path.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    id: String,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let id = path.to_string_lossy().into_owned();
        Self { path, id }
    }
}

impl DataStore for FileStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&self) -> io::Result<Box<dyn InputStream>> {
        let file = File::open(&self.path)?;
        Ok(Box::new(FileInputStream { file }))
    }
}

struct FileInputStream {
    file: File,
}

impl InputStream for FileInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

// ================================================================================================
// In-memory store
// ================================================================================================

/// A data store over an in-memory byte blob.
///
/// Reopening is free: each stream is an independent read position over the
/// shared buffer.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    id: String,
    bytes: ByteSlice,
}

impl InMemoryStore {
    pub fn new(id: impl Into<String>, bytes: impl Into<ByteSlice>) -> Self {
        Self {
            id: id.into(),
            bytes: bytes.into(),
        }
    }
}

impl DataStore for InMemoryStore {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&self) -> io::Result<Box<dyn InputStream>> {
        Ok(Box::new(InMemoryInputStream {
            bytes: self.bytes.clone(),
            pos: 0,
            aborted: Arc::new(AtomicBool::new(false)),
        }))
    }
}

struct InMemoryInputStream {
    bytes: ByteSlice,
    pos: usize,
    aborted: Arc<AtomicBool>,
}

struct FlagAbort(Arc<AtomicBool>);

impl StreamAbort for FlagAbort {
    fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

impl InputStream for InMemoryInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.aborted.load(Ordering::Relaxed) {
            return Ok(0);
        }
        let remaining = self.bytes.len() - self.pos;
        let n = remaining.min(buf.len());
        buf[..n].copy_from_slice(&self.bytes.as_bytes()[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn abort_handle(&self) -> Arc<dyn StreamAbort> {
        Arc::new(FlagAbort(Arc::clone(&self.aborted)))
    }
}
