//! src/buffer.rs
//!
//! Reference-counted byte slices.
//!
//! Every stage of the pipeline shares raw bytes through [`ByteSlice`]: an
//! immutable view over a contiguous range of a shared buffer. Subslicing is
//! free (no copy); the backing buffer lives for as long as any slice
//! references it, so a record handed to a decode worker stays valid until the
//! worker returns its example.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// An immutable, reference-counted view over a contiguous byte range.
///
/// Cloning a `ByteSlice` is cheap (one refcount bump); the underlying buffer
/// is deallocated when the last slice referencing it is dropped.
#[derive(Clone)]
pub struct ByteSlice {
    buf: Arc<[u8]>,
    start: usize,
    end: usize,
}

impl ByteSlice {
    /// Wraps an owned buffer into a slice covering the whole of it.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        let buf: Arc<[u8]> = Arc::from(bytes);
        let end = buf.len();
        Self { buf, start: 0, end }
    }

    /// An empty slice backed by no allocation worth speaking of.
    pub fn empty() -> Self {
        Self::from_vec(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Returns a zero-copy subslice of `self` covering `offset..offset + len`.
    ///
    /// # Panics
    /// Panics if the range falls outside this slice.
    pub fn slice(&self, offset: usize, len: usize) -> ByteSlice {
        assert!(
            offset + len <= self.len(),
            "subslice {}..{} out of bounds for slice of length {}",
            offset,
            offset + len,
            self.len()
        );
        Self {
            buf: Arc::clone(&self.buf),
            start: self.start + offset,
            end: self.start + offset + len,
        }
    }
}

impl Deref for ByteSlice {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for ByteSlice {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for ByteSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteSlice")
            .field("len", &self.len())
            .finish()
    }
}

impl From<Vec<u8>> for ByteSlice {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_vec(bytes)
    }
}

impl From<&[u8]> for ByteSlice {
    fn from(bytes: &[u8]) -> Self {
        Self::from_vec(bytes.to_vec())
    }
}
