//! src/cursor.rs
//!
//! The dataset cursor: concatenates data stores into one chunked byte
//! sequence with explicit store boundaries.
//!
//! The cursor is pull-based and owned by the ingest task. Each pull yields
//! either a bounded chunk of the current store, a boundary event when a
//! store drains (so the segmenter can reset its parser state), or the
//! terminal event once the store list is exhausted. A shared byte counter
//! backs `num_bytes_read` on the controller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::buffer::ByteSlice;
use crate::error::ReadError;
use crate::memory::MemoryAllocator;
use crate::store::{DataStore, InputStream, StreamAbort};

/// Upper bound on the size of a single cursor chunk.
pub(crate) const CHUNK_SIZE: usize = 64 * 1024;

/// One pull from the cursor.
pub(crate) enum CursorEvent {
    /// A chunk of at most [`CHUNK_SIZE`] bytes from the store at `store_index`.
    Chunk {
        store_index: usize,
        data: ByteSlice,
    },
    /// The store at `store_index` is exhausted; the next chunk (if any)
    /// belongs to a different store.
    StoreBoundary { store_index: usize },
    /// The whole store list is exhausted.
    End,
}

struct OpenStore {
    index: usize,
    stream: Box<dyn InputStream>,
    offset: u64,
}

pub(crate) struct DatasetCursor {
    stores: Arc<Vec<Arc<dyn DataStore>>>,
    allocator: Arc<dyn MemoryAllocator>,
    next_store: usize,
    current: Option<OpenStore>,
    bytes_read: Arc<AtomicU64>,
    // The abort handle of the currently open stream, reachable from the
    // cancellation path while the ingest task may be blocked in `read`.
    abort_slot: Arc<Mutex<Option<Arc<dyn StreamAbort>>>>,
}

impl DatasetCursor {
    pub(crate) fn new(
        stores: Arc<Vec<Arc<dyn DataStore>>>,
        allocator: Arc<dyn MemoryAllocator>,
        bytes_read: Arc<AtomicU64>,
        abort_slot: Arc<Mutex<Option<Arc<dyn StreamAbort>>>>,
    ) -> Self {
        Self {
            stores,
            allocator,
            next_store: 0,
            current: None,
            bytes_read,
            abort_slot,
        }
    }

    /// The id of the store an event at `store_index` originated from.
    pub(crate) fn store_id(&self, store_index: usize) -> &str {
        self.stores[store_index].id()
    }

    /// Pulls the next event from the concatenated stream.
    pub(crate) fn next_event(&mut self) -> Result<CursorEvent, ReadError> {
        if self.current.is_none() {
            if self.next_store >= self.stores.len() {
                return Ok(CursorEvent::End);
            }
            let index = self.next_store;
            let store = &self.stores[index];
            let stream = store.open().map_err(|err| ReadError::Io {
                store_id: store.id().to_string(),
                offset: 0,
                message: format!("failed to open store: {err}"),
            })?;
            *self.abort_slot.lock().unwrap() = Some(stream.abort_handle());
            self.current = Some(OpenStore {
                index,
                stream,
                offset: 0,
            });
        }
        let open = self.current.as_mut().unwrap();

        let mut buf = self.allocator.allocate(CHUNK_SIZE);
        let n = match open.stream.read(&mut buf) {
            Ok(n) => n,
            Err(err) => {
                let store_id = self.stores[open.index].id().to_string();
                let offset = open.offset;
                return Err(ReadError::Io {
                    store_id,
                    offset,
                    message: err.to_string(),
                });
            }
        };

        if n == 0 {
            let index = open.index;
            self.current = None;
            *self.abort_slot.lock().unwrap() = None;
            self.next_store = index + 1;
            return Ok(CursorEvent::StoreBoundary { store_index: index });
        }

        open.offset += n as u64;
        self.bytes_read.fetch_add(n as u64, Ordering::Relaxed);
        buf.truncate(n);
        Ok(CursorEvent::Chunk {
            store_index: open.index,
            data: ByteSlice::from_vec(buf),
        })
    }
}
