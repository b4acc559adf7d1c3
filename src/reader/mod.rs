//! src/reader/mod.rs
//!
//! The parallel batching pipeline.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌───────────────┐      ┌────────────────┐      ┌─────────────────┐
//!   │ DatasetCursor │─────▶│ RecordSegmenter │─────▶│ InstanceStream  │
//!   └───────────────┘      └────────────────┘      └────────┬────────┘
//!        chunks per store        framed records             │ filtered,
//!        + boundaries                                       │ shuffled
//!                                                           ↓
//!                                                  ┌─────────────────┐
//!                                                  │   BatchFormer   │
//!                                                  └────────┬────────┘
//!                              bounded channel (P slots)    │ indexed batches
//!                         ┌─────────────┬─────────────┬─────┘
//!                         ↓             ↓             ↓
//!                    ┌─────────┐  ┌─────────┐   ┌─────────┐
//!                    │ worker 0 │  │ worker 1 │ … │ worker N │   decode pool
//!                    └────┬────┘  └────┬────┘   └────┬────┘
//!                         └─────────────┴─────────────┘
//!                                       │ (index, example | tombstone)
//!                                       ↓
//!                              ┌────────────────┐
//!                              │  ReorderQueue  │  smallest index first
//!                              └────────┬───────┘
//!                                       │
//!                                       ↓
//!                              ┌────────────────┐
//!                              │   DataReader   │  next / peek / reset
//!                              └────────────────┘
//! ```
//!
//! The ingest side (cursor → segmenter → instance stream → batch former)
//! runs on a single producer thread; decoding fans out over the worker
//! pool; the reorder queue restores batch-index order and bounds the
//! number of outstanding batches to the prefetch depth.
//!
//! # Module Structure
//!
//! ```text
//! src/reader/
//! ├── mod.rs         # Architecture docs + shared counters
//! ├── controller.rs  # DataReader: public surface and lifecycle
//! ├── ingest.rs      # The producer task
//! ├── pool.rs        # Decode worker pool
//! └── reorder.rs     # Ordered prefetch queue
//! ```

mod controller;
mod ingest;
mod pool;
mod reorder;

pub use controller::DataReader;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-epoch read statistics. Byte counting lives behind its own `Arc` so
/// the cursor can bump it without reaching back into the reader.
pub(crate) struct Counters {
    pub(crate) bytes_read: Arc<AtomicU64>,
    pub(crate) data_records: AtomicU64,
    pub(crate) skipped_records: AtomicU64,
}

impl Counters {
    pub(crate) fn new() -> Self {
        Self {
            bytes_read: Arc::new(AtomicU64::new(0)),
            data_records: AtomicU64::new(0),
            skipped_records: AtomicU64::new(0),
        }
    }

    pub(crate) fn clear(&self) {
        self.bytes_read.store(0, Ordering::Relaxed);
        self.data_records.store(0, Ordering::Relaxed);
        self.skipped_records.store(0, Ordering::Relaxed);
    }
}
