//! Shared fixtures for reader integration tests.
//!
//! Test datasets are RecordIO-framed in-memory stores whose data records
//! carry a little-endian `u64` marker, so tests can recover exactly which
//! instances ended up where.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;

use data_reader::batch::BatchDescriptor;
use data_reader::decoder::{BadBatch, Decoder, SegmentationStrategy};
use data_reader::decoders::RawBytesDecoder;
use data_reader::example::Example;
use data_reader::instance::Instance;
use data_reader::schema::Schema;
use data_reader::store::{DataStore, InMemoryStore};
use data_reader::{DataReader, ReadError, ReaderConfig};

pub const FRAME_MAGIC: u32 = 0xced7_230a;

/// Encodes one RecordIO frame: magic word, header word (kind in the top 3
/// bits, payload length in the low 29), payload, zero padding to 4 bytes.
pub fn encode_frame(kind: u32, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(8 + payload.len() + 3);
    frame.extend_from_slice(&FRAME_MAGIC.to_le_bytes());
    frame.extend_from_slice(&((kind << 29) | payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    while frame.len() % 4 != 0 {
        frame.push(0);
    }
    frame
}

pub fn data_frame(payload: &[u8]) -> Vec<u8> {
    encode_frame(0, payload)
}

/// A store of `markers.len()` data records, each an 8-byte marker payload.
pub fn marker_store(id: &str, markers: impl IntoIterator<Item = u64>) -> Arc<dyn DataStore> {
    let mut bytes = Vec::new();
    for marker in markers {
        bytes.extend(data_frame(&marker.to_le_bytes()));
    }
    Arc::new(InMemoryStore::new(id, bytes))
}

/// Two stores carrying markers `0..first` and `first..first + second`.
pub fn marker_stores(first: u64, second: u64) -> Vec<Arc<dyn DataStore>> {
    vec![
        marker_store("store-0", 0..first),
        marker_store("store-1", first..first + second),
    ]
}

pub fn reader(stores: Vec<Arc<dyn DataStore>>, config: ReaderConfig) -> DataReader {
    DataReader::new(stores, Arc::new(RawBytesDecoder::framed()), config).unwrap()
}

/// Drains the reader into the list of delivered examples.
pub fn collect_examples(reader: &DataReader) -> Result<Vec<Example>, ReadError> {
    let mut examples = Vec::new();
    while let Some(example) = reader.next()? {
        examples.push(example);
    }
    Ok(examples)
}

/// The markers of an example's real rows (padding rows excluded).
pub fn markers_of(example: &Example) -> Vec<u64> {
    let tensor = example.tensor("bytes").expect("marker attribute");
    let width = tensor.row_shape()[0];
    assert_eq!(width, 8, "marker rows are u64s");
    let data = tensor.as_u8().unwrap();
    let real_rows = tensor.num_rows() - example.padding();
    (0..real_rows)
        .map(|row| u64::from_le_bytes(data[row * 8..(row + 1) * 8].try_into().unwrap()))
        .collect()
}

/// Every delivered marker, in delivery order.
pub fn collect_markers(reader: &DataReader) -> Result<Vec<u64>, ReadError> {
    Ok(collect_examples(reader)?
        .iter()
        .flat_map(markers_of)
        .collect())
}

// ================================================================================================
// Test decoders
// ================================================================================================

/// Delegates to [`RawBytesDecoder`] but rejects a chosen set of batch
/// indices, for exercising bad-batch policies.
pub struct RejectingDecoder {
    inner: RawBytesDecoder,
    rejected: HashSet<u64>,
}

impl RejectingDecoder {
    pub fn rejecting(indices: impl IntoIterator<Item = u64>) -> Self {
        Self {
            inner: RawBytesDecoder::framed(),
            rejected: indices.into_iter().collect(),
        }
    }
}

impl Decoder for RejectingDecoder {
    fn segmentation(&self, store: &dyn DataStore) -> SegmentationStrategy {
        self.inner.segmentation(store)
    }

    fn infer_schema(&self, instance: &Instance) -> Result<Schema> {
        self.inner.infer_schema(instance)
    }

    fn decode(&self, batch: &BatchDescriptor, schema: &Arc<Schema>) -> Result<Example, BadBatch> {
        if self.rejected.contains(&batch.index) {
            return Err(BadBatch::new(format!(
                "synthetic decode failure for batch {}",
                batch.index
            )));
        }
        self.inner.decode(batch, schema)
    }
}

// ================================================================================================
// Blocking store
// ================================================================================================

mod blocking {
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use data_reader::store::{DataStore, InputStream, StreamAbort};

    /// A store whose reads block until the stream's abort handle fires.
    /// Stands in for a stalled pipe when testing cancellation liveness.
    pub struct BlockingStore {
        id: String,
    }

    impl BlockingStore {
        pub fn new(id: impl Into<String>) -> Self {
            Self { id: id.into() }
        }
    }

    impl DataStore for BlockingStore {
        fn id(&self) -> &str {
            &self.id
        }

        fn open(&self) -> io::Result<Box<dyn InputStream>> {
            Ok(Box::new(BlockingStream {
                aborted: Arc::new(AtomicBool::new(false)),
            }))
        }
    }

    struct BlockingStream {
        aborted: Arc<AtomicBool>,
    }

    struct Abort(Arc<AtomicBool>);

    impl StreamAbort for Abort {
        fn abort(&self) {
            self.0.store(true, Ordering::Relaxed);
        }
    }

    impl InputStream for BlockingStream {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            while !self.aborted.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_millis(2));
            }
            Ok(0)
        }

        fn abort_handle(&self) -> Arc<dyn StreamAbort> {
            Arc::new(Abort(Arc::clone(&self.aborted)))
        }
    }
}

pub use blocking::BlockingStore;
