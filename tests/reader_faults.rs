//! Fault handling: framing faults, bad-batch policies, schema mismatches,
//! and the poisoned state.

mod common;

use std::sync::Arc;

use anyhow::Result;

use common::{collect_markers, data_frame, encode_frame, marker_store, reader, RejectingDecoder};
use data_reader::batch::BatchDescriptor;
use data_reader::decoder::{BadBatch, Decoder, SegmentationStrategy};
use data_reader::decoders::RawBytesDecoder;
use data_reader::example::Example;
use data_reader::instance::Instance;
use data_reader::schema::Schema;
use data_reader::store::{DataStore, InMemoryStore};
use data_reader::tensor::Tensor;
use data_reader::{BadBatchHandling, DataReader, ReadError, ReaderConfig};

fn store_of(id: &str, bytes: Vec<u8>) -> Vec<Arc<dyn DataStore>> {
    vec![Arc::new(InMemoryStore::new(id, bytes))]
}

#[test]
fn corrupt_header_poisons_the_epoch_before_any_delivery() -> Result<()> {
    // One header frame, one 8-byte data frame, then a corrupt header.
    let mut bytes = Vec::new();
    bytes.extend(encode_frame(1, b"hdr"));
    bytes.extend(data_frame(&7u64.to_le_bytes()));
    bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0]);

    let config = ReaderConfig::builder()
        .batch_size(1)
        .bad_batch_handling(BadBatchHandling::Skip)
        .build();
    let reader = reader(store_of("corrupt", bytes), config);

    // The framing fault precedes every delivery: zero examples.
    let fault = reader.next().unwrap_err();
    assert!(matches!(
        fault,
        ReadError::Framing { ref store_id, .. } if store_id == "corrupt"
    ));

    // Poisoned: the same fault comes back until reset.
    let again = reader.next().unwrap_err();
    assert_eq!(fault.to_string(), again.to_string());
    Ok(())
}

#[test]
fn truncated_store_is_a_framing_fault() {
    let mut bytes = data_frame(&1u64.to_le_bytes());
    bytes.truncate(bytes.len() - 3);

    let reader = reader(store_of("truncated", bytes), ReaderConfig::default());
    let fault = reader.next().unwrap_err();
    assert!(matches!(fault, ReadError::Framing { .. }));
    assert!(fault.to_string().contains("truncated"));
}

#[test]
fn skip_policy_tombstones_bad_batches() -> Result<()> {
    // 10 markers, B = 2 -> batches 0..5; batches 1 and 3 fail to decode.
    let config = ReaderConfig::builder()
        .batch_size(2)
        .bad_batch_handling(BadBatchHandling::Skip)
        .build();
    let reader = DataReader::new(
        vec![marker_store("s", 0..10)],
        Arc::new(RejectingDecoder::rejecting([1, 3])),
        config,
    )
    .unwrap();

    let markers = collect_markers(&reader)?;
    assert_eq!(markers, vec![0, 1, 4, 5, 8, 9]);
    Ok(())
}

#[test]
fn warn_policy_also_drops_the_batch() -> Result<()> {
    let config = ReaderConfig::builder()
        .batch_size(2)
        .bad_batch_handling(BadBatchHandling::Warn)
        .build();
    let reader = DataReader::new(
        vec![marker_store("s", 0..10)],
        Arc::new(RejectingDecoder::rejecting([0])),
        config,
    )
    .unwrap();

    let markers = collect_markers(&reader)?;
    assert_eq!(markers, vec![2, 3, 4, 5, 6, 7, 8, 9]);
    Ok(())
}

#[test]
fn error_policy_poisons_at_the_failing_batch() -> Result<()> {
    // Workers running ahead of the consumer may record the batch-2 fault
    // long before batches 0 and 1 are consumed; contiguity must hold
    // regardless, so no serialization of the pipeline here.
    let config = ReaderConfig::builder()
        .batch_size(2)
        .num_parallel_reads(4)
        .num_prefetched_batches(4)
        .bad_batch_handling(BadBatchHandling::Error)
        .build();
    let reader = DataReader::new(
        vec![marker_store("s", 0..10)],
        Arc::new(RejectingDecoder::rejecting([2])),
        config,
    )
    .unwrap();

    // Every batch before the bad one arrives, contiguously and in order.
    assert_eq!(common::markers_of(&reader.next()?.unwrap()), vec![0, 1]);
    assert_eq!(common::markers_of(&reader.next()?.unwrap()), vec![2, 3]);

    let fault = reader.next().unwrap_err();
    assert!(matches!(fault, ReadError::BadBatch { batch_index: 2, .. }));

    // Poisoned until reset; after reset the epoch replays and fails again.
    assert!(reader.next().is_err());
    reader.reset();
    assert!(reader.next().is_ok());
    Ok(())
}

#[test]
fn decoder_width_mismatch_respects_the_policy() -> Result<()> {
    // Records of width 8 then one of width 4: the mixed batch is bad.
    let mut bytes = Vec::new();
    for marker in 0u64..4 {
        bytes.extend(data_frame(&marker.to_le_bytes()));
    }
    bytes.extend(data_frame(&[9, 9, 9, 9]));

    let config = ReaderConfig::builder()
        .batch_size(5)
        .bad_batch_handling(BadBatchHandling::Skip)
        .build();
    let reader = reader(store_of("ragged", bytes), config);
    assert!(collect_markers(&reader)?.is_empty());
    Ok(())
}

// ================================================================================================
// Schema mismatch
// ================================================================================================

/// Decodes like the raw decoder for batch 0, then starts emitting rows of
/// the wrong shape.
struct ShapeShiftingDecoder {
    inner: RawBytesDecoder,
}

impl Decoder for ShapeShiftingDecoder {
    fn segmentation(&self, store: &dyn DataStore) -> SegmentationStrategy {
        self.inner.segmentation(store)
    }

    fn infer_schema(&self, instance: &Instance) -> Result<Schema> {
        self.inner.infer_schema(instance)
    }

    fn decode(&self, batch: &BatchDescriptor, schema: &Arc<Schema>) -> Result<Example, BadBatch> {
        if batch.index == 0 {
            return self.inner.decode(batch, schema);
        }
        let rows = batch.instances.len();
        let tensor = Tensor::from_u8(vec![rows, 4], vec![0; rows * 4])?;
        Ok(Example::new(Arc::clone(schema), vec![tensor]))
    }
}

#[test]
fn schema_disagreement_is_fatal() -> Result<()> {
    // Any of batches 1..4 may record the mismatch first under parallel
    // decode, but the valid batch 0 is always delivered before the fault.
    let config = ReaderConfig::builder()
        .batch_size(2)
        .num_parallel_reads(4)
        .num_prefetched_batches(4)
        .build();
    let reader = DataReader::new(
        vec![marker_store("s", 0..8)],
        Arc::new(ShapeShiftingDecoder {
            inner: RawBytesDecoder::framed(),
        }),
        config,
    )
    .unwrap();

    let first = reader.next()?.expect("batch 0 precedes the fault");
    assert_eq!(common::markers_of(&first), vec![0, 1]);

    let fault = reader.next().unwrap_err();
    assert!(matches!(fault, ReadError::SchemaMismatch { .. }));
    Ok(())
}

#[test]
fn open_failure_is_an_io_fault_naming_the_store() {
    let missing = data_reader::FileStore::new("/nonexistent/path/to/records.rec");
    let reader = DataReader::new(
        vec![Arc::new(missing)],
        Arc::new(RawBytesDecoder::framed()),
        ReaderConfig::default(),
    )
    .unwrap();

    let fault = reader.next().unwrap_err();
    assert!(matches!(
        fault,
        ReadError::Io { ref store_id, .. } if store_id.contains("records.rec")
    ));
}
