//! src/reader/ingest.rs
//!
//! The producer task: cursor → segmenter → instance stream → batch former.
//!
//! One thread drives the whole ingest side of an epoch. It owns every PRNG,
//! reserves a prefetch slot per batch before sending it to the workers (the
//! backpressure bound), checks the cancellation flag after every chunk, and
//! reports faults by poisoning the reorder queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;

use crate::batch::{BatchDescriptor, BatchFormer, LastBatchHandling};
use crate::cursor::{CursorEvent, DatasetCursor};
use crate::decoder::{Decoder, SegmentationStrategy};
use crate::error::ReadError;
use crate::instance::{Instance, InstanceStream, InstanceStreamOptions};
use crate::memory::MemoryAllocator;
use crate::record::Record;
use crate::segmenter::{FramedSegmenter, FramingFault, RecordSegmenter, WholeStoreSegmenter};
use crate::store::{DataStore, StreamAbort};

use super::reorder::ReorderQueue;
use super::Counters;

pub(crate) struct IngestContext {
    pub stores: Arc<Vec<Arc<dyn DataStore>>>,
    pub decoder: Arc<dyn Decoder>,
    pub stream_options: InstanceStreamOptions,
    pub batch_size: usize,
    pub last_batch: LastBatchHandling,
    pub allocator: Arc<dyn MemoryAllocator>,
    pub tx: Sender<BatchDescriptor>,
    pub queue: Arc<ReorderQueue>,
    pub cancel: Arc<AtomicBool>,
    pub counters: Arc<Counters>,
    pub abort_slot: Arc<Mutex<Option<Arc<dyn StreamAbort>>>>,
}

pub(crate) fn run_ingest(ctx: IngestContext) {
    let IngestContext {
        stores,
        decoder,
        stream_options,
        batch_size,
        last_batch,
        allocator,
        tx,
        queue,
        cancel,
        counters,
        abort_slot,
    } = ctx;

    let mut cursor = DatasetCursor::new(
        Arc::clone(&stores),
        allocator,
        Arc::clone(&counters.bytes_read),
        abort_slot,
    );
    let mut stream = InstanceStream::new(stream_options);
    let mut former = BatchFormer::new(batch_size, last_batch);

    let mut segmenter: Option<Box<dyn RecordSegmenter>> = None;
    let mut store_label: Arc<str> = Arc::from("");
    let mut records: Vec<Record> = Vec::new();
    let mut instances: Vec<Instance> = Vec::new();

    'ingest: loop {
        if cancel.load(Ordering::Relaxed) {
            return;
        }

        match cursor.next_event() {
            Err(fault) => {
                queue.set_fault(fault);
                queue.mark_ingest_done();
                return;
            }
            Ok(CursorEvent::Chunk { store_index, data }) => {
                if segmenter.is_none() {
                    store_label = Arc::from(cursor.store_id(store_index));
                    segmenter = Some(match decoder.segmentation(&*stores[store_index]) {
                        SegmentationStrategy::WholeStore => Box::new(WholeStoreSegmenter::new()),
                        SegmentationStrategy::Framed => Box::new(FramedSegmenter::new()),
                    });
                }
                let result = segmenter
                    .as_mut()
                    .unwrap()
                    .push_chunk(data, &mut records);
                if let Err(fault) = result {
                    queue.set_fault(framing_fault(&store_label, fault));
                    queue.mark_ingest_done();
                    return;
                }
            }
            Ok(CursorEvent::StoreBoundary { .. }) => {
                if let Some(mut active) = segmenter.take() {
                    if let Err(fault) = active.finish(&mut records) {
                        queue.set_fault(framing_fault(&store_label, fault));
                        queue.mark_ingest_done();
                        return;
                    }
                }
            }
            Ok(CursorEvent::End) => break 'ingest,
        }

        for record in records.drain(..) {
            if record.is_data() {
                counters.data_records.fetch_add(1, Ordering::Relaxed);
                stream.push(Arc::clone(&store_label), record.payload, &mut instances);
            } else {
                counters.skipped_records.fetch_add(1, Ordering::Relaxed);
            }
        }

        for instance in instances.drain(..) {
            if let Some(batch) = former.push(instance) {
                if !emit(&queue, &tx, batch) {
                    return;
                }
            }
        }

        // Once the limit filter is spent, the remaining stores hold nothing
        // the epoch can use.
        if stream.exhausted() {
            break 'ingest;
        }
    }

    // End of input: flush the shuffle buffer and the partial tail batch.
    let mut drained = Vec::new();
    stream.drain(&mut drained);
    for instance in drained {
        if let Some(batch) = former.push(instance) {
            if !emit(&queue, &tx, batch) {
                return;
            }
        }
    }
    if let Some(tail) = former.finish() {
        if !emit(&queue, &tx, tail) {
            return;
        }
    }

    tracing::debug!(
        batches = former.issued(),
        data_records = counters.data_records.load(Ordering::Relaxed),
        skipped_records = counters.skipped_records.load(Ordering::Relaxed),
        "ingest drained"
    );
    queue.mark_ingest_done();
}

/// Reserves a prefetch slot, then hands the batch to the workers. A `false`
/// return means the epoch was cancelled.
fn emit(queue: &ReorderQueue, tx: &Sender<BatchDescriptor>, batch: BatchDescriptor) -> bool {
    if !queue.reserve_slot() {
        return false;
    }
    tx.send(batch).is_ok()
}

fn framing_fault(store_id: &Arc<str>, fault: FramingFault) -> ReadError {
    ReadError::Framing {
        store_id: store_id.to_string(),
        offset: fault.offset,
        message: fault.message,
    }
}
