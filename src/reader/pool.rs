//! src/reader/pool.rs
//!
//! The decode pool: worker threads that turn batch descriptors into typed
//! examples.
//!
//! Workers pull from the bounded descriptor channel that the ingest task
//! feeds, decode through the injected [`Decoder`], and publish results to
//! the reorder queue keyed by batch index. The first worker to decode a
//! non-empty batch infers and caches the reader schema under a lock; every
//! example is validated against it afterwards.
//!
//! Shutdown: the pool's shutdown flag is checked between decodes, the
//! channel disconnecting (ingest exit) ends the pull loop, and `Drop` joins
//! every worker. In-flight decodes run to completion; their publishes are
//! dropped by a closed queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::Receiver;

use crate::batch::BatchDescriptor;
use crate::config::BadBatchHandling;
use crate::decoder::Decoder;
use crate::error::ReadError;
use crate::instance::Instance;
use crate::schema::Schema;

use super::reorder::{ReorderQueue, SlotValue};

/// Write-once cell for the inferred schema. Lives on the controller so the
/// schema survives `reset`.
#[derive(Default)]
pub(crate) struct SchemaSlot {
    inner: Mutex<Option<Arc<Schema>>>,
}

impl SchemaSlot {
    pub(crate) fn get(&self) -> Option<Arc<Schema>> {
        self.inner.lock().unwrap().clone()
    }

    /// Returns the cached schema, or installs the one `infer` produces.
    /// The lock spans the inference so exactly one worker runs it.
    fn get_or_infer(
        &self,
        infer: impl FnOnce() -> anyhow::Result<Schema>,
    ) -> anyhow::Result<Arc<Schema>> {
        let mut slot = self.inner.lock().unwrap();
        if let Some(schema) = slot.as_ref() {
            return Ok(Arc::clone(schema));
        }
        let schema = Arc::new(infer()?);
        *slot = Some(Arc::clone(&schema));
        Ok(schema)
    }
}

pub(crate) struct DecodePool {
    workers: Vec<thread::JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl DecodePool {
    pub(crate) fn spawn(
        num_workers: usize,
        task_rx: Receiver<BatchDescriptor>,
        queue: Arc<ReorderQueue>,
        decoder: Arc<dyn Decoder>,
        schema_slot: Arc<SchemaSlot>,
        bad_batch: BadBatchHandling,
    ) -> Result<Self, ReadError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let task_rx = task_rx.clone();
            let queue = Arc::clone(&queue);
            let decoder = Arc::clone(&decoder);
            let schema_slot = Arc::clone(&schema_slot);
            let shutdown = Arc::clone(&shutdown);

            let handle = thread::Builder::new()
                .name(format!("reader-decode-{worker_id}"))
                .spawn(move || {
                    worker_loop(&task_rx, &queue, &*decoder, &schema_slot, bad_batch, &shutdown)
                })
                .map_err(|err| {
                    ReadError::Spawn(format!("decode worker {worker_id}: {err}"))
                })?;
            workers.push(handle);
        }

        Ok(Self { workers, shutdown })
    }
}

impl Drop for DecodePool {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(
    task_rx: &Receiver<BatchDescriptor>,
    queue: &ReorderQueue,
    decoder: &dyn Decoder,
    schema_slot: &SchemaSlot,
    bad_batch: BadBatchHandling,
    shutdown: &AtomicBool,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        match task_rx.recv() {
            Ok(batch) => decode_one(queue, decoder, schema_slot, bad_batch, batch),
            Err(_) => break, // Ingest dropped the sender; epoch drained.
        }
    }
}

fn decode_one(
    queue: &ReorderQueue,
    decoder: &dyn Decoder,
    schema_slot: &SchemaSlot,
    bad_batch: BadBatchHandling,
    batch: BatchDescriptor,
) {
    let schema = match schema_slot.get_or_infer(|| {
        decoder.infer_schema(schema_witness(&batch.instances))
    }) {
        Ok(schema) => schema,
        Err(err) => {
            queue.set_fault(ReadError::SchemaMismatch {
                batch_index: batch.index,
                details: format!("schema inference failed: {err:#}"),
            });
            return;
        }
    };

    match decoder.decode(&batch, &schema) {
        Ok(mut example) => {
            if example.num_rows() != batch.instances.len() {
                queue.set_fault(ReadError::SchemaMismatch {
                    batch_index: batch.index,
                    details: format!(
                        "decoder produced {} row(s) for {} instance(s)",
                        example.num_rows(),
                        batch.instances.len()
                    ),
                });
                return;
            }
            example.pad_rows(batch.padding);
            if let Err(details) = schema.check_example(&example) {
                queue.set_fault(ReadError::SchemaMismatch {
                    batch_index: batch.index,
                    details,
                });
                return;
            }
            queue.publish(batch.index, SlotValue::Example(Box::new(example)));
        }
        Err(fault) => match bad_batch {
            BadBatchHandling::Error => {
                queue.set_fault(ReadError::BadBatch {
                    batch_index: batch.index,
                    message: fault.message,
                });
            }
            BadBatchHandling::Skip => {
                queue.publish(batch.index, SlotValue::Tombstone);
            }
            BadBatchHandling::Warn => {
                tracing::warn!(
                    batch_index = batch.index,
                    reason = %fault.message,
                    "dropping undecodable batch"
                );
                queue.publish(batch.index, SlotValue::Tombstone);
            }
        },
    }
}

// The instance the schema is inferred from: the first non-empty one, falling
// back to the first instance when the whole batch is empty payloads.
fn schema_witness(instances: &[Instance]) -> &Instance {
    instances
        .iter()
        .find(|instance| !instance.payload.is_empty())
        .unwrap_or(&instances[0])
}
