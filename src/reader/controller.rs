//! src/reader/controller.rs
//!
//! The reader's public surface and lifecycle.
//!
//! A [`DataReader`] moves through four phases:
//!
//! ```text
//!     idle ──start──▶ running ──drain──▶ ended
//!       ▲              │   │               │
//!       │              │   └──fault──▶ poisoned
//!       └──reset───────┴──────reset────────┘
//! ```
//!
//! The first `next` or `peek` starts the epoch: the ingest thread and the
//! decode pool come up lazily. Reaching the end of the reorder queue moves
//! to `ended`; any poisoning fault moves to `poisoned`, where the same
//! fault is returned on every call until `reset`.
//!
//! Every method takes `&self`: the state sits behind a mutex, and blocking
//! waits happen on the reorder queue with the mutex released. That is what
//! makes `reset` safe to call while another thread is parked in `next` -
//! closing the queue wakes the pending caller with a reset fault, after
//! which `reset` joins the epoch's threads and returns the reader to idle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::bounded;
use rand::Rng;

use crate::config::ReaderConfig;
use crate::decoder::Decoder;
use crate::error::ReadError;
use crate::example::Example;
use crate::instance::InstanceStreamOptions;
use crate::schema::Schema;
use crate::store::{DataStore, StreamAbort};

use super::ingest::{run_ingest, IngestContext};
use super::pool::{DecodePool, SchemaSlot};
use super::reorder::ReorderQueue;
use super::Counters;

/// A high-throughput, batch-ordered dataset reader.
///
/// Construction validates the configuration and samples the shuffle seed if
/// none is given; no thread starts until the first `next`/`peek`.
pub struct DataReader {
    stores: Arc<Vec<Arc<dyn DataStore>>>,
    decoder: Arc<dyn Decoder>,
    config: ReaderConfig,
    base_seed: u64,
    schema_slot: Arc<SchemaSlot>,
    counters: Arc<Counters>,
    state: Mutex<ReaderState>,
}

struct ReaderState {
    phase: Phase,
    epoch: u64,
}

enum Phase {
    Idle,
    Running(EpochRuntime),
    Ended,
    Poisoned(ReadError),
}

struct EpochRuntime {
    queue: Arc<ReorderQueue>,
    cancel: Arc<AtomicBool>,
    abort_slot: Arc<Mutex<Option<Arc<dyn StreamAbort>>>>,
    ingest: Option<thread::JoinHandle<()>>,
    pool: Option<DecodePool>,
    peeked: Option<Example>,
}

impl EpochRuntime {
    /// Cancels and joins the epoch's threads. Idempotent.
    fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        // Kick a read that may be blocked inside a store stream.
        if let Some(abort) = self.abort_slot.lock().unwrap().clone() {
            abort.abort();
        }
        self.queue.close();
        if let Some(ingest) = self.ingest.take() {
            let _ = ingest.join();
        }
        // Dropping the pool joins the decode workers; the ingest thread has
        // exited by now, so the task channel is disconnected.
        self.pool.take();
    }
}

impl Drop for EpochRuntime {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl DataReader {
    pub fn new(
        stores: Vec<Arc<dyn DataStore>>,
        decoder: Arc<dyn Decoder>,
        config: ReaderConfig,
    ) -> Result<Self, ReadError> {
        config.validate()?;
        let base_seed = config
            .shuffle_seed
            .unwrap_or_else(|| rand::rng().random());
        Ok(Self {
            stores: Arc::new(stores),
            decoder,
            config,
            base_seed,
            schema_slot: Arc::new(SchemaSlot::default()),
            counters: Arc::new(Counters::new()),
            state: Mutex::new(ReaderState {
                phase: Phase::Idle,
                epoch: 0,
            }),
        })
    }

    /// Returns the next example in batch-index order, `Ok(None)` at end of
    /// epoch, or the fault that poisoned the pipeline. Blocks until the
    /// head batch resolves.
    pub fn next(&self) -> Result<Option<Example>, ReadError> {
        self.fetch()
    }

    /// Returns the head example without consuming it; a repeated `peek`
    /// observes the same example, and the following `next` consumes it.
    pub fn peek(&self) -> Result<Option<Example>, ReadError> {
        {
            let mut state = self.state.lock().unwrap();
            if let Phase::Running(runtime) = &mut state.phase {
                if let Some(example) = runtime.peeked.as_ref() {
                    return Ok(Some(example.clone()));
                }
            }
        }

        match self.fetch()? {
            None => Ok(None),
            Some(example) => {
                let mut state = self.state.lock().unwrap();
                if let Phase::Running(runtime) = &mut state.phase {
                    runtime.peeked = Some(example.clone());
                }
                Ok(Some(example))
            }
        }
    }

    /// Cancels the running epoch (if any), joins its threads, rewinds the
    /// data stores by forgetting their streams, clears the counters, and
    /// returns the reader to idle. A `next` pending on another thread
    /// observes a reset fault.
    pub fn reset(&self) {
        let prior = {
            let mut state = self.state.lock().unwrap();
            state.epoch += 1;
            std::mem::replace(&mut state.phase, Phase::Idle)
        };
        if let Phase::Running(mut runtime) = prior {
            runtime.shutdown();
        }
        self.counters.clear();
        tracing::debug!("reader reset to idle");
    }

    /// Cumulative bytes pulled through the cursor this epoch. May exceed
    /// what the consumer has seen because of prefetch.
    pub fn num_bytes_read(&self) -> u64 {
        self.counters.bytes_read.load(Ordering::Relaxed)
    }

    /// The inferred schema; `None` until the first decode completes.
    pub fn schema(&self) -> Option<Arc<Schema>> {
        self.schema_slot.get()
    }

    // Shared by `next` and `peek`.
    fn fetch(&self) -> Result<Option<Example>, ReadError> {
        let queue = {
            let mut state = self.state.lock().unwrap();
            match &mut state.phase {
                Phase::Idle => {
                    let runtime = self.start(state.epoch)?;
                    let queue = Arc::clone(&runtime.queue);
                    state.phase = Phase::Running(runtime);
                    queue
                }
                Phase::Running(runtime) => {
                    if let Some(example) = runtime.peeked.take() {
                        return Ok(Some(example));
                    }
                    Arc::clone(&runtime.queue)
                }
                Phase::Ended => return Ok(None),
                Phase::Poisoned(fault) => return Err(fault.clone()),
            }
        };

        // Block on the reorder queue with the state lock released so a
        // concurrent `reset` can always make progress.
        let outcome = queue.next_in_order();

        let mut state = self.state.lock().unwrap();
        let same_epoch =
            matches!(&state.phase, Phase::Running(runtime) if Arc::ptr_eq(&runtime.queue, &queue));

        match outcome {
            Ok(Some(example)) => Ok(Some(example)),
            Ok(None) => {
                if same_epoch {
                    let prior = std::mem::replace(&mut state.phase, Phase::Ended);
                    drop(state);
                    if let Phase::Running(mut runtime) = prior {
                        runtime.shutdown();
                    }
                    tracing::debug!("epoch drained cleanly");
                }
                Ok(None)
            }
            Err(fault) if fault.is_poisoning() => {
                if same_epoch {
                    let prior =
                        std::mem::replace(&mut state.phase, Phase::Poisoned(fault.clone()));
                    drop(state);
                    if let Phase::Running(mut runtime) = prior {
                        runtime.shutdown();
                    }
                }
                Err(fault)
            }
            // A reset won the race; the new state belongs to the resetter.
            Err(fault) => Err(fault),
        }
    }

    fn start(&self, epoch: u64) -> Result<EpochRuntime, ReadError> {
        let seed = if self.config.reshuffle_each_epoch {
            self.base_seed.wrapping_add(epoch)
        } else {
            self.base_seed
        };
        let prefetch = self.config.effective_prefetch();
        let workers = self.config.effective_workers();

        self.counters.clear();

        let queue = Arc::new(ReorderQueue::new(prefetch));
        let cancel = Arc::new(AtomicBool::new(false));
        let abort_slot: Arc<Mutex<Option<Arc<dyn StreamAbort>>>> = Arc::new(Mutex::new(None));
        let (task_tx, task_rx) = bounded(prefetch);

        let pool = DecodePool::spawn(
            workers,
            task_rx,
            Arc::clone(&queue),
            Arc::clone(&self.decoder),
            Arc::clone(&self.schema_slot),
            self.config.bad_batch_handling,
        )?;

        let ctx = IngestContext {
            stores: Arc::clone(&self.stores),
            decoder: Arc::clone(&self.decoder),
            stream_options: InstanceStreamOptions {
                skip: self.config.num_instances_to_skip,
                limit: self.config.num_instances_to_read,
                shard_index: u64::from(self.config.shard_index),
                num_shards: u64::from(self.config.num_shards),
                shuffle: self.config.shuffle_instances,
                shuffle_window: self.config.shuffle_window,
                subsample_ratio: self.config.subsample_ratio,
                seed,
            },
            batch_size: self.config.batch_size,
            last_batch: self.config.last_batch_handling,
            allocator: Arc::clone(&self.config.allocator),
            tx: task_tx,
            queue: Arc::clone(&queue),
            cancel: Arc::clone(&cancel),
            counters: Arc::clone(&self.counters),
            abort_slot: Arc::clone(&abort_slot),
        };

        let ingest = thread::Builder::new()
            .name("reader-ingest".to_string())
            .spawn(move || run_ingest(ctx))
            .map_err(|err| ReadError::Spawn(format!("ingest task: {err}")))?;

        tracing::debug!(epoch, prefetch, workers, "reader epoch started");

        Ok(EpochRuntime {
            queue,
            cancel,
            abort_slot,
            ingest: Some(ingest),
            pool: Some(pool),
            peeked: None,
        })
    }
}
