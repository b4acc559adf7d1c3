//! src/config.rs
//!
//! Configuration for reader behaviour.
//!
//! `ReaderConfig` stores the parameters that control batching, prefetch,
//! filtering, and fault policies.
//!
//! Example:
//! ```ignore
//! let config = ReaderConfig::builder()
//!     .batch_size(32)
//!     .num_prefetched_batches(4)
//!     .shuffle_instances(true)
//!     .shuffle_seed(42)
//!     .build();
//! ```
//!
//! # Performance considerations:
//! - `num_prefetched_batches`: Higher values hide decode latency but hold
//!   more decoded batches in memory.
//! - `num_parallel_reads`: More workers improve decode throughput until the
//!   ingest side becomes the bottleneck.

use std::sync::Arc;

use crate::batch::LastBatchHandling;
use crate::error::ReadError;
use crate::memory::{default_allocator, MemoryAllocator};

/// What to do when a decode worker reports a bad batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadBatchHandling {
    /// Surface the fault; the pipeline is poisoned.
    Error,
    /// Drop the batch; the consumer never observes it.
    Skip,
    /// Drop the batch and emit a diagnostic through the reporting sink.
    Warn,
}

/// Configuration for a [`DataReader`](crate::reader::DataReader).
#[derive(Clone)]
pub struct ReaderConfig {
    /// Number of instances per batch (must be >= 1).
    pub batch_size: usize,
    /// Bound on outstanding batches; `0` resolves to the hardware concurrency.
    pub num_prefetched_batches: usize,
    /// Number of decode workers; `0` resolves to the prefetch bound.
    pub num_parallel_reads: usize,
    /// Treatment of a partial final batch.
    pub last_batch_handling: LastBatchHandling,
    /// Treatment of batches the decoder rejects.
    pub bad_batch_handling: BadBatchHandling,
    /// Number of leading data records to discard.
    pub num_instances_to_skip: u64,
    /// Cap on data records retained after the skip (unbounded if `None`).
    pub num_instances_to_read: Option<u64>,
    /// This reader's shard among `num_shards`; ignored when sharding is off.
    pub shard_index: u32,
    /// Total shard count; `0` or `1` disables sharding.
    pub num_shards: u32,
    /// Whether to shuffle instances before batching.
    pub shuffle_instances: bool,
    /// Shuffle buffer size; `0` buffers the whole stream (perfect shuffle).
    pub shuffle_window: usize,
    /// Seed for the shuffle PRNG; sampled once at construction if `None`.
    pub shuffle_seed: Option<u64>,
    /// Whether `reset` re-seeds the shuffle PRNG for the new epoch.
    /// When false, every epoch replays the same permutation.
    pub reshuffle_each_epoch: bool,
    /// Keep each instance with this probability (`0 < r <= 1`); `None`
    /// disables subsampling.
    pub subsample_ratio: Option<f32>,
    /// Backing storage source for pipeline buffers.
    pub allocator: Arc<dyn MemoryAllocator>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            num_prefetched_batches: 0,
            num_parallel_reads: 0,
            last_batch_handling: LastBatchHandling::None,
            bad_batch_handling: BadBatchHandling::Error,
            num_instances_to_skip: 0,
            num_instances_to_read: None,
            shard_index: 0,
            num_shards: 0,
            shuffle_instances: false,
            shuffle_window: 0,
            shuffle_seed: None,
            reshuffle_each_epoch: true,
            subsample_ratio: None,
            allocator: default_allocator(),
        }
    }
}

impl ReaderConfig {
    pub fn builder() -> ReaderConfigBuilder {
        ReaderConfigBuilder::default()
    }

    /// Validates option combinations. Called once at reader construction;
    /// a failure here means the reader never enters `running`.
    pub(crate) fn validate(&self) -> Result<(), ReadError> {
        if self.batch_size == 0 {
            return Err(ReadError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.num_shards > 1 && self.shard_index >= self.num_shards {
            return Err(ReadError::Config(format!(
                "shard_index ({}) must be less than num_shards ({})",
                self.shard_index, self.num_shards
            )));
        }
        if let Some(ratio) = self.subsample_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ReadError::Config(format!(
                    "subsample_ratio must be within (0, 1], but got {ratio}"
                )));
            }
        }
        Ok(())
    }

    /// The resolved prefetch depth *P*.
    pub(crate) fn effective_prefetch(&self) -> usize {
        if self.num_prefetched_batches > 0 {
            self.num_prefetched_batches
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }

    /// The resolved worker count *N*.
    pub(crate) fn effective_workers(&self) -> usize {
        if self.num_parallel_reads > 0 {
            self.num_parallel_reads
        } else {
            self.effective_prefetch()
        }
    }
}

/// Builder for [`ReaderConfig`] with method chaining.
#[derive(Default)]
pub struct ReaderConfigBuilder {
    config: ReaderConfig,
}

impl ReaderConfigBuilder {
    /// Set the batch size (must be > 0).
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the prefetch bound. `0` resolves to the hardware concurrency.
    pub fn num_prefetched_batches(mut self, count: usize) -> Self {
        self.config.num_prefetched_batches = count;
        self
    }

    /// Set the decode worker count. `0` resolves to the prefetch bound.
    pub fn num_parallel_reads(mut self, count: usize) -> Self {
        self.config.num_parallel_reads = count;
        self
    }

    /// Set how the partial final batch is handled.
    pub fn last_batch_handling(mut self, handling: LastBatchHandling) -> Self {
        self.config.last_batch_handling = handling;
        self
    }

    /// Set how decoder-rejected batches are handled.
    pub fn bad_batch_handling(mut self, handling: BadBatchHandling) -> Self {
        self.config.bad_batch_handling = handling;
        self
    }

    /// Discard the first `count` data records of every epoch.
    pub fn num_instances_to_skip(mut self, count: u64) -> Self {
        self.config.num_instances_to_skip = count;
        self
    }

    /// Retain at most `count` data records after the skip.
    pub fn num_instances_to_read(mut self, count: u64) -> Self {
        self.config.num_instances_to_read = Some(count);
        self
    }

    /// Read only the shard `index` of `count` equal shards.
    pub fn shard(mut self, index: u32, count: u32) -> Self {
        self.config.shard_index = index;
        self.config.num_shards = count;
        self
    }

    /// Enable or disable instance shuffling.
    pub fn shuffle_instances(mut self, shuffle: bool) -> Self {
        self.config.shuffle_instances = shuffle;
        self
    }

    /// Set the shuffle buffer size. `0` buffers the whole stream.
    pub fn shuffle_window(mut self, window: usize) -> Self {
        self.config.shuffle_window = window;
        self
    }

    /// Set the shuffle seed for reproducible epochs.
    pub fn shuffle_seed(mut self, seed: u64) -> Self {
        self.config.shuffle_seed = Some(seed);
        self
    }

    /// Control whether `reset` re-seeds the shuffle PRNG.
    pub fn reshuffle_each_epoch(mut self, reshuffle: bool) -> Self {
        self.config.reshuffle_each_epoch = reshuffle;
        self
    }

    /// Keep each instance with probability `ratio`.
    pub fn subsample_ratio(mut self, ratio: f32) -> Self {
        self.config.subsample_ratio = Some(ratio);
        self
    }

    /// Supply a custom allocator for pipeline buffers.
    pub fn allocator(mut self, allocator: Arc<dyn MemoryAllocator>) -> Self {
        self.config.allocator = allocator;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> ReaderConfig {
        self.config
    }
}
