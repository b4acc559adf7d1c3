//! src/instance.rs
//!
//! The instance stream: turns the flat record sequence into the filtered,
//! optionally shuffled sequence of instances that gets batched.
//!
//! Filters are applied in a fixed order: drop non-data records (done by the
//! caller), skip, limit, shard, shuffle, subsample. Ordinals are assigned at
//! the very end, so they number exactly the instances the batch former will
//! see.
//!
//! # Shuffling
//! A shuffle window of `W` keeps a buffer of `W` instances. Each incoming
//! instance either displaces a random buffered one (which is emitted) or
//! passes straight through; at end of stream the buffer is drained in random
//! order. `W = 0` buffers the entire stream and drains it shuffled - a
//! perfect shuffle. All randomness comes from a single seeded PRNG owned by
//! the ingest task, so a fixed seed fixes the permutation.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::buffer::ByteSlice;

// Offsets the subsample PRNG stream from the shuffle seed.
const SUBSAMPLE_SEED_DELTA: u64 = 0x9e37_79b9_7f4a_7c15;

/// A single record promoted into the batching stream.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Id of the store the payload originated from.
    pub store_id: Arc<str>,
    /// Position within the final instance sequence; diagnostics only.
    pub ordinal: u64,
    pub payload: ByteSlice,
}

struct Pending {
    store_id: Arc<str>,
    payload: ByteSlice,
}

enum ShuffleState {
    Off,
    /// Window 0: buffer everything, drain shuffled.
    Perfect { buffer: Vec<Pending> },
    Windowed {
        buffer: Vec<Pending>,
        window: usize,
        total_seen: u64,
    },
}

/// Parameters for [`InstanceStream`], extracted from the reader config by
/// the ingest task together with the per-epoch seed.
pub(crate) struct InstanceStreamOptions {
    pub skip: u64,
    pub limit: Option<u64>,
    pub shard_index: u64,
    pub num_shards: u64,
    pub shuffle: bool,
    pub shuffle_window: usize,
    pub subsample_ratio: Option<f32>,
    pub seed: u64,
}

pub(crate) struct InstanceStream {
    skip_remaining: u64,
    limit_remaining: Option<u64>,
    shard_index: u64,
    num_shards: u64,
    shard_cursor: u64,
    shuffle: ShuffleState,
    shuffle_rng: StdRng,
    subsample: Option<(f64, StdRng)>,
    next_ordinal: u64,
}

impl InstanceStream {
    pub(crate) fn new(options: InstanceStreamOptions) -> Self {
        let shuffle = if !options.shuffle {
            ShuffleState::Off
        } else if options.shuffle_window == 0 {
            ShuffleState::Perfect { buffer: Vec::new() }
        } else {
            ShuffleState::Windowed {
                buffer: Vec::with_capacity(options.shuffle_window),
                window: options.shuffle_window,
                total_seen: 0,
            }
        };

        Self {
            skip_remaining: options.skip,
            limit_remaining: options.limit,
            shard_index: options.shard_index,
            num_shards: options.num_shards,
            shard_cursor: 0,
            shuffle,
            shuffle_rng: StdRng::seed_from_u64(options.seed),
            subsample: options.subsample_ratio.map(|ratio| {
                (
                    f64::from(ratio),
                    StdRng::seed_from_u64(options.seed.wrapping_add(SUBSAMPLE_SEED_DELTA)),
                )
            }),
            next_ordinal: 0,
        }
    }

    /// Whether the limit filter has taken everything it will take; once true the
    /// ingest side can stop reading records for this epoch.
    pub(crate) fn exhausted(&self) -> bool {
        self.limit_remaining == Some(0)
    }

    /// Offers one data record to the stream; zero or one instances come out
    /// through `out` (displaced shuffle entries included).
    pub(crate) fn push(&mut self, store_id: Arc<str>, payload: ByteSlice, out: &mut Vec<Instance>) {
        if self.skip_remaining > 0 {
            self.skip_remaining -= 1;
            return;
        }

        if let Some(remaining) = self.limit_remaining.as_mut() {
            if *remaining == 0 {
                return;
            }
            *remaining -= 1;
        }

        if self.num_shards > 1 {
            let keep = self.shard_cursor % self.num_shards == self.shard_index;
            self.shard_cursor += 1;
            if !keep {
                return;
            }
        }

        let pending = Pending { store_id, payload };
        match &mut self.shuffle {
            ShuffleState::Off => {
                Self::deliver(&mut self.subsample, &mut self.next_ordinal, pending, out)
            }
            ShuffleState::Perfect { buffer } => buffer.push(pending),
            ShuffleState::Windowed {
                buffer,
                window,
                total_seen,
            } => {
                *total_seen += 1;
                if buffer.len() < *window {
                    buffer.push(pending);
                } else {
                    let swap_probability = *window as f64 / *total_seen as f64;
                    let emitted = if self.shuffle_rng.random_bool(swap_probability) {
                        let slot = self.shuffle_rng.random_range(0..*window);
                        std::mem::replace(&mut buffer[slot], pending)
                    } else {
                        pending
                    };
                    Self::deliver(&mut self.subsample, &mut self.next_ordinal, emitted, out);
                }
            }
        }
    }

    /// End of record stream: drains any shuffle buffer in random order.
    pub(crate) fn drain(&mut self, out: &mut Vec<Instance>) {
        let mut buffered = match &mut self.shuffle {
            ShuffleState::Off => Vec::new(),
            ShuffleState::Perfect { buffer } => std::mem::take(buffer),
            ShuffleState::Windowed { buffer, .. } => std::mem::take(buffer),
        };

        buffered.shuffle(&mut self.shuffle_rng);
        for pending in buffered {
            Self::deliver(&mut self.subsample, &mut self.next_ordinal, pending, out);
        }
    }

    // Subsample gate plus ordinal assignment; the last stop before batching.
    // Takes the fields it needs so callers holding a shuffle-buffer borrow
    // can still emit.
    fn deliver(
        subsample: &mut Option<(f64, StdRng)>,
        next_ordinal: &mut u64,
        pending: Pending,
        out: &mut Vec<Instance>,
    ) {
        if let Some((ratio, rng)) = subsample.as_mut() {
            if !rng.random_bool(*ratio) {
                return;
            }
        }
        out.push(Instance {
            store_id: pending.store_id,
            ordinal: *next_ordinal,
            payload: pending.payload,
        });
        *next_ordinal += 1;
    }
}
