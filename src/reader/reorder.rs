//! src/reader/reorder.rs
//!
//! The ordered prefetch queue: a reorder buffer keyed by batch index.
//!
//! Workers publish completed results in whatever order they finish; the
//! consumer always receives the smallest outstanding batch index. Skipped
//! batches are published as tombstones that the queue silently advances
//! past. The queue also enforces the prefetch bound: the ingest task
//! reserves a slot per batch before emitting it and blocks while
//! `issued - resolved` would exceed the capacity, so at any instant at most
//! *P* batches are queued or in flight anywhere in the pipeline.
//!
//! One mutex plus one condition variable synchronise everything: publishes
//! are non-blocking, and `close` wakes every waiter so cancellation can
//! never strand a blocked caller.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex};

use crate::error::ReadError;
use crate::example::Example;

/// A worker's verdict on one batch index.
pub(crate) enum SlotValue {
    Example(Box<Example>),
    /// The batch was dropped by the bad-batch policy; invisible to the
    /// consumer apart from the gap in delivered indices.
    Tombstone,
}

struct QueueState {
    slots: BTreeMap<u64, SlotValue>,
    /// Next batch index owed to the consumer.
    next_index: u64,
    /// Batch slots handed to the ingest side so far.
    issued: u64,
    /// Batches the consumer has moved past (delivered or tombstoned).
    resolved: u64,
    ingest_done: bool,
    fault: Option<ReadError>,
    closed: bool,
}

pub(crate) struct ReorderQueue {
    state: Mutex<QueueState>,
    available: Condvar,
    capacity: usize,
}

impl ReorderQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                slots: BTreeMap::new(),
                next_index: 0,
                issued: 0,
                resolved: 0,
                ingest_done: false,
                fault: None,
                closed: false,
            }),
            available: Condvar::new(),
            capacity,
        }
    }

    /// Blocks until a prefetch slot is free, then claims it for the next
    /// batch. Returns `false` if the queue was closed while waiting.
    pub(crate) fn reserve_slot(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.closed {
                return false;
            }
            if (state.issued - state.resolved) < self.capacity as u64 {
                state.issued += 1;
                return true;
            }
            state = self.available.wait(state).unwrap();
        }
    }

    /// Publishes a worker result. Never blocks; silently dropped after
    /// `close` so late workers of a cancelled epoch cannot disturb the next
    /// one.
    pub(crate) fn publish(&self, index: u64, value: SlotValue) {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return;
        }
        state.slots.insert(index, value);
        self.available.notify_all();
    }

    /// Poisons the queue; the first fault wins.
    pub(crate) fn set_fault(&self, fault: ReadError) {
        let mut state = self.state.lock().unwrap();
        if state.fault.is_none() && !state.closed {
            state.fault = Some(fault);
        }
        self.available.notify_all();
    }

    /// Ingest has drained; end of epoch once every issued index resolves.
    pub(crate) fn mark_ingest_done(&self) {
        let mut state = self.state.lock().unwrap();
        state.ingest_done = true;
        self.available.notify_all();
    }

    /// Cancellation: wakes every waiter. Pending consumers observe a reset
    /// fault, pending reservations fail.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.available.notify_all();
    }

    /// Blocks until the head batch resolves, the epoch ends (`Ok(None)`), a
    /// fault surfaces, or the queue is closed (`Err(Reset)`).
    ///
    /// Every batch resolved ahead of the first unresolved index is delivered
    /// before a recorded fault is surfaced: a worker running ahead may
    /// poison the queue for a later batch while earlier ones still sit here
    /// completed, and those must reach the consumer in order first.
    pub(crate) fn next_in_order(&self) -> Result<Option<Example>, ReadError> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.closed {
                return Err(ReadError::Reset);
            }

            // Advance past tombstoned indices without exposing them.
            while matches!(state.slots.get(&state.next_index), Some(SlotValue::Tombstone)) {
                let next_index = state.next_index;
                state.slots.remove(&next_index);
                state.next_index += 1;
                state.resolved += 1;
                self.available.notify_all();
            }

            if state.slots.contains_key(&state.next_index) {
                let next_index = state.next_index;
                let Some(SlotValue::Example(example)) = state.slots.remove(&next_index)
                else {
                    unreachable!("tombstones were consumed above");
                };
                state.next_index += 1;
                state.resolved += 1;
                self.available.notify_all();
                return Ok(Some(*example));
            }

            // The head index is unresolved; only now may a fault pre-empt.
            if let Some(fault) = &state.fault {
                return Err(fault.clone());
            }

            if state.ingest_done && state.next_index >= state.issued {
                return Ok(None);
            }

            state = self.available.wait(state).unwrap();
        }
    }

    #[cfg(test)]
    fn outstanding(&self) -> u64 {
        let state = self.state.lock().unwrap();
        state.issued - state.resolved
    }
}
