//! src/batch.rs
//!
//! The batch former: groups instances into fixed-size batches tagged with a
//! monotonically increasing index.

use crate::instance::Instance;

/// Treatment of a partial final batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastBatchHandling {
    /// Emit the short batch as-is, marked final.
    None,
    /// Discard the partial tail.
    Drop,
    /// Deliver a full-size final batch whose trailing rows are synthetic
    /// zeros; the decoded example reports them through its padding count.
    Pad,
}

/// A formed batch on its way to the decode pool.
#[derive(Debug)]
pub struct BatchDescriptor {
    /// Consecutive per epoch, starting at 0.
    pub index: u64,
    /// The real instances of the batch, in stream order.
    pub instances: Vec<Instance>,
    /// Set on the tail batch of the epoch when one is emitted.
    pub is_final: bool,
    /// Number of synthetic zero rows the decoded example must carry after
    /// the real instances (non-zero only under [`LastBatchHandling::Pad`]).
    pub padding: usize,
}

pub(crate) struct BatchFormer {
    batch_size: usize,
    last_batch: LastBatchHandling,
    next_index: u64,
    pending: Vec<Instance>,
}

impl BatchFormer {
    pub(crate) fn new(batch_size: usize, last_batch: LastBatchHandling) -> Self {
        Self {
            batch_size,
            last_batch,
            next_index: 0,
            pending: Vec::with_capacity(batch_size),
        }
    }

    /// Adds one instance; returns a descriptor whenever a full batch forms.
    pub(crate) fn push(&mut self, instance: Instance) -> Option<BatchDescriptor> {
        self.pending.push(instance);
        if self.pending.len() < self.batch_size {
            return None;
        }
        let instances = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let index = self.next_index;
        self.next_index += 1;
        Some(BatchDescriptor {
            index,
            instances,
            is_final: false,
            padding: 0,
        })
    }

    /// Input exhausted: resolves the partial tail per the last-batch policy.
    pub(crate) fn finish(&mut self) -> Option<BatchDescriptor> {
        let tail = self.pending.len();
        if tail == 0 {
            return None;
        }
        let instances = std::mem::take(&mut self.pending);
        match self.last_batch {
            LastBatchHandling::Drop => None,
            LastBatchHandling::None => {
                let index = self.next_index;
                self.next_index += 1;
                Some(BatchDescriptor {
                    index,
                    instances,
                    is_final: true,
                    padding: 0,
                })
            }
            LastBatchHandling::Pad => {
                let index = self.next_index;
                self.next_index += 1;
                Some(BatchDescriptor {
                    index,
                    instances,
                    is_final: true,
                    padding: self.batch_size - tail,
                })
            }
        }
    }

    /// Total batches issued so far.
    pub(crate) fn issued(&self) -> u64 {
        self.next_index
    }
}
