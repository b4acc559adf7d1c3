//! src/decoder.rs
//!
//! The decoding seam: everything format-specific the pipeline consumes.
//!
//! Concrete readers differ only in how a store is segmented into records,
//! how a schema is inferred from the first instance, and how a batch of raw
//! instances becomes a typed example. That capability triple is modeled as
//! one trait injected into the pipeline, not an inheritance hierarchy; the
//! pipeline machinery never knows which byte format it is moving.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

use crate::batch::BatchDescriptor;
use crate::example::Example;
use crate::instance::Instance;
use crate::schema::Schema;
use crate::store::DataStore;

/// Per-store record segmentation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationStrategy {
    /// The whole store is a single `data` record.
    WholeStore,
    /// The store is a concatenation of RecordIO frames.
    Framed,
}

/// Rejection of one batch by a decoder.
///
/// Whether the pipeline surfaces, skips, or warns about it is decided by the
/// configured bad-batch policy, not by the decoder.
#[derive(Debug)]
pub struct BadBatch {
    pub message: String,
}

impl BadBatch {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for BadBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<anyhow::Error> for BadBatch {
    fn from(err: anyhow::Error) -> Self {
        Self {
            message: format!("{err:#}"),
        }
    }
}

/// Format-specific capabilities consumed by the pipeline.
///
/// `decode` must be deterministic for equal inputs, thread-safe, and
/// CPU-bounded: it runs concurrently on every worker and must never block
/// on the pipeline.
pub trait Decoder: Send + Sync {
    /// Chooses the segmentation strategy for a store.
    fn segmentation(&self, store: &dyn DataStore) -> SegmentationStrategy;

    /// Builds the schema from the first non-empty instance the pipeline
    /// observes. Called at most once per reader; a failure is fatal.
    fn infer_schema(&self, instance: &Instance) -> Result<Schema>;

    /// Decodes one batch of raw instances into a typed example conforming
    /// to `schema`.
    fn decode(&self, batch: &BatchDescriptor, schema: &Arc<Schema>) -> Result<Example, BadBatch>;
}
