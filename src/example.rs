//! src/example.rs
//!
//! Decoded examples: the unit delivered to the consumer.

use std::sync::Arc;

use crate::schema::Schema;
use crate::tensor::Tensor;

/// A decoded batch: one tensor per schema attribute, in schema order, plus
/// the number of trailing rows that are synthetic zeros under the *pad*
/// last-batch policy.
#[derive(Debug, Clone)]
pub struct Example {
    schema: Arc<Schema>,
    tensors: Vec<Tensor>,
    padding: usize,
}

impl Example {
    pub fn new(schema: Arc<Schema>, tensors: Vec<Tensor>) -> Self {
        Self {
            schema,
            tensors,
            padding: 0,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    /// The tensor of a named attribute, if the schema defines it.
    pub fn tensor(&self, name: &str) -> Option<&Tensor> {
        self.schema
            .index_of(name)
            .and_then(|index| self.tensors.get(index))
    }

    /// Number of rows in the batch, padding rows included.
    pub fn num_rows(&self) -> usize {
        self.tensors.first().map_or(0, Tensor::num_rows)
    }

    /// Trailing rows that are synthetic zeros (0 for all but a padded final
    /// batch).
    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Appends `count` zero rows to every tensor and records them as
    /// padding. Used by the decode pool for the *pad* last-batch policy.
    pub(crate) fn pad_rows(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        for tensor in &mut self.tensors {
            tensor.extend_zero_rows(count);
        }
        self.padding += count;
    }
}
