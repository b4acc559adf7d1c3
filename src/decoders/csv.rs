//! src/decoders/csv.rs
//!
//! Numeric CSV row decoder.
//!
//! Each data record carries one comma-separated row of `f32` fields; the
//! field count is fixed by the first instance and every field becomes one
//! column tensor of shape `[batch]`. Ragged or non-numeric rows make the
//! batch a bad batch.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::batch::BatchDescriptor;
use crate::decoder::{BadBatch, Decoder, SegmentationStrategy};
use crate::example::Example;
use crate::instance::Instance;
use crate::schema::{Attribute, Schema};
use crate::store::DataStore;
use crate::tensor::{ElementType, Tensor};

/// Decodes comma-separated numeric rows into per-column `f32` tensors.
#[derive(Debug, Clone, Default)]
pub struct CsvDecoder;

impl CsvDecoder {
    pub fn new() -> Self {
        Self
    }

    fn parse_row(instance: &Instance, expected_fields: Option<usize>) -> Result<Vec<f32>, BadBatch> {
        let text = std::str::from_utf8(instance.payload.as_bytes()).map_err(|_| {
            BadBatch::new(format!(
                "instance {} from store '{}' is not valid UTF-8",
                instance.ordinal, instance.store_id
            ))
        })?;

        let mut fields = Vec::with_capacity(expected_fields.unwrap_or(4));
        for (column, field) in text.trim_end_matches(['\r', '\n']).split(',').enumerate() {
            let value: f32 = field.trim().parse().map_err(|_| {
                BadBatch::new(format!(
                    "instance {} from store '{}': field {} ('{}') is not numeric",
                    instance.ordinal, instance.store_id, column, field
                ))
            })?;
            fields.push(value);
        }

        if let Some(expected) = expected_fields {
            if fields.len() != expected {
                return Err(BadBatch::new(format!(
                    "instance {} from store '{}' has {} field(s), expected {}",
                    instance.ordinal,
                    instance.store_id,
                    fields.len(),
                    expected
                )));
            }
        }
        Ok(fields)
    }
}

impl Decoder for CsvDecoder {
    fn segmentation(&self, _store: &dyn DataStore) -> SegmentationStrategy {
        SegmentationStrategy::Framed
    }

    fn infer_schema(&self, instance: &Instance) -> Result<Schema> {
        let fields = Self::parse_row(instance, None)
            .map_err(|fault| anyhow::anyhow!(fault.message))
            .context("cannot infer a CSV schema from the first instance")?;

        let attributes = (0..fields.len())
            .map(|column| Attribute::new(format!("col{column}"), ElementType::F32, Vec::new()))
            .collect();
        Ok(Schema::new(attributes))
    }

    fn decode(&self, batch: &BatchDescriptor, schema: &Arc<Schema>) -> Result<Example, BadBatch> {
        let num_columns = schema.attributes().len();
        let rows = batch.instances.len();
        let mut columns = vec![Vec::with_capacity(rows); num_columns];

        for instance in &batch.instances {
            let fields = Self::parse_row(instance, Some(num_columns))?;
            for (column, value) in fields.into_iter().enumerate() {
                columns[column].push(value);
            }
        }

        let tensors = columns
            .into_iter()
            .map(|column| Tensor::from_f32(vec![rows], column))
            .collect::<Result<Vec<_>>>()?;
        Ok(Example::new(Arc::clone(schema), tensors))
    }
}
