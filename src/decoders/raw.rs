//! src/decoders/raw.rs
//!
//! Fixed-width raw-bytes decoder.
//!
//! Every data record is one row of `u8` values; the row width is fixed by
//! the first instance observed. A record of any other width makes its whole
//! batch a bad batch, which makes this decoder convenient for exercising
//! bad-batch policies as well as for genuinely fixed-width binary formats.

use std::sync::Arc;

use anyhow::Result;

use crate::batch::BatchDescriptor;
use crate::decoder::{BadBatch, Decoder, SegmentationStrategy};
use crate::example::Example;
use crate::instance::Instance;
use crate::schema::{Attribute, Schema};
use crate::store::DataStore;
use crate::tensor::{ElementType, Tensor};

/// Decodes fixed-width byte rows into a single `u8` tensor per batch.
#[derive(Debug, Clone)]
pub struct RawBytesDecoder {
    strategy: SegmentationStrategy,
    attribute_name: String,
}

impl RawBytesDecoder {
    /// A decoder for RecordIO-framed stores.
    pub fn framed() -> Self {
        Self {
            strategy: SegmentationStrategy::Framed,
            attribute_name: "bytes".to_string(),
        }
    }

    /// A decoder treating each store as one record.
    pub fn whole_store() -> Self {
        Self {
            strategy: SegmentationStrategy::WholeStore,
            attribute_name: "bytes".to_string(),
        }
    }

    /// Overrides the name of the produced attribute.
    pub fn attribute_name(mut self, name: impl Into<String>) -> Self {
        self.attribute_name = name.into();
        self
    }
}

impl Decoder for RawBytesDecoder {
    fn segmentation(&self, _store: &dyn DataStore) -> SegmentationStrategy {
        self.strategy
    }

    fn infer_schema(&self, instance: &Instance) -> Result<Schema> {
        Ok(Schema::new(vec![Attribute::new(
            self.attribute_name.clone(),
            ElementType::U8,
            vec![instance.payload.len()],
        )]))
    }

    fn decode(&self, batch: &BatchDescriptor, schema: &Arc<Schema>) -> Result<Example, BadBatch> {
        let width = schema
            .attribute(&self.attribute_name)
            .map(|attr| attr.shape[0])
            .ok_or_else(|| BadBatch::new("schema does not define the raw-bytes attribute"))?;

        let mut data = Vec::with_capacity(batch.instances.len() * width);
        for instance in &batch.instances {
            if instance.payload.len() != width {
                return Err(BadBatch::new(format!(
                    "instance {} from store '{}' is {} byte(s), expected {}",
                    instance.ordinal,
                    instance.store_id,
                    instance.payload.len(),
                    width
                )));
            }
            data.extend_from_slice(instance.payload.as_bytes());
        }

        let tensor = Tensor::from_u8(vec![batch.instances.len(), width], data)?;
        Ok(Example::new(Arc::clone(schema), vec![tensor]))
    }
}

#[cfg(test)]
mod raw_decoder_tests {
    use super::*;
    use crate::buffer::ByteSlice;

    fn instance(ordinal: u64, bytes: &[u8]) -> Instance {
        Instance {
            store_id: Arc::from("store-0"),
            ordinal,
            payload: ByteSlice::from(bytes),
        }
    }

    fn batch(instances: Vec<Instance>) -> BatchDescriptor {
        BatchDescriptor {
            index: 0,
            instances,
            is_final: false,
            padding: 0,
        }
    }

    #[test]
    fn decodes_rows_into_a_single_tensor() {
        let decoder = RawBytesDecoder::framed();
        let first = instance(0, &[1, 2, 3]);
        let schema = Arc::new(decoder.infer_schema(&first).unwrap());

        let example = decoder
            .decode(&batch(vec![first, instance(1, &[4, 5, 6])]), &schema)
            .unwrap();

        let tensor = example.tensor("bytes").unwrap();
        assert_eq!(tensor.shape(), &[2, 3]);
        assert_eq!(tensor.as_u8(), Some(&[1, 2, 3, 4, 5, 6][..]));
    }

    #[test]
    fn width_mismatch_is_a_bad_batch() {
        let decoder = RawBytesDecoder::framed();
        let first = instance(0, &[1, 2, 3]);
        let schema = Arc::new(decoder.infer_schema(&first).unwrap());

        let result = decoder.decode(&batch(vec![first, instance(1, &[9])]), &schema);
        let fault = result.unwrap_err();
        assert!(fault.message.contains("expected 3"));
    }
}
