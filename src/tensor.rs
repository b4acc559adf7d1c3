//! src/tensor.rs
//!
//! Dense, owned tensors backing decoded examples.
//!
//! The reader owns its tensor representation: a decoded example is a set of
//! named dense tensors with a fixed element type and shape, where dimension 0
//! is the batch dimension. Nothing here is a compute tensor - the only
//! operations the pipeline needs are construction, shape inspection, typed
//! element access, and zero-row extension for padded final batches.

use std::fmt;

use anyhow::{ensure, Result};

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    U8,
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::U8 => "u8",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::F32 => "f32",
            ElementType::F64 => "f64",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
enum TensorData {
    U8(Vec<u8>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            TensorData::U8(v) => v.len(),
            TensorData::I32(v) => v.len(),
            TensorData::I64(v) => v.len(),
            TensorData::F32(v) => v.len(),
            TensorData::F64(v) => v.len(),
        }
    }

    fn extend_zeroed(&mut self, count: usize) {
        match self {
            TensorData::U8(v) => v.extend(std::iter::repeat(0).take(count)),
            TensorData::I32(v) => v.extend(std::iter::repeat(0).take(count)),
            TensorData::I64(v) => v.extend(std::iter::repeat(0).take(count)),
            TensorData::F32(v) => v.extend(std::iter::repeat(0.0).take(count)),
            TensorData::F64(v) => v.extend(std::iter::repeat(0.0).take(count)),
        }
    }
}

/// A dense tensor whose first dimension is the batch dimension.
#[derive(Debug, Clone)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

macro_rules! tensor_constructor {
    ($name:ident, $elem:ty, $variant:ident) => {
        pub fn $name(shape: Vec<usize>, data: Vec<$elem>) -> Result<Self> {
            Self::build(shape, TensorData::$variant(data))
        }
    };
}

macro_rules! tensor_accessor {
    ($name:ident, $elem:ty, $variant:ident) => {
        /// Typed view of the flattened element buffer, or `None` if this
        /// tensor holds a different element type.
        pub fn $name(&self) -> Option<&[$elem]> {
            match &self.data {
                TensorData::$variant(v) => Some(v),
                _ => None,
            }
        }
    };
}

impl Tensor {
    tensor_constructor!(from_u8, u8, U8);
    tensor_constructor!(from_i32, i32, I32);
    tensor_constructor!(from_i64, i64, I64);
    tensor_constructor!(from_f32, f32, F32);
    tensor_constructor!(from_f64, f64, F64);

    fn build(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        ensure!(
            expected == data.len(),
            "tensor shape {:?} holds {} element(s) but {} were provided",
            shape,
            expected,
            data.len()
        );
        ensure!(!shape.is_empty(), "tensor shape must have a batch dimension");
        Ok(Self { shape, data })
    }

    pub fn element_type(&self) -> ElementType {
        match self.data {
            TensorData::U8(_) => ElementType::U8,
            TensorData::I32(_) => ElementType::I32,
            TensorData::I64(_) => ElementType::I64,
            TensorData::F32(_) => ElementType::F32,
            TensorData::F64(_) => ElementType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Size of the batch dimension.
    pub fn num_rows(&self) -> usize {
        self.shape[0]
    }

    /// Shape of a single row (everything past the batch dimension).
    pub fn row_shape(&self) -> &[usize] {
        &self.shape[1..]
    }

    tensor_accessor!(as_u8, u8, U8);
    tensor_accessor!(as_i32, i32, I32);
    tensor_accessor!(as_i64, i64, I64);
    tensor_accessor!(as_f32, f32, F32);
    tensor_accessor!(as_f64, f64, F64);

    /// Appends `count` rows of zeros along the batch dimension.
    pub(crate) fn extend_zero_rows(&mut self, count: usize) {
        let row_elements: usize = self.shape[1..].iter().product();
        self.data.extend_zeroed(count * row_elements);
        self.shape[0] += count;
    }
}
