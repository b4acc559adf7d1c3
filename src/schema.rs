//! src/schema.rs
//!
//! The reader schema: the fixed set of named, typed attributes every decoded
//! example must carry. Inferred once from the first non-empty instance the
//! pipeline observes and immutable thereafter; any example disagreeing with
//! it is a fatal fault.

use std::fmt;

use crate::example::Example;
use crate::tensor::ElementType;

/// One named attribute of the schema. `shape` describes a single row; the
/// batch dimension is not part of it, since batch sizes legally vary on the
/// final batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub element_type: ElementType,
    pub shape: Vec<usize>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, element_type: ElementType, shape: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            element_type,
            shape,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}{:?}", self.name, self.element_type, self.shape)
    }
}

/// Ordered list of attributes shared by every example of an epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Position of a named attribute within the schema order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|attr| attr.name == name)
    }

    /// Checks a decoded example against this schema: attribute count,
    /// element types, per-row shapes, and a uniform batch dimension across
    /// tensors. Returns a human-readable discrepancy on failure.
    pub fn check_example(&self, example: &Example) -> Result<(), String> {
        let tensors = example.tensors();
        if tensors.len() != self.attributes.len() {
            return Err(format!(
                "example has {} tensor(s), schema defines {}",
                tensors.len(),
                self.attributes.len()
            ));
        }

        let mut batch_dim = None;
        for (attr, tensor) in self.attributes.iter().zip(tensors) {
            if tensor.element_type() != attr.element_type {
                return Err(format!(
                    "attribute '{}' is {} but the example holds {}",
                    attr.name,
                    attr.element_type,
                    tensor.element_type()
                ));
            }
            if tensor.row_shape() != attr.shape.as_slice() {
                return Err(format!(
                    "attribute '{}' rows have shape {:?}, schema requires {:?}",
                    attr.name,
                    tensor.row_shape(),
                    attr.shape
                ));
            }
            match batch_dim {
                None => batch_dim = Some(tensor.num_rows()),
                Some(rows) if rows != tensor.num_rows() => {
                    return Err(format!(
                        "attribute '{}' has {} row(s) while earlier attributes have {}",
                        attr.name,
                        tensor.num_rows(),
                        rows
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{attr}")?;
        }
        write!(f, "}}")
    }
}
