//! src/record.rs
//!
//! Records: the framed byte units produced by a segmenter.

use crate::buffer::ByteSlice;

/// Classifies a record within its container format.
///
/// Only `Data` records are promoted to instances; the other kinds are
/// skipped by the instance stream but counted for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Data,
    Header,
    Footer,
    Padding,
}

/// A logical unit cut out of a store's byte stream.
///
/// The payload is a zero-copy subslice of a cursor chunk; the chunk's backing
/// buffer outlives the record through the slice's shared ownership.
#[derive(Debug, Clone)]
pub struct Record {
    pub kind: RecordKind,
    pub payload: ByteSlice,
}

impl Record {
    pub fn data(payload: ByteSlice) -> Self {
        Self {
            kind: RecordKind::Data,
            payload,
        }
    }

    pub fn is_data(&self) -> bool {
        self.kind == RecordKind::Data
    }
}
