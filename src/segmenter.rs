//! src/segmenter.rs
//!
//! Record segmenters: per-store strategies that cut a chunked byte stream
//! into framed records.
//!
//! Two strategies are supported:
//! - **Whole-store**: the entire store is one `data` record. Used for
//!   self-framed formats such as a single image per store.
//! - **Framed**: the store is a concatenation of self-describing RecordIO
//!   frames. Each frame is `[magic: u32][header: u32][payload][zero padding]`
//!   with everything aligned to 4 bytes; the header word encodes the record
//!   kind in its 3 most significant bits and the payload length in the
//!   remaining 29.
//!
//! Segmenters are push-based: the ingest task feeds them cursor chunks and
//! collects completed records. Payloads are zero-copy subslices of the
//! chunks except when a frame straddles a chunk boundary, in which case the
//! leftover bytes are carried into a merged buffer.

use crate::buffer::ByteSlice;
use crate::record::{Record, RecordKind};

/// Magic word opening every RecordIO frame.
pub const RECORDIO_MAGIC: u32 = 0xced7_230a;

/// Frames are aligned to this many bytes; payloads are zero-padded up to it.
pub const RECORDIO_ALIGNMENT: usize = 4;

const HEADER_SIZE: usize = 8;
const PAYLOAD_LENGTH_BITS: u32 = 29;
const PAYLOAD_LENGTH_MASK: u32 = (1 << PAYLOAD_LENGTH_BITS) - 1;

/// A malformed-framing report, positioned relative to the store start.
/// The ingest task attaches the store id when surfacing it.
#[derive(Debug, Clone)]
pub struct FramingFault {
    pub offset: u64,
    pub message: String,
}

/// Splits one store's byte stream into records.
pub trait RecordSegmenter: Send {
    /// Feeds the next chunk, appending any completed records to `out`.
    fn push_chunk(&mut self, chunk: ByteSlice, out: &mut Vec<Record>) -> Result<(), FramingFault>;

    /// Signals end of store; flushes or faults on a partial record.
    fn finish(&mut self, out: &mut Vec<Record>) -> Result<(), FramingFault>;
}

// ================================================================================================
// Whole-store strategy
// ================================================================================================

/// Yields the full store contents as a single `data` record.
#[derive(Default)]
pub struct WholeStoreSegmenter {
    chunks: Vec<ByteSlice>,
}

impl WholeStoreSegmenter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordSegmenter for WholeStoreSegmenter {
    fn push_chunk(&mut self, chunk: ByteSlice, _out: &mut Vec<Record>) -> Result<(), FramingFault> {
        self.chunks.push(chunk);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Record>) -> Result<(), FramingFault> {
        let chunks = std::mem::take(&mut self.chunks);
        match chunks.len() {
            0 => {}
            // Single chunk: hand the slice through untouched.
            1 => out.push(Record::data(chunks.into_iter().next().unwrap())),
            _ => {
                let total: usize = chunks.iter().map(|c| c.len()).sum();
                let mut merged = Vec::with_capacity(total);
                for chunk in &chunks {
                    merged.extend_from_slice(chunk.as_bytes());
                }
                out.push(Record::data(ByteSlice::from_vec(merged)));
            }
        }
        Ok(())
    }
}

// ================================================================================================
// Framed (RecordIO) strategy
// ================================================================================================

/// Parses a RecordIO frame stream into records.
pub struct FramedSegmenter {
    buffer: ByteSlice,
    pos: usize,
    // Store offset of buffer[0], for fault positions.
    base_offset: u64,
}

impl FramedSegmenter {
    pub fn new() -> Self {
        Self {
            buffer: ByteSlice::empty(),
            pos: 0,
            base_offset: 0,
        }
    }

    fn fault(&self, at: usize, message: impl Into<String>) -> FramingFault {
        FramingFault {
            offset: self.base_offset + at as u64,
            message: message.into(),
        }
    }

    /// Parses as many complete frames as the buffer holds.
    fn parse(&mut self, out: &mut Vec<Record>) -> Result<(), FramingFault> {
        while self.buffer.len() - self.pos >= HEADER_SIZE {
            let bytes = self.buffer.as_bytes();
            let magic = u32::from_le_bytes(bytes[self.pos..self.pos + 4].try_into().unwrap());
            if magic != RECORDIO_MAGIC {
                return Err(self.fault(
                    self.pos,
                    format!("bad frame magic {magic:#010x}, expected {RECORDIO_MAGIC:#010x}"),
                ));
            }

            let header =
                u32::from_le_bytes(bytes[self.pos + 4..self.pos + 8].try_into().unwrap());
            let kind = match header >> PAYLOAD_LENGTH_BITS {
                0 => RecordKind::Data,
                1 => RecordKind::Header,
                2 => RecordKind::Footer,
                3 => RecordKind::Padding,
                reserved => {
                    return Err(
                        self.fault(self.pos + 4, format!("reserved record kind {reserved}"))
                    )
                }
            };
            let payload_len = (header & PAYLOAD_LENGTH_MASK) as usize;

            let padded_len = payload_len.div_ceil(RECORDIO_ALIGNMENT) * RECORDIO_ALIGNMENT;
            let frame_len = HEADER_SIZE + padded_len;
            if self.buffer.len() - self.pos < frame_len {
                break; // Incomplete frame; wait for the next chunk.
            }

            let payload = self.buffer.slice(self.pos + HEADER_SIZE, payload_len);
            out.push(Record { kind, payload });
            self.pos += frame_len;
        }
        Ok(())
    }
}

impl Default for FramedSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSegmenter for FramedSegmenter {
    fn push_chunk(&mut self, chunk: ByteSlice, out: &mut Vec<Record>) -> Result<(), FramingFault> {
        if self.pos < self.buffer.len() {
            // A frame straddles the chunk boundary: carry the tail over into
            // a merged buffer. The copy is bounded by one partial frame plus
            // one chunk.
            let leftover = self.buffer.slice(self.pos, self.buffer.len() - self.pos);
            let mut merged = Vec::with_capacity(leftover.len() + chunk.len());
            merged.extend_from_slice(leftover.as_bytes());
            merged.extend_from_slice(chunk.as_bytes());
            self.base_offset += self.pos as u64;
            self.buffer = ByteSlice::from_vec(merged);
        } else {
            self.base_offset += self.buffer.len() as u64;
            self.buffer = chunk;
        }
        self.pos = 0;
        self.parse(out)
    }

    fn finish(&mut self, _out: &mut Vec<Record>) -> Result<(), FramingFault> {
        if self.pos < self.buffer.len() {
            return Err(self.fault(
                self.pos,
                format!(
                    "store ended mid-frame with {} trailing byte(s)",
                    self.buffer.len() - self.pos
                ),
            ));
        }
        Ok(())
    }
}
