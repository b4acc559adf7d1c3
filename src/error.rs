//! src/error.rs
//!
//! Fault taxonomy for the reader.
//!
//! Every fault carries a human-readable message plus whatever origin
//! coordinates are known: the store id for ingest-side faults, the batch
//! index for decode-side ones. Variants are `Clone` because a poisoned
//! reader resurfaces the same fault on every `next` until `reset`.

use thiserror::Error;

/// Error type covering construction, ingest, decode, and lifecycle failures.
#[derive(Debug, Clone, Error)]
pub enum ReadError {
    /// Invalid options detected at construction; the reader never starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A store read failed or returned truncated framing. Always fatal.
    #[error("I/O failure in store '{store_id}' at byte offset {offset}: {message}")]
    Io {
        store_id: String,
        offset: u64,
        message: String,
    },

    /// A malformed record header. Treated like an I/O fault.
    #[error("malformed record framing in store '{store_id}' at byte offset {offset}: {message}")]
    Framing {
        store_id: String,
        offset: u64,
        message: String,
    },

    /// Decode reported a bad batch and the policy is `Error`.
    #[error("batch {batch_index} could not be decoded: {message}")]
    BadBatch { batch_index: u64, message: String },

    /// A decoded example disagreed with the cached schema. Fatal.
    #[error("batch {batch_index} does not match the reader schema: {details}")]
    SchemaMismatch { batch_index: u64, details: String },

    /// A pipeline thread could not be started.
    #[error("failed to start pipeline thread: {0}")]
    Spawn(String),

    /// Surfaced to a `next`/`peek` call that was pending while the reader
    /// was reset or dropped. Not an error condition of the data itself.
    #[error("the read was interrupted by a concurrent reset")]
    Reset,
}

impl ReadError {
    /// Whether this fault poisons the pipeline (everything except the
    /// cancellation marker handed to a pre-empted caller).
    pub(crate) fn is_poisoning(&self) -> bool {
        !matches!(self, ReadError::Reset)
    }
}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn messages_name_the_origin() {
        let err = ReadError::Io {
            store_id: "train-0.rec".to_string(),
            offset: 4096,
            message: "unexpected end of file".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("train-0.rec"));
        assert!(text.contains("4096"));
    }

    #[test]
    fn reset_is_not_poisoning() {
        assert!(!ReadError::Reset.is_poisoning());
        assert!(ReadError::Config("batch_size must be >= 1".into()).is_poisoning());
    }
}
