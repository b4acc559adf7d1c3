pub mod batch;
pub mod buffer;
pub mod config;
mod cursor;
pub mod decoder;
pub mod decoders;
pub mod error;
pub mod example;
pub mod instance;
pub mod memory;
pub mod reader;
pub mod record;
pub mod schema;
pub mod segmenter;
pub mod store;
pub mod tensor;

pub use batch::{BatchDescriptor, LastBatchHandling};
pub use buffer::ByteSlice;
pub use config::{BadBatchHandling, ReaderConfig, ReaderConfigBuilder};
pub use decoder::{BadBatch, Decoder, SegmentationStrategy};
pub use error::ReadError;
pub use example::Example;
pub use instance::Instance;
pub use reader::DataReader;
pub use schema::{Attribute, Schema};
pub use store::{DataStore, FileStore, InMemoryStore};
pub use tensor::{ElementType, Tensor};
