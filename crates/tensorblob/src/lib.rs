#![warn(missing_docs)]

//! # Tensorblob
//!
//! Chunked serialization of tensors and other blobs into self-describing binary records.
//!
//! A tensor is split into chunks of at most `chunk_size` elements. Every chunk becomes one
//! record carrying the full shape, element type and device of the tensor plus the segment of
//! elements it covers, so each record can be decoded on its own. Large tensors are encoded by a
//! bounded pool of worker threads and every record is handed to a caller supplied [Sink].

#[macro_use]
extern crate derive_new;

/// Chunk sizes and chunk ranges.
pub mod chunk;

/// Serialization settings.
pub mod config;

/// Element type to wire encoding dispatch.
pub mod format;

/// Wire records and their binary codec.
pub mod record;

/// Copies between tensor memory and payload fields.
pub mod transfer;

/// Rate-limited warnings.
pub mod warn;

mod deserializer;
mod error;
mod pool;
mod registry;
mod serde_codec;
mod serializer;

pub use chunk::{ChunkSize, DEFAULT_CHUNK_SIZE};
pub use config::{ConfigError, SerializationConfig};
pub use deserializer::*;
pub use error::*;
pub use registry::*;
pub use serde_codec::*;
pub use serializer::*;

pub use tensorblob_tensor as tensor;

#[cfg(test)]
mod tests;
