use tensorblob_tensor::{ContextError, TensorError};

use crate::config::ConfigError;
use crate::record::DataType;

/// Error raised while serializing or deserializing a blob.
///
/// Every failure aborts the whole call; nothing is retried internally.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A segment or chunk does not fit in the tensor.
    #[error("Invalid chunk [{begin}, {end}) with total tensor size {numel}")]
    InvalidRange {
        /// First element of the chunk.
        begin: i64,
        /// One past the last element of the chunk.
        end: i64,
        /// Number of elements of the tensor.
        numel: usize,
    },

    /// A chunk size of zero elements was requested.
    #[error("Chunk size must be at least one element")]
    InvalidChunkSize,

    /// A payload field does not hold the number of values the chunk requires.
    #[error("Incorrect {field} size in serialized data: expected {expected}, found {actual}")]
    SizeMismatch {
        /// Payload field that was read.
        field: &'static str,
        /// Number of values required by the chunk.
        expected: usize,
        /// Number of values found.
        actual: usize,
    },

    /// The record uses a serialization format this version cannot read.
    #[error("Unsupported serialization format {format}: {reason}")]
    UnsupportedFormat {
        /// The format tag found in the record.
        format: i32,
        /// What was being decoded.
        reason: &'static str,
    },

    /// The record has no element type or one this version does not know.
    #[error("Cannot deserialize tensor: unrecognized data type {0:?}")]
    UnrecognizedDataType(Option<i32>),

    /// The element type is known but handled by a specialized codec.
    #[error("{message} (data type {data_type:?})")]
    UnsupportedDataType {
        /// The element type.
        data_type: DataType,
        /// What to use instead.
        message: &'static str,
    },

    /// A tensor with elements to write has no storage.
    #[error(
        "The input does not have data input yet. This is probably because you created a tensor \
         of non-zero shape but never filled its data. Serializing its content makes no sense."
    )]
    UninitializedStorage,

    /// In-place deserialization into a tensor without storage or element type.
    #[error("Tensor must be initialized before being passed to deserialize_into")]
    UninitializedTensor,

    /// No serializer is registered for the blob's type.
    #[error("No known serializer for {0}")]
    NoSerializer(String),

    /// No deserializer is registered for the record's type.
    #[error("No registered deserializer for type {0}")]
    NoDeserializer(String),

    /// A blob holds another type than the codec expects.
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Type expected by the codec.
        expected: String,
        /// Type found.
        actual: String,
    },

    /// Raw byte payloads of multi-byte elements need a little-endian host.
    #[error("Serialization with bytes not supported on big endian platform")]
    BigEndian,

    /// The record envelope is inconsistent.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The record bytes could not be parsed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The record could not be encoded.
    #[error("Encode error: {0}")]
    Encode(String),

    /// Tensor storage access failed.
    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),

    /// The device context failed.
    #[error("Device context error: {0}")]
    Context(#[from] ContextError),

    /// The sink rejected a record.
    #[error("Sink failed to accept {name}: {reason}")]
    Sink {
        /// Name of the rejected record.
        name: String,
        /// Reason given by the sink.
        reason: String,
    },

    /// The configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A serialization worker thread panicked.
    #[error("Serialization worker failed: {0}")]
    Worker(String),

    /// Context added by the top-level calls: the blob being processed.
    #[error("Blob {name}: {source}")]
    Blob {
        /// Name of the blob.
        name: String,
        /// The underlying failure.
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Attaches the name of the blob being processed. Unnamed blobs add no context.
    pub fn for_blob(self, name: &str) -> Self {
        if name.is_empty() || matches!(&self, Self::Blob { name: inner, .. } if inner == name) {
            return self;
        }

        Self::Blob {
            name: name.to_string(),
            source: Box::new(self),
        }
    }

    /// The underlying failure, without blob name context.
    pub fn root(&self) -> &Error {
        match self {
            Self::Blob { source, .. } => source.root(),
            other => other,
        }
    }
}
