use super::DType;

/// Errors raised by tensor storage accessors.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    /// A requested element range does not fit in the tensor.
    #[error("Requested invalid tensor range [{begin}, {end}) with total tensor size {numel}")]
    InvalidRange {
        /// First element of the range.
        begin: usize,
        /// One past the last element of the range.
        end: usize,
        /// Number of elements of the tensor.
        numel: usize,
    },

    /// The tensor storage holds another element type than the one requested.
    #[error("Tensor holds elements of type {actual}, expected {expected}")]
    DTypeMismatch {
        /// Element type requested by the caller.
        expected: DType,
        /// Element type of the storage.
        actual: DType,
    },

    /// Opaque elements were requested from a tensor of a fixed scalar type.
    #[error("Tensor holds elements of type {0}, not opaque values")]
    InvalidOpaqueAccess(DType),

    /// The tensor has no allocated storage.
    #[error("The tensor does not have allocated storage")]
    Uninitialized,

    /// The storage length does not match the shape.
    #[error("Storage holds {actual} elements but the shape requires {expected}")]
    LengthMismatch {
        /// Number of elements required by the shape.
        expected: usize,
        /// Number of elements provided.
        actual: usize,
    },

    /// A dimension read from an external source is negative.
    #[error("Invalid negative dimension {0}")]
    NegativeDimension(i64),

    /// The product of the dimensions does not fit in a `usize`.
    #[error("Number of elements of shape {0:?} overflows")]
    ElementCountOverflow(Vec<usize>),
}

/// Errors raised by a [device context](crate::DeviceContext).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    /// No context can be created for the device.
    #[error("No device context available for {0}")]
    UnsupportedDevice(String),

    /// Source and destination buffers of a copy differ in size.
    #[error("Copy size mismatch: source has {src} bytes, destination has {dst} bytes")]
    CopySizeMismatch {
        /// Source buffer size in bytes.
        src: usize,
        /// Destination buffer size in bytes.
        dst: usize,
    },

    /// Copied bytes are not a valid representation of the element type.
    #[error("Invalid bit pattern for element type {0}")]
    InvalidBitPattern(DType),

    /// The device reported a failure.
    #[error("Device error: {0}")]
    Device(String),
}
