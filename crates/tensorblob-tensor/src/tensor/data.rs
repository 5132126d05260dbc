use half::f16;

use super::DType;
use crate::{Blob, TypeMeta};

/// Typed host storage of a tensor, flattened in row-major order.
#[derive(Debug)]
pub enum TensorData {
    /// 64-bit floating point values.
    F64(Vec<f64>),
    /// 32-bit floating point values.
    F32(Vec<f32>),
    /// 16-bit floating point values.
    F16(Vec<f16>),
    /// 64-bit integer values.
    I64(Vec<i64>),
    /// 32-bit integer values.
    I32(Vec<i32>),
    /// 16-bit integer values.
    I16(Vec<i16>),
    /// 8-bit integer values.
    I8(Vec<i8>),
    /// 16-bit unsigned integer values.
    U16(Vec<u16>),
    /// 8-bit unsigned integer values.
    U8(Vec<u8>),
    /// Boolean values.
    Bool(Vec<bool>),
    /// String values.
    String(Vec<String>),
    /// Values of a type outside the fixed scalar set, one blob per element.
    Opaque {
        /// Type of every element.
        meta: TypeMeta,
        /// The elements. Unfilled slots are empty blobs.
        values: Vec<Blob>,
    },
}

impl TensorData {
    /// Allocates `len` default-initialized elements of the given type.
    pub fn zeros(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::F64 => Self::F64(vec![0.0; len]),
            DType::F32 => Self::F32(vec![0.0; len]),
            DType::F16 => Self::F16(vec![f16::ZERO; len]),
            DType::I64 => Self::I64(vec![0; len]),
            DType::I32 => Self::I32(vec![0; len]),
            DType::I16 => Self::I16(vec![0; len]),
            DType::I8 => Self::I8(vec![0; len]),
            DType::U16 => Self::U16(vec![0; len]),
            DType::U8 => Self::U8(vec![0; len]),
            DType::Bool => Self::Bool(vec![false; len]),
            DType::String => Self::String(vec![String::new(); len]),
            DType::Opaque(meta) => Self::Opaque {
                meta,
                values: (0..len).map(|_| Blob::empty()).collect(),
            },
        }
    }

    /// The element type of the storage.
    pub fn dtype(&self) -> DType {
        match self {
            Self::F64(_) => DType::F64,
            Self::F32(_) => DType::F32,
            Self::F16(_) => DType::F16,
            Self::I64(_) => DType::I64,
            Self::I32(_) => DType::I32,
            Self::I16(_) => DType::I16,
            Self::I8(_) => DType::I8,
            Self::U16(_) => DType::U16,
            Self::U8(_) => DType::U8,
            Self::Bool(_) => DType::Bool,
            Self::String(_) => DType::String,
            Self::Opaque { meta, .. } => DType::Opaque(*meta),
        }
    }

    /// Number of elements held.
    pub fn len(&self) -> usize {
        match self {
            Self::F64(values) => values.len(),
            Self::F32(values) => values.len(),
            Self::F16(values) => values.len(),
            Self::I64(values) => values.len(),
            Self::I32(values) => values.len(),
            Self::I16(values) => values.len(),
            Self::I8(values) => values.len(),
            Self::U16(values) => values.len(),
            Self::U8(values) => values.len(),
            Self::Bool(values) => values.len(),
            Self::String(values) => values.len(),
            Self::Opaque { values, .. } => values.len(),
        }
    }

    /// Returns true if no element is held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<String>> for TensorData {
    fn from(values: Vec<String>) -> Self {
        Self::String(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeros_matches_dtype() {
        for dtype in [DType::F16, DType::Bool, DType::String, DType::I8] {
            let data = TensorData::zeros(dtype, 4);
            assert_eq!(data.dtype(), dtype);
            assert_eq!(data.len(), 4);
        }
    }

    #[test]
    fn opaque_zeros_are_empty_blobs() {
        let meta = TypeMeta::of::<(u8, u8)>();
        let data = TensorData::zeros(DType::Opaque(meta), 2);

        match data {
            TensorData::Opaque { meta: stored, values } => {
                assert_eq!(stored, meta);
                assert!(values.iter().all(Blob::is_empty));
            }
            other => panic!("unexpected storage {other:?}"),
        }
    }
}
