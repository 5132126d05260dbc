use core::fmt;

use crate::TypeMeta;

/// Element type of a tensor.
///
/// The set is closed: every consumer matches on it exhaustively, so a new variant cannot be
/// added without handling it everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 64-bit floating point
    F64,
    /// 32-bit floating point
    F32,
    /// 16-bit floating point
    F16,
    /// 64-bit integer
    I64,
    /// 32-bit integer
    I32,
    /// 16-bit integer
    I16,
    /// 8-bit integer
    I8,
    /// 16-bit unsigned integer
    U16,
    /// 8-bit unsigned integer
    U8,
    /// Boolean
    Bool,
    /// Owned UTF-8 string
    String,
    /// Any other value type, stored as one [blob](crate::Blob) per element.
    Opaque(TypeMeta),
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::F64 => write!(f, "f64"),
            DType::F32 => write!(f, "f32"),
            DType::F16 => write!(f, "f16"),
            DType::I64 => write!(f, "i64"),
            DType::I32 => write!(f, "i32"),
            DType::I16 => write!(f, "i16"),
            DType::I8 => write!(f, "i8"),
            DType::U16 => write!(f, "u16"),
            DType::U8 => write!(f, "u8"),
            DType::Bool => write!(f, "bool"),
            DType::String => write!(f, "string"),
            DType::Opaque(meta) => write!(f, "opaque({})", meta.name()),
        }
    }
}
