use bytemuck::{CheckedBitPattern, NoUninit};
use half::f16;

use super::{ContextError, DType, TensorData};

/// A native scalar element type that can live in a tensor's typed storage.
pub trait Element:
    NoUninit + CheckedBitPattern + Default + PartialEq + core::fmt::Debug + Send + Sync + 'static
{
    /// The element type tag matching `Self`.
    const DTYPE: DType;

    /// Borrows the storage as a slice of `Self` if it holds that type.
    fn slice(data: &TensorData) -> Option<&[Self]>;

    /// Mutably borrows the storage as a slice of `Self` if it holds that type.
    fn slice_mut(data: &mut TensorData) -> Option<&mut [Self]>;

    /// Wraps a vector of elements into typed storage.
    fn into_data(values: Vec<Self>) -> TensorData;

    /// Views the elements as their in-memory bytes.
    fn as_bytes(values: &[Self]) -> &[u8] {
        bytemuck::cast_slice(values)
    }

    /// Fills `dst` from in-memory bytes, validating every element's bit pattern.
    fn read_bytes(bytes: &[u8], dst: &mut [Self]) -> Result<(), ContextError> {
        let size = core::mem::size_of::<Self>();
        if bytes.len() != size * dst.len() {
            return Err(ContextError::CopySizeMismatch {
                src: bytes.len(),
                dst: size * dst.len(),
            });
        }

        for (chunk, slot) in bytes.chunks_exact(size).zip(dst.iter_mut()) {
            *slot = bytemuck::checked::try_pod_read_unaligned(chunk)
                .map_err(|_| ContextError::InvalidBitPattern(Self::DTYPE))?;
        }

        Ok(())
    }
}

macro_rules! impl_element {
    ($ty:ty, $dtype:ident, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            fn slice(data: &TensorData) -> Option<&[Self]> {
                match data {
                    TensorData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut TensorData) -> Option<&mut [Self]> {
                match data {
                    TensorData::$variant(values) => Some(values),
                    _ => None,
                }
            }

            fn into_data(values: Vec<Self>) -> TensorData {
                TensorData::$variant(values)
            }
        }
    };
}

impl_element!(f64, F64, F64);
impl_element!(f32, F32, F32);
impl_element!(f16, F16, F16);
impl_element!(i64, I64, I64);
impl_element!(i32, I32, I32);
impl_element!(i16, I16, I16);
impl_element!(i8, I8, I8);
impl_element!(u16, U16, U16);
impl_element!(u8, U8, U8);
impl_element!(bool, Bool, Bool);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_roundtrip_unaligned() {
        let values = [1u16, 258, u16::MAX];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(u16::as_bytes(&values));

        let mut out = [0u16; 3];
        u16::read_bytes(&bytes[1..], &mut out).unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn invalid_bool_pattern_is_rejected() {
        let mut out = [false; 2];
        let result = bool::read_bytes(&[1, 7], &mut out);

        assert_eq!(result, Err(ContextError::InvalidBitPattern(DType::Bool)));
    }

    #[test]
    fn read_bytes_checks_length() {
        let mut out = [0i32; 2];
        let result = i32::read_bytes(&[0; 7], &mut out);

        assert_eq!(
            result,
            Err(ContextError::CopySizeMismatch { src: 7, dst: 8 })
        );
    }
}
