use half::f16;
use num_traits::AsPrimitive;
use tensorblob_tensor::{DeviceContext, Element};

use crate::Error;

/// Element that can travel inside a 32-bit integer holder field.
pub trait HolderCast: Element {
    /// Widens the element into its holder value.
    fn to_holder(self) -> i32;

    /// Narrows a holder value back into the element.
    fn from_holder(value: i32) -> Self;
}

macro_rules! impl_holder_cast {
    ($($ty:ty),*) => {
        $(
            impl HolderCast for $ty {
                fn to_holder(self) -> i32 {
                    self.as_()
                }

                fn from_holder(value: i32) -> Self {
                    value.as_()
                }
            }
        )*
    };
}

impl_holder_cast!(u8, i8, u16, i16);

impl HolderCast for bool {
    fn to_holder(self) -> i32 {
        self.as_()
    }

    fn from_holder(value: i32) -> Self {
        value != 0
    }
}

impl HolderCast for f16 {
    fn to_holder(self) -> i32 {
        self.to_bits().as_()
    }

    fn from_holder(value: i32) -> Self {
        f16::from_bits(value.as_())
    }
}

/// Returns true if raw element bytes of this width can be stored as is on this platform.
pub fn native_bytes_portable(element_size: usize) -> bool {
    element_size == 1 || cfg!(target_endian = "little")
}

/// Copies device elements into host bytes, waiting for the copy to complete.
pub fn copy_to_bytes<E: Element>(
    context: &mut dyn DeviceContext,
    src: &[E],
) -> Result<Vec<u8>, Error> {
    let bytes = E::as_bytes(src);
    let mut host = vec![0u8; bytes.len()];

    context.copy_bytes_to_host(bytes, &mut host)?;
    context.finish_device_computation()?;

    Ok(host)
}

/// Copies device elements into a host field of the same type.
pub fn copy_as_is<E: Element>(context: &mut dyn DeviceContext, src: &[E]) -> Result<Vec<E>, Error> {
    let host = copy_to_bytes(context, src)?;
    let mut values = vec![E::default(); src.len()];
    E::read_bytes(&host, &mut values)?;

    Ok(values)
}

/// Copies device elements into an int32 holder field, widening each element.
pub fn copy_with_cast<E: HolderCast>(
    context: &mut dyn DeviceContext,
    src: &[E],
) -> Result<Vec<i32>, Error> {
    Ok(copy_as_is(context, src)?
        .into_iter()
        .map(HolderCast::to_holder)
        .collect())
}

/// Copies host bytes into device elements, waiting for the copy to complete.
///
/// The byte count must match the destination exactly.
pub fn copy_from_bytes<E: Element>(
    context: &mut dyn DeviceContext,
    bytes: &[u8],
    dst: &mut [E],
) -> Result<(), Error> {
    let expected = core::mem::size_of::<E>() * dst.len();
    if bytes.len() != expected {
        return Err(Error::SizeMismatch {
            field: "byte_data",
            expected,
            actual: bytes.len(),
        });
    }

    let mut staging = vec![0u8; expected];
    context.copy_bytes_from_host(bytes, &mut staging)?;
    context.finish_device_computation()?;
    E::read_bytes(&staging, dst)?;

    Ok(())
}

/// Copies a host field of the same type into device elements.
pub fn copy_from_as_is<E: Element>(
    context: &mut dyn DeviceContext,
    field: &'static str,
    src: &[E],
    dst: &mut [E],
) -> Result<(), Error> {
    check_len(field, src.len(), dst.len())?;
    copy_from_bytes(context, E::as_bytes(src), dst)
}

/// Copies an int32 holder field into device elements, narrowing each value.
pub fn copy_from_with_cast<E: HolderCast>(
    context: &mut dyn DeviceContext,
    src: &[i32],
    dst: &mut [E],
) -> Result<(), Error> {
    check_len("int32_data", src.len(), dst.len())?;
    let values: Vec<E> = src.iter().copied().map(E::from_holder).collect();
    copy_from_bytes(context, E::as_bytes(&values), dst)
}

pub(crate) fn check_len(field: &'static str, actual: usize, expected: usize) -> Result<(), Error> {
    if actual != expected {
        return Err(Error::SizeMismatch {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}
