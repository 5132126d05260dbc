use super::{DType, Device, Element, Shape, TensorData, TensorError};
use crate::{Blob, TypeMeta};

/// A multi-dimensional array living on a device.
///
/// A tensor can be in three states:
/// - untyped: no element type and no storage (only the shape is known),
/// - declared: an element type without storage,
/// - initialized: typed storage holding exactly `numel` elements.
#[derive(Debug)]
pub struct Tensor {
    shape: Shape,
    device: Device,
    dtype: Option<DType>,
    data: Option<TensorData>,
}

impl Tensor {
    /// Creates an untyped tensor without storage.
    pub fn new<S: Into<Shape>>(shape: S, device: Device) -> Self {
        Self {
            shape: shape.into(),
            device,
            dtype: None,
            data: None,
        }
    }

    /// Creates a tensor with a declared element type but no storage.
    pub fn declared<S: Into<Shape>>(shape: S, dtype: DType, device: Device) -> Self {
        Self {
            shape: shape.into(),
            device,
            dtype: Some(dtype),
            data: None,
        }
    }

    /// Allocates a tensor with default-initialized storage.
    pub fn empty<S: Into<Shape>>(shape: S, dtype: DType, device: Device) -> Self {
        let shape = shape.into();
        let data = TensorData::zeros(dtype, shape.num_elements());

        Self {
            shape,
            device,
            dtype: Some(dtype),
            data: Some(data),
        }
    }

    /// Creates a tensor from existing storage.
    pub fn from_data<S: Into<Shape>>(
        shape: S,
        data: TensorData,
        device: Device,
    ) -> Result<Self, TensorError> {
        let shape = shape.into();
        if data.len() != shape.num_elements() {
            return Err(TensorError::LengthMismatch {
                expected: shape.num_elements(),
                actual: data.len(),
            });
        }

        Ok(Self {
            shape,
            device,
            dtype: Some(data.dtype()),
            data: Some(data),
        })
    }

    /// Creates a host tensor from a vector of native elements.
    pub fn from_vec<E: Element, S: Into<Shape>>(values: Vec<E>, shape: S) -> Result<Self, TensorError> {
        Self::from_data(shape, E::into_data(values), Device::cpu())
    }

    /// Creates a host tensor of strings.
    pub fn from_strings<S: Into<Shape>>(values: Vec<String>, shape: S) -> Result<Self, TensorError> {
        Self::from_data(shape, TensorData::String(values), Device::cpu())
    }

    /// Creates a host tensor of opaque values of type `T`.
    pub fn from_opaque<T, S>(values: Vec<T>, shape: S) -> Result<Self, TensorError>
    where
        T: core::any::Any + Send + Sync,
        S: Into<Shape>,
    {
        let data = TensorData::Opaque {
            meta: TypeMeta::of::<T>(),
            values: values.into_iter().map(Blob::new).collect(),
        };
        Self::from_data(shape, data, Device::cpu())
    }

    /// The shape of the tensor.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The dimensions of the tensor.
    pub fn dims(&self) -> &[usize] {
        &self.shape.dims
    }

    /// Total number of elements, zero if any dimension is zero.
    pub fn numel(&self) -> usize {
        self.shape.num_elements()
    }

    /// The device holding the tensor.
    pub fn device(&self) -> Device {
        self.device
    }

    /// The element type, if one was ever set.
    pub fn dtype(&self) -> Option<DType> {
        self.dtype
    }

    /// Returns true if an element type was set.
    pub fn dtype_initialized(&self) -> bool {
        self.dtype.is_some()
    }

    /// Returns true if the tensor owns allocated storage.
    pub fn storage_initialized(&self) -> bool {
        self.data.is_some()
    }

    /// Borrows the storage.
    pub fn data(&self) -> Option<&TensorData> {
        self.data.as_ref()
    }

    /// Consumes the tensor and returns its storage.
    pub fn into_data(self) -> Option<TensorData> {
        self.data
    }

    /// Returns true if the tensor has this shape, element type and device.
    pub fn matches(&self, shape: &Shape, dtype: DType, device: Device) -> bool {
        &self.shape == shape && self.dtype == Some(dtype) && self.device == device
    }

    /// Borrows the elements as a slice of `E`.
    pub fn as_slice<E: Element>(&self) -> Result<&[E], TensorError> {
        let data = self.data.as_ref().ok_or(TensorError::Uninitialized)?;
        E::slice(data).ok_or(TensorError::DTypeMismatch {
            expected: E::DTYPE,
            actual: data.dtype(),
        })
    }

    /// Borrows the string elements.
    pub fn strings(&self) -> Result<&[String], TensorError> {
        match self.data.as_ref().ok_or(TensorError::Uninitialized)? {
            TensorData::String(values) => Ok(values),
            other => Err(TensorError::DTypeMismatch {
                expected: DType::String,
                actual: other.dtype(),
            }),
        }
    }

    /// Borrows the opaque elements.
    pub fn blobs(&self) -> Result<&[Blob], TensorError> {
        match self.data.as_ref().ok_or(TensorError::Uninitialized)? {
            TensorData::Opaque { values, .. } => Ok(values),
            other => Err(TensorError::InvalidOpaqueAccess(other.dtype())),
        }
    }

    /// Mutable view on the elements `[start, start + len)`.
    pub fn mutable_range<E: Element>(
        &mut self,
        start: usize,
        len: usize,
    ) -> Result<&mut [E], TensorError> {
        let range = self.checked_range(start, len)?;
        let data = self.data.as_mut().ok_or(TensorError::Uninitialized)?;
        let actual = data.dtype();

        E::slice_mut(data)
            .map(|values| &mut values[range])
            .ok_or(TensorError::DTypeMismatch {
                expected: E::DTYPE,
                actual,
            })
    }

    /// Mutable view on the string elements `[start, start + len)`.
    pub fn mutable_strings(
        &mut self,
        start: usize,
        len: usize,
    ) -> Result<&mut [String], TensorError> {
        let range = self.checked_range(start, len)?;
        match self.data.as_mut().ok_or(TensorError::Uninitialized)? {
            TensorData::String(values) => Ok(&mut values[range]),
            other => Err(TensorError::DTypeMismatch {
                expected: DType::String,
                actual: other.dtype(),
            }),
        }
    }

    /// Mutable view on the opaque elements `[start, start + len)`, typed as `meta`.
    ///
    /// If the storage holds another element type it is replaced by `numel` empty blobs of the
    /// requested type, and the tensor's element type changes accordingly.
    pub fn mutable_blobs(
        &mut self,
        meta: TypeMeta,
        start: usize,
        len: usize,
    ) -> Result<&mut [Blob], TensorError> {
        let range = self.checked_range(start, len)?;
        let dtype = DType::Opaque(meta);

        if self.data.as_ref().map(TensorData::dtype) != Some(dtype) {
            log::debug!("Retyping tensor storage from {:?} to {dtype}", self.dtype);
            self.data = Some(TensorData::zeros(dtype, self.numel()));
            self.dtype = Some(dtype);
        }

        match self.data.as_mut() {
            Some(TensorData::Opaque { values, .. }) => Ok(&mut values[range]),
            Some(other) => Err(TensorError::InvalidOpaqueAccess(other.dtype())),
            None => Err(TensorError::Uninitialized),
        }
    }

    fn checked_range(&self, start: usize, len: usize) -> Result<core::ops::Range<usize>, TensorError> {
        let numel = self.numel();
        match start.checked_add(len) {
            Some(end) if end <= numel => Ok(start..end),
            end => Err(TensorError::InvalidRange {
                begin: start,
                end: end.unwrap_or(usize::MAX),
                numel,
            }),
        }
    }
}
