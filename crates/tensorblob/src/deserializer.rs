use std::sync::Arc;

use tensorblob_tensor::{
    Blob, ContextFactory, CpuContextFactory, DType, Device, DeviceType, Shape, Tensor,
};

use crate::chunk::Chunk;
use crate::format::{NestedElements, decode_chunk, dtype_of};
use crate::record::{BlobRecord, TENSOR_BLOB_TYPE, TensorRecord};
use crate::{BlobRegistry, Error};

/// Rebuilds blobs holding one type of value.
pub trait BlobDeserializer: Send + Sync {
    /// Decodes `record` into `blob`, reusing its current value when possible.
    ///
    /// `registry` resolves the deserializers of nested values.
    fn deserialize(
        &self,
        record: &BlobRecord,
        blob: &mut Blob,
        registry: &BlobRegistry,
    ) -> Result<(), Error>;
}

/// Key of the tensor deserializer for tensors living on `device_type`.
pub fn tensor_deserializer_key(device_type: DeviceType) -> String {
    format!("{TENSOR_BLOB_TYPE}{}", device_type.name())
}

/// Returns true for the zero-element records written without element type by old producers.
fn is_legacy_empty(record: &TensorRecord) -> Result<bool, Error> {
    Ok(record.is_untyped() && record.numel()? == 0)
}

/// Element type stored in `record`.
///
/// Undefined element types are discovered by decoding the nested records, which are returned
/// so they are not decoded again.
fn record_layout(
    record: &TensorRecord,
    registry: &BlobRegistry,
) -> Result<(DType, Option<NestedElements>), Error> {
    let data_type = record
        .data_type()
        .ok_or(Error::UnrecognizedDataType(record.data_type))?;

    if let Some(dtype) = dtype_of(data_type)? {
        return Ok((dtype, None));
    }

    let elements = NestedElements::decode(&record.payload, registry)?;
    Ok((DType::Opaque(elements.meta()), Some(elements)))
}

/// Allocates the tensor described by `record`, without reading its elements.
pub fn empty_tensor_from_record(
    record: &TensorRecord,
    registry: &BlobRegistry,
) -> Result<Tensor, Error> {
    let device = record.device()?;

    if is_legacy_empty(record)? {
        return Ok(Tensor::empty([0], DType::F32, device));
    }

    let (dtype, _) = record_layout(record, registry)?;
    Ok(Tensor::empty(record.shape()?, dtype, device))
}

/// Tensor held by `blob` if it already has this layout, a freshly allocated one otherwise.
fn blob_get_mutable_tensor(
    blob: &mut Blob,
    shape: Shape,
    dtype: DType,
    device: Device,
) -> Result<&mut Tensor, Error> {
    let reusable = blob.get::<Tensor>().is_some_and(|tensor| {
        tensor.storage_initialized() && tensor.matches(&shape, dtype, device)
    });

    if reusable {
        return blob
            .get_mut::<Tensor>()
            .ok_or_else(|| Error::InvalidRecord("blob tensor disappeared".to_string()));
    }

    log::trace!("Allocating {dtype} tensor of shape {:?} on {device}", shape.dims);
    Ok(blob.reset(Tensor::empty(shape, dtype, device)))
}

/// Rebuilds tensors from their chunk records.
#[derive(Clone)]
pub struct TensorDeserializer {
    contexts: Arc<dyn ContextFactory>,
}

impl Default for TensorDeserializer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TensorDeserializer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TensorDeserializer").finish_non_exhaustive()
    }
}

impl TensorDeserializer {
    /// Host-only deserializer.
    pub fn new() -> Self {
        Self {
            contexts: Arc::new(CpuContextFactory),
        }
    }

    /// Uses `contexts` to reach the memory of the records' devices.
    pub fn with_context_factory(mut self, contexts: Arc<dyn ContextFactory>) -> Self {
        self.contexts = contexts;
        self
    }

    /// Allocates the tensor described by `record` and fills the elements of its segment.
    pub fn deserialize(&self, record: &TensorRecord, registry: &BlobRegistry) -> Result<Tensor, Error> {
        let device = record.device()?;
        if is_legacy_empty(record)? {
            log::debug!("Deserializing an empty tensor");
            return Ok(Tensor::empty([0], DType::F32, device));
        }

        let (dtype, elements) = record_layout(record, registry)?;
        let mut tensor = Tensor::empty(record.shape()?, dtype, device);
        self.fill(record, &mut tensor, elements, registry)?;
        Ok(tensor)
    }

    /// Fills the elements of the record's segment into an allocated tensor.
    pub fn deserialize_into(
        &self,
        record: &TensorRecord,
        tensor: &mut Tensor,
        registry: &BlobRegistry,
    ) -> Result<(), Error> {
        self.fill(record, tensor, None, registry)
    }

    fn fill(
        &self,
        record: &TensorRecord,
        tensor: &mut Tensor,
        elements: Option<NestedElements>,
        registry: &BlobRegistry,
    ) -> Result<(), Error> {
        if !tensor.storage_initialized() || !tensor.dtype_initialized() {
            return Err(Error::UninitializedTensor);
        }

        let chunk = Chunk::from_segment(record.segment.as_ref(), tensor.numel())?;
        if let Some(elements) = elements {
            // Nested elements live on the host.
            return elements.store(tensor, chunk);
        }

        let mut context = self.contexts.create_context(&record.device()?)?;
        context.switch_to_device()?;
        decode_chunk(record, tensor, chunk, context.as_mut(), registry)?;
        context.finish_device_computation()?;
        Ok(())
    }
}

impl BlobDeserializer for TensorDeserializer {
    fn deserialize(
        &self,
        record: &BlobRecord,
        blob: &mut Blob,
        registry: &BlobRegistry,
    ) -> Result<(), Error> {
        let tensor_record = record.tensor.as_ref().ok_or_else(|| {
            Error::InvalidRecord(format!("{} record without tensor", record.type_name))
        })?;
        let device = tensor_record.device()?;

        if is_legacy_empty(tensor_record)? {
            log::debug!("Deserializing an empty tensor");
            blob_get_mutable_tensor(blob, Shape::new([0]), DType::F32, device)?;
            return Ok(());
        }

        let (dtype, elements) = record_layout(tensor_record, registry)?;
        let tensor = blob_get_mutable_tensor(blob, tensor_record.shape()?, dtype, device)?;
        self.fill(tensor_record, tensor, elements, registry)
    }
}

/// Rebuilds strings from their opaque-content record.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringDeserializer;

impl BlobDeserializer for StringDeserializer {
    fn deserialize(
        &self,
        record: &BlobRecord,
        blob: &mut Blob,
        _registry: &BlobRegistry,
    ) -> Result<(), Error> {
        let content = record
            .content
            .as_ref()
            .ok_or_else(|| Error::InvalidRecord("string record without content".to_string()))?;
        let value = String::from_utf8(content.to_vec())
            .map_err(|err| Error::InvalidRecord(format!("invalid string content: {err}")))?;

        blob.reset(value);
        Ok(())
    }
}

/// Registry key of the deserializer for `record`.
fn deserializer_key(record: &BlobRecord) -> Result<String, Error> {
    if record.type_name != TENSOR_BLOB_TYPE {
        return Ok(record.type_name.clone());
    }

    let device_type = record
        .tensor
        .as_ref()
        .map_or(Ok(DeviceType::Cpu), |tensor| {
            let tag = tensor.device_detail.device_type;
            DeviceType::from_tag(tag)
                .ok_or_else(|| Error::InvalidRecord(format!("unknown device type {tag}")))
        })?;

    Ok(tensor_deserializer_key(device_type))
}

/// Decodes an envelope record into `blob` with the deserializer registered for its type.
pub fn deserialize_record_into(
    record: &BlobRecord,
    blob: &mut Blob,
    registry: &BlobRegistry,
) -> Result<(), Error> {
    let key = deserializer_key(record).map_err(|err| err.for_blob(&record.name))?;
    let deserializer = registry
        .deserializer(&key)
        .ok_or_else(|| Error::NoDeserializer(key.clone()).for_blob(&record.name))?;

    deserializer
        .deserialize(record, blob, registry)
        .map_err(|err| err.for_blob(&record.name))
}

/// Decodes serialized record bytes into `blob`.
///
/// Successive chunk records of one tensor accumulate into the tensor already held by `blob`.
pub fn deserialize_blob_into(
    bytes: &[u8],
    blob: &mut Blob,
    registry: &BlobRegistry,
) -> Result<(), Error> {
    let record = BlobRecord::decode(bytes)?;
    deserialize_record_into(&record, blob, registry)
}

/// Decodes serialized record bytes into a new blob.
pub fn deserialize_blob(bytes: &[u8], registry: &BlobRegistry) -> Result<Blob, Error> {
    let mut blob = Blob::empty();
    deserialize_blob_into(bytes, &mut blob, registry)?;
    Ok(blob)
}
