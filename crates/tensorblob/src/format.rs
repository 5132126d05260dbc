use half::f16;
use serde_bytes::ByteBuf;
use tensorblob_tensor::{Blob, DType, DeviceContext, Tensor, TensorData, TypeMeta};

use crate::chunk::Chunk;
use crate::record::{DataFormat, DataType, TensorPayload, TensorRecord};
use crate::transfer::{
    HolderCast, check_len, copy_as_is, copy_from_as_is, copy_from_bytes, copy_from_with_cast,
    copy_to_bytes, copy_with_cast, native_bytes_portable,
};
use crate::{BlobRegistry, Error, SerializationConfig};

/// Wire encoding selected for the elements of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// The float field.
    Float,
    /// The int32 field.
    Int32,
    /// The int64 field.
    Int64,
    /// The double field.
    Double,
    /// Raw little-endian bytes.
    Bytes,
    /// Narrow elements widened into the int32 field.
    Int32Holder,
    /// The string field.
    Strings,
    /// One nested blob record per element in the string field.
    Nested,
}

/// Wire tag of an in-memory element type. Element types outside the fixed set are undefined.
pub fn data_type_of(dtype: DType) -> DataType {
    match dtype {
        DType::F64 => DataType::Double,
        DType::F32 => DataType::Float,
        DType::F16 => DataType::Float16,
        DType::I64 => DataType::Int64,
        DType::I32 => DataType::Int32,
        DType::I16 => DataType::Int16,
        DType::I8 => DataType::Int8,
        DType::U16 => DataType::Uint16,
        DType::U8 => DataType::Uint8,
        DType::Bool => DataType::Bool,
        DType::String => DataType::String,
        DType::Opaque(_) => DataType::Undefined,
    }
}

/// In-memory element type of a wire tag.
///
/// Undefined elements carry their type in the nested records, and the specialized types have no
/// in-memory counterpart here.
pub fn dtype_of(data_type: DataType) -> Result<Option<DType>, Error> {
    Ok(Some(match data_type {
        DataType::Float => DType::F32,
        DataType::Int32 => DType::I32,
        DataType::Byte | DataType::Uint8 => DType::U8,
        DataType::String => DType::String,
        DataType::Bool => DType::Bool,
        DataType::Int8 => DType::I8,
        DataType::Uint16 => DType::U16,
        DataType::Int16 => DType::I16,
        DataType::Int64 => DType::I64,
        DataType::Float16 => DType::F16,
        DataType::Double => DType::F64,
        DataType::Undefined => return Ok(None),
        DataType::ZeroCollisionHash | DataType::RebatchingBuffer => {
            return Err(specialized(data_type));
        }
    }))
}

/// Returns true if elements of `data_type` are written as raw bytes under `config`.
///
/// Multi-byte elements are only eligible on little-endian hosts.
pub fn enable_byte_encoding(
    data_type: DataType,
    element_size: usize,
    config: &SerializationConfig,
) -> bool {
    native_bytes_portable(element_size)
        && (config.bytes_as_holder || (data_type == DataType::Float16 && config.fp16_as_bytes))
}

/// Encoding used to write elements of `data_type`.
pub fn encoding_for(data_type: DataType, config: &SerializationConfig) -> Result<Encoding, Error> {
    let narrow = |size: usize| {
        if enable_byte_encoding(data_type, size, config) {
            Encoding::Bytes
        } else {
            Encoding::Int32Holder
        }
    };

    Ok(match data_type {
        DataType::Float => Encoding::Float,
        DataType::Int32 => Encoding::Int32,
        DataType::Int64 => Encoding::Int64,
        DataType::Double => Encoding::Double,
        DataType::Bool | DataType::Uint8 | DataType::Int8 => narrow(1),
        DataType::Uint16 | DataType::Int16 | DataType::Float16 => narrow(2),
        DataType::String => Encoding::Strings,
        DataType::Undefined => Encoding::Nested,
        DataType::Byte => {
            return Err(Error::UnsupportedDataType {
                data_type,
                message: "BYTE is deprecated for serialization, UINT8 is written instead",
            });
        }
        DataType::ZeroCollisionHash | DataType::RebatchingBuffer => {
            return Err(specialized(data_type));
        }
    })
}

fn specialized(data_type: DataType) -> Error {
    let message = match data_type {
        DataType::ZeroCollisionHash => {
            "Zero collision hash tensors are handled by a specialized serializer"
        }
        _ => "Rebatching buffer tensors are handled by a specialized serializer",
    };

    Error::UnsupportedDataType { data_type, message }
}

/// Encodes the elements of `chunk`.
///
/// Nested records of opaque elements are produced through `registry`.
pub fn encode_chunk(
    data: &TensorData,
    chunk: Chunk,
    context: &mut dyn DeviceContext,
    config: &SerializationConfig,
    registry: &BlobRegistry,
) -> Result<TensorPayload, Error> {
    let encoding = encoding_for(data_type_of(data.dtype()), config)?;
    let range = chunk.begin..chunk.end;

    Ok(match data {
        TensorData::F32(values) => TensorPayload::Float(copy_as_is(context, &values[range])?),
        TensorData::I32(values) => TensorPayload::Int32(copy_as_is(context, &values[range])?),
        TensorData::I64(values) => TensorPayload::Int64(copy_as_is(context, &values[range])?),
        TensorData::F64(values) => TensorPayload::Double(copy_as_is(context, &values[range])?),
        TensorData::Bool(values) => encode_narrow(context, &values[range], encoding)?,
        TensorData::U8(values) => encode_narrow(context, &values[range], encoding)?,
        TensorData::I8(values) => encode_narrow(context, &values[range], encoding)?,
        TensorData::U16(values) => encode_narrow(context, &values[range], encoding)?,
        TensorData::I16(values) => encode_narrow(context, &values[range], encoding)?,
        TensorData::F16(values) => encode_narrow(context, &values[range], encoding)?,
        TensorData::String(values) => TensorPayload::Strings(
            values[range]
                .iter()
                .map(|value| ByteBuf::from(value.as_bytes().to_vec()))
                .collect(),
        ),
        TensorData::Opaque { values, .. } => TensorPayload::Strings(
            values[range]
                .iter()
                .map(|value| crate::serialize_blob_to_bytes(value, "", registry).map(ByteBuf::from))
                .collect::<Result<_, _>>()?,
        ),
    })
}

fn encode_narrow<E: HolderCast>(
    context: &mut dyn DeviceContext,
    values: &[E],
    encoding: Encoding,
) -> Result<TensorPayload, Error> {
    match encoding {
        Encoding::Bytes => Ok(TensorPayload::Bytes(ByteBuf::from(copy_to_bytes(
            context, values,
        )?))),
        _ => Ok(TensorPayload::Int32(copy_with_cast(context, values)?)),
    }
}

/// Decodes the elements of `record` into `chunk` of `tensor`.
pub fn decode_chunk(
    record: &TensorRecord,
    tensor: &mut Tensor,
    chunk: Chunk,
    context: &mut dyn DeviceContext,
    registry: &BlobRegistry,
) -> Result<(), Error> {
    let data_type = record
        .data_type()
        .ok_or(Error::UnrecognizedDataType(record.data_type))?;
    let format = record.data_format_tag();
    let (begin, len) = (chunk.begin, chunk.len());
    let payload = &record.payload;

    match data_type {
        DataType::Float => {
            require_fields(format, "float data")?;
            let dst = tensor.mutable_range::<f32>(begin, len)?;
            copy_from_as_is(context, "float_data", payload.float_data(), dst)
        }
        DataType::Int32 => {
            require_fields(format, "int32 data")?;
            let dst = tensor.mutable_range::<i32>(begin, len)?;
            copy_from_as_is(context, "int32_data", payload.int32_data(), dst)
        }
        DataType::Int64 => {
            require_fields(format, "int64 data")?;
            let dst = tensor.mutable_range::<i64>(begin, len)?;
            copy_from_as_is(context, "int64_data", payload.int64_data(), dst)
        }
        DataType::Double => {
            require_fields(format, "double data")?;
            let dst = tensor.mutable_range::<f64>(begin, len)?;
            copy_from_as_is(context, "double_data", payload.double_data(), dst)
        }
        DataType::Bool => decode_narrow::<bool>(format, payload, tensor, chunk, context),
        DataType::Uint8 => decode_narrow::<u8>(format, payload, tensor, chunk, context),
        DataType::Int8 => decode_narrow::<i8>(format, payload, tensor, chunk, context),
        DataType::Uint16 => decode_narrow::<u16>(format, payload, tensor, chunk, context),
        DataType::Int16 => decode_narrow::<i16>(format, payload, tensor, chunk, context),
        DataType::Float16 => decode_narrow::<f16>(format, payload, tensor, chunk, context),
        DataType::String => {
            require_fields(format, "string data")?;
            let values = payload.string_data();
            check_len("string_data", values.len(), len)?;
            let dst = tensor.mutable_strings(begin, len)?;
            for (slot, value) in dst.iter_mut().zip(values) {
                *slot = String::from_utf8(value.to_vec())
                    .map_err(|err| Error::InvalidRecord(format!("invalid string element: {err}")))?;
            }
            Ok(())
        }
        DataType::Byte => {
            if DataFormat::from_tag(format) != Some(DataFormat::Fields) {
                return Err(Error::UnsupportedFormat {
                    format,
                    reason: "BYTE data type is only found in the default data format",
                });
            }
            let dst = tensor.mutable_range::<u8>(begin, len)?;
            copy_from_bytes(context, payload.byte_data().unwrap_or_default(), dst)
        }
        DataType::Undefined => {
            check_len("string_data", payload.string_data().len(), len)?;
            if chunk.is_empty() {
                return Ok(());
            }
            NestedElements::decode(payload, registry)?.store(tensor, chunk)
        }
        DataType::ZeroCollisionHash | DataType::RebatchingBuffer => Err(specialized(data_type)),
    }
}

fn require_fields(format: i32, reason: &'static str) -> Result<(), Error> {
    match DataFormat::from_tag(format) {
        Some(DataFormat::Fields) => Ok(()),
        None => Err(Error::UnsupportedFormat { format, reason }),
    }
}

fn decode_narrow<E: HolderCast>(
    format: i32,
    payload: &TensorPayload,
    tensor: &mut Tensor,
    chunk: Chunk,
    context: &mut dyn DeviceContext,
) -> Result<(), Error> {
    require_fields(format, "narrow integer data")?;
    let dst = tensor.mutable_range::<E>(chunk.begin, chunk.len())?;

    match payload.byte_data() {
        Some(bytes) => {
            if !native_bytes_portable(core::mem::size_of::<E>()) {
                return Err(Error::BigEndian);
            }
            copy_from_bytes(context, bytes, dst)
        }
        None => copy_from_with_cast(context, payload.int32_data(), dst),
    }
}

/// The elements of an undefined-type record, decoded from their nested records.
#[derive(Debug)]
pub struct NestedElements {
    meta: TypeMeta,
    blobs: Vec<Blob>,
}

impl NestedElements {
    /// Decodes every nested record of `payload`.
    ///
    /// All elements must decode to the type of the first one, which gives the element type of
    /// the tensor.
    pub fn decode(payload: &TensorPayload, registry: &BlobRegistry) -> Result<Self, Error> {
        let nested = payload.string_data();
        if nested.is_empty() {
            return Err(Error::SizeMismatch {
                field: "string_data",
                expected: 1,
                actual: 0,
            });
        }

        let blobs = nested
            .iter()
            .map(|bytes| crate::deserialize_blob(bytes, registry))
            .collect::<Result<Vec<Blob>, _>>()?;
        let meta = element_meta(&blobs[0])?;

        for blob in &blobs[1..] {
            let actual = element_meta(blob)?;
            if actual != meta {
                return Err(Error::TypeMismatch {
                    expected: meta.name().to_string(),
                    actual: actual.name().to_string(),
                });
            }
        }

        Ok(Self { meta, blobs })
    }

    /// Type of every element.
    pub fn meta(&self) -> TypeMeta {
        self.meta
    }

    /// Moves the elements into `chunk` of `tensor`.
    pub fn store(self, tensor: &mut Tensor, chunk: Chunk) -> Result<(), Error> {
        check_len("string_data", self.blobs.len(), chunk.len())?;

        let dst = tensor.mutable_blobs(self.meta, chunk.begin, chunk.len())?;
        for (slot, blob) in dst.iter_mut().zip(self.blobs) {
            *slot = blob;
        }

        Ok(())
    }
}

/// Type of a decoded nested element.
fn element_meta(blob: &Blob) -> Result<TypeMeta, Error> {
    blob.meta()
        .ok_or_else(|| Error::InvalidRecord("nested element decoded to an empty blob".to_string()))
}
