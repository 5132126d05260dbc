use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use tensorblob_tensor::{Device, DeviceType, Shape, TensorError};

use crate::Error;

/// Envelope type name of tensor records.
pub const TENSOR_BLOB_TYPE: &str = "Tensor";

/// Envelope type name of string records.
pub const STRING_BLOB_TYPE: &str = "String";

/// Separator between a blob name and its chunk index in chunk record names.
pub const CHUNK_ID_SEPARATOR: &str = "#%";

/// Name under which the chunk starting at `chunk_index * chunk_size` is handed to the sink.
pub fn chunk_name(name: &str, chunk_index: usize) -> String {
    format!("{name}{CHUNK_ID_SEPARATOR}{chunk_index}")
}

/// The outer record: a named, typed container holding opaque content or a tensor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlobRecord {
    /// Name of the blob.
    pub name: String,
    /// Type name selecting the deserializer.
    pub type_name: String,
    /// Opaque payload of non-tensor blobs.
    pub content: Option<ByteBuf>,
    /// Payload of tensor blobs.
    pub tensor: Option<TensorRecord>,
}

impl BlobRecord {
    /// Envelope around a tensor record.
    pub fn tensor(name: &str, tensor: TensorRecord) -> Self {
        Self {
            name: name.to_string(),
            type_name: TENSOR_BLOB_TYPE.to_string(),
            content: None,
            tensor: Some(tensor),
        }
    }

    /// Envelope around opaque content.
    pub fn content(name: &str, type_name: &str, content: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            content: Some(ByteBuf::from(content)),
            tensor: None,
        }
    }
}

/// Half-open range `[begin, end)` of flattened elements covered by a tensor record.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// First element.
    pub begin: i64,
    /// One past the last element.
    pub end: i64,
}

/// Device descriptor stored with every tensor record.
#[derive(new, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceDetail {
    /// Stable device type tag.
    pub device_type: i32,
    /// Device ordinal.
    pub device_id: i32,
}

impl TryFrom<Device> for DeviceDetail {
    type Error = Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        let device_id = i32::try_from(device.index).map_err(|_| {
            Error::InvalidRecord(format!("device index {} does not fit a record", device.index))
        })?;

        Ok(Self {
            device_type: device.device_type.tag(),
            device_id,
        })
    }
}

impl TryFrom<DeviceDetail> for Device {
    type Error = Error;

    fn try_from(detail: DeviceDetail) -> Result<Self, Self::Error> {
        let device_type = DeviceType::from_tag(detail.device_type).ok_or_else(|| {
            Error::InvalidRecord(format!("unknown device type {}", detail.device_type))
        })?;
        let index = u32::try_from(detail.device_id).map_err(|_| {
            Error::InvalidRecord(format!("invalid device id {}", detail.device_id))
        })?;

        Ok(Device::new(device_type, index))
    }
}

/// Element type tags as stored on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DataType {
    /// Element type outside the fixed set, stored as nested records.
    Undefined = 0,
    /// 32-bit float.
    Float = 1,
    /// 32-bit integer.
    Int32 = 2,
    /// Deprecated alias of [Uint8](DataType::Uint8), only found in old records.
    Byte = 3,
    /// String.
    String = 4,
    /// Boolean.
    Bool = 5,
    /// 8-bit unsigned integer.
    Uint8 = 6,
    /// 8-bit integer.
    Int8 = 7,
    /// 16-bit unsigned integer.
    Uint16 = 8,
    /// 16-bit integer.
    Int16 = 9,
    /// 64-bit integer.
    Int64 = 10,
    /// 16-bit float.
    Float16 = 12,
    /// 64-bit float.
    Double = 13,
    /// Identifier hash, handled by a specialized codec.
    ZeroCollisionHash = 14,
    /// Rebatching buffer, handled by a specialized codec.
    RebatchingBuffer = 15,
}

impl DataType {
    /// The integer tag.
    pub const fn tag(self) -> i32 {
        self as i32
    }

    /// Data type matching an integer tag, `None` for values this version does not know.
    pub const fn from_tag(tag: i32) -> Option<Self> {
        Some(match tag {
            0 => Self::Undefined,
            1 => Self::Float,
            2 => Self::Int32,
            3 => Self::Byte,
            4 => Self::String,
            5 => Self::Bool,
            6 => Self::Uint8,
            7 => Self::Int8,
            8 => Self::Uint16,
            9 => Self::Int16,
            10 => Self::Int64,
            12 => Self::Float16,
            13 => Self::Double,
            14 => Self::ZeroCollisionHash,
            15 => Self::RebatchingBuffer,
            _ => return None,
        })
    }
}

/// Serialization format tags. A record without a format uses [DataFormat::Fields].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum DataFormat {
    /// Elements stored in the typed payload fields.
    #[default]
    Fields = 0,
}

impl DataFormat {
    /// The integer tag.
    pub const fn tag(self) -> i32 {
        self as i32
    }

    /// Format matching an integer tag, `None` for formats written by a newer producer.
    pub const fn from_tag(tag: i32) -> Option<Self> {
        match tag {
            0 => Some(Self::Fields),
            _ => None,
        }
    }
}

/// Element payload of a tensor record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum TensorPayload {
    /// No elements.
    #[default]
    Empty,
    /// 32-bit floats.
    Float(Vec<f32>),
    /// 32-bit integers, also the holder of narrow types in the legacy encoding.
    Int32(Vec<i32>),
    /// 64-bit integers.
    Int64(Vec<i64>),
    /// 64-bit floats.
    Double(Vec<f64>),
    /// Strings or nested records.
    Strings(Vec<ByteBuf>),
    /// Raw little-endian element bytes.
    Bytes(ByteBuf),
}

impl TensorPayload {
    /// The float field, empty unless the payload holds floats.
    pub fn float_data(&self) -> &[f32] {
        match self {
            Self::Float(values) => values,
            _ => &[],
        }
    }

    /// The int32 field, empty unless the payload holds int32 values.
    pub fn int32_data(&self) -> &[i32] {
        match self {
            Self::Int32(values) => values,
            _ => &[],
        }
    }

    /// The int64 field, empty unless the payload holds int64 values.
    pub fn int64_data(&self) -> &[i64] {
        match self {
            Self::Int64(values) => values,
            _ => &[],
        }
    }

    /// The double field, empty unless the payload holds doubles.
    pub fn double_data(&self) -> &[f64] {
        match self {
            Self::Double(values) => values,
            _ => &[],
        }
    }

    /// The string field, empty unless the payload holds strings.
    pub fn string_data(&self) -> &[ByteBuf] {
        match self {
            Self::Strings(values) => values,
            _ => &[],
        }
    }

    /// The raw byte field, `None` unless the payload holds bytes.
    pub fn byte_data(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// One chunk of a tensor: full metadata plus the elements of its segment.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TensorRecord {
    /// Name of the tensor.
    pub name: String,
    /// Dimensions of the whole tensor, not only of this chunk.
    pub dims: Vec<i64>,
    /// Element type tag. Kept as an integer so unknown tags survive decoding.
    pub data_type: Option<i32>,
    /// Elements covered by this record, the whole tensor when absent.
    pub segment: Option<Segment>,
    /// Serialization format tag, [DataFormat::Fields] when absent.
    pub data_format: Option<i32>,
    /// Device the tensor lives on.
    pub device_detail: DeviceDetail,
    /// The elements.
    pub payload: TensorPayload,
}

impl TensorRecord {
    /// The element type, `None` if absent or unknown to this version.
    pub fn data_type(&self) -> Option<DataType> {
        self.data_type.and_then(DataType::from_tag)
    }

    /// Returns true if the record declares no element type or an undefined one.
    pub fn is_untyped(&self) -> bool {
        matches!(
            self.data_type.map(DataType::from_tag),
            None | Some(Some(DataType::Undefined))
        )
    }

    /// The serialization format tag, defaulting to the oldest format.
    pub fn data_format_tag(&self) -> i32 {
        self.data_format.unwrap_or(DataFormat::Fields.tag())
    }

    /// Shape of the whole tensor.
    pub fn shape(&self) -> Result<Shape, Error> {
        Ok(Shape::try_from(self.dims.as_slice())?)
    }

    /// Number of elements of the whole tensor.
    pub fn numel(&self) -> Result<usize, Error> {
        let shape = self.shape()?;
        shape
            .try_num_elements()
            .ok_or(Error::Tensor(TensorError::ElementCountOverflow(shape.dims)))
    }

    /// Device the tensor lives on.
    pub fn device(&self) -> Result<Device, Error> {
        Device::try_from(self.device_detail)
    }
}
