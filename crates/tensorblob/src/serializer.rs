use std::sync::{Arc, Mutex, PoisonError};

use tensorblob_tensor::{Blob, ContextFactory, CpuContextFactory, Tensor};

use crate::chunk::{Chunk, ChunkPlan, ChunkSize};
use crate::format::{data_type_of, encode_chunk, encoding_for};
use crate::record::{
    BlobRecord, DataType, DeviceDetail, STRING_BLOB_TYPE, TensorPayload, TensorRecord, chunk_name,
};
use crate::{BlobRegistry, Error, SerializationConfig, pool, warn};

/// Receives every serialized record, possibly from several threads at once.
pub trait Sink: Sync {
    /// Accepts the record `name` encoded as `bytes`.
    fn accept(&self, name: &str, bytes: Vec<u8>) -> Result<(), Error>;
}

impl<F> Sink for F
where
    F: Fn(&str, Vec<u8>) -> Result<(), Error> + Sync,
{
    fn accept(&self, name: &str, bytes: Vec<u8>) -> Result<(), Error> {
        self(name, bytes)
    }
}

/// Options of a single serialization call.
#[derive(new, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerializationOptions {
    /// How tensors are split into records.
    pub chunk_size: ChunkSize,
}

/// Serializes blobs holding one type of value.
pub trait BlobSerializer: Send + Sync {
    /// Serializes the value held by `blob` under `name`, handing every record to `sink`.
    ///
    /// `registry` resolves the serializers of nested values.
    fn serialize(
        &self,
        blob: &Blob,
        name: &str,
        options: &SerializationOptions,
        registry: &BlobRegistry,
        sink: &dyn Sink,
    ) -> Result<(), Error>;
}

pub(crate) fn type_mismatch<T>(blob: &Blob) -> Error {
    Error::TypeMismatch {
        expected: core::any::type_name::<T>().to_string(),
        actual: blob
            .meta()
            .map_or("<empty>", |meta| meta.name())
            .to_string(),
    }
}

/// Serializes tensors into one record per chunk.
#[derive(Clone)]
pub struct TensorSerializer {
    config: Option<SerializationConfig>,
    contexts: Arc<dyn ContextFactory>,
}

impl Default for TensorSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for TensorSerializer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TensorSerializer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TensorSerializer {
    /// Host-only serializer following the process-wide configuration.
    pub fn new() -> Self {
        Self {
            config: None,
            contexts: Arc::new(CpuContextFactory),
        }
    }

    /// Uses `config` instead of the process-wide configuration.
    pub fn with_config(mut self, config: SerializationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses `contexts` to reach the memory of the tensors' devices.
    pub fn with_context_factory(mut self, contexts: Arc<dyn ContextFactory>) -> Self {
        self.contexts = contexts;
        self
    }

    /// The configuration in effect.
    pub fn config(&self) -> SerializationConfig {
        self.config.unwrap_or_else(SerializationConfig::global)
    }

    /// Serializes `tensor` as records named `<name>#%<chunk index>`.
    ///
    /// Tensors larger than one chunk are encoded by a pool of worker threads; the call returns
    /// once every chunk has reached the sink or the first failure occurred.
    pub fn serialize_tensor(
        &self,
        tensor: &Tensor,
        name: &str,
        options: &SerializationOptions,
        registry: &BlobRegistry,
        sink: &dyn Sink,
    ) -> Result<(), Error> {
        let config = self.config();
        let numel = tensor.numel();
        let chunk_size = options
            .chunk_size
            .resolve(numel, config.chunk_size)
            .map_err(|err| err.for_blob(name))?;
        let plan = ChunkPlan::new(numel, chunk_size);

        log::debug!("Serializing blob {name}");

        let process = |begin: usize| -> Result<(), Error> {
            log::trace!("Starting a chunk at {begin}");
            let record = self.chunk_record(tensor, name, begin, chunk_size, &config, registry)?;
            let bytes = BlobRecord::tensor(name, record).encode()?;
            sink.accept(&chunk_name(name, plan.index_of(begin)), bytes)
        };

        let result = if plan.is_parallel() {
            pool::run_chunks(plan.starts(), config.max_serializer_threads, process)
        } else {
            plan.starts().try_for_each(process)
        };

        result.map_err(|err| err.for_blob(name))
    }

    /// Builds the record of the chunk starting at `begin`, clipped to the tensor.
    pub fn serialize_chunk(
        &self,
        tensor: &Tensor,
        name: &str,
        begin: usize,
        chunk_size: usize,
        registry: &BlobRegistry,
    ) -> Result<TensorRecord, Error> {
        self.chunk_record(tensor, name, begin, chunk_size, &self.config(), registry)
    }

    fn chunk_record(
        &self,
        tensor: &Tensor,
        name: &str,
        begin: usize,
        chunk_size: usize,
        config: &SerializationConfig,
        registry: &BlobRegistry,
    ) -> Result<TensorRecord, Error> {
        let numel = tensor.numel();
        if begin > numel {
            return Err(Error::InvalidRange {
                begin: begin as i64,
                end: begin.saturating_add(chunk_size) as i64,
                numel,
            });
        }
        let chunk = Chunk::new(begin, begin.saturating_add(chunk_size).min(numel));

        if !chunk.is_empty() && !tensor.storage_initialized() {
            return Err(Error::UninitializedStorage);
        }
        if chunk.is_empty() && !tensor.dtype_initialized() {
            warn::empty_untyped_tensor(name);
        }

        let data_type = tensor.dtype().map_or(DataType::Undefined, data_type_of);
        encoding_for(data_type, config)?;
        let device_detail = DeviceDetail::try_from(tensor.device())?;

        let payload = match tensor.data() {
            Some(data) if !chunk.is_empty() => {
                let mut context = self.contexts.create_context(&tensor.device())?;
                context.switch_to_device()?;
                encode_chunk(data, chunk, context.as_mut(), config, registry)?
            }
            _ => TensorPayload::Empty,
        };

        Ok(TensorRecord {
            name: name.to_string(),
            dims: tensor.shape().to_i64_vec(),
            data_type: Some(data_type.tag()),
            segment: Some(chunk.to_segment()),
            data_format: None,
            device_detail,
            payload,
        })
    }
}

impl BlobSerializer for TensorSerializer {
    fn serialize(
        &self,
        blob: &Blob,
        name: &str,
        options: &SerializationOptions,
        registry: &BlobRegistry,
        sink: &dyn Sink,
    ) -> Result<(), Error> {
        let tensor = blob.get::<Tensor>().ok_or_else(|| type_mismatch::<Tensor>(blob))?;
        self.serialize_tensor(tensor, name, options, registry, sink)
    }
}

/// Serializes strings as a single opaque-content record.
#[derive(Debug, Default, Clone, Copy)]
pub struct StringSerializer;

impl BlobSerializer for StringSerializer {
    fn serialize(
        &self,
        blob: &Blob,
        name: &str,
        _options: &SerializationOptions,
        _registry: &BlobRegistry,
        sink: &dyn Sink,
    ) -> Result<(), Error> {
        let value = blob.get::<String>().ok_or_else(|| type_mismatch::<String>(blob))?;
        let record = BlobRecord::content(name, STRING_BLOB_TYPE, value.as_bytes().to_vec());

        sink.accept(name, record.encode()?)
    }
}

/// Serializes the value held by `blob` with the serializer registered for its type.
pub fn serialize_blob(
    blob: &Blob,
    name: &str,
    options: &SerializationOptions,
    registry: &BlobRegistry,
    sink: &dyn Sink,
) -> Result<(), Error> {
    let meta = blob
        .meta()
        .ok_or_else(|| Error::NoSerializer("<empty blob>".to_string()).for_blob(name))?;
    let serializer = registry
        .serializer(meta.id())
        .ok_or_else(|| Error::NoSerializer(meta.name().to_string()).for_blob(name))?;

    serializer
        .serialize(blob, name, options, registry, sink)
        .map_err(|err| err.for_blob(name))
}

/// Serializes the whole value held by `blob` into a single record.
pub fn serialize_blob_to_bytes(
    blob: &Blob,
    name: &str,
    registry: &BlobRegistry,
) -> Result<Vec<u8>, Error> {
    let output = Mutex::new(None);
    let sink = |record: &str, bytes: Vec<u8>| -> Result<(), Error> {
        let mut output = output.lock().unwrap_or_else(PoisonError::into_inner);
        if output.is_some() {
            return Err(Error::Sink {
                name: record.to_string(),
                reason: "expected a single record".to_string(),
            });
        }
        *output = Some(bytes);
        Ok(())
    };

    serialize_blob(
        blob,
        name,
        &SerializationOptions::new(ChunkSize::NoChunking),
        registry,
        &sink,
    )?;

    output
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner)
        .ok_or_else(|| Error::Sink {
            name: name.to_string(),
            reason: "no record was produced".to_string(),
        })
}
