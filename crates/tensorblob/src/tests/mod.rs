mod chunking;
mod device;

use std::sync::Mutex;

use tensorblob_tensor::{Blob, DeviceType, Tensor};

use crate::record::{BlobRecord, CHUNK_ID_SEPARATOR, TensorRecord};
use crate::{
    BlobRegistry, ChunkSize, Error, SerializationConfig, SerializationOptions, TensorDeserializer,
    TensorSerializer, deserialize_blob_into, serialize_blob,
};

/// Default codecs, with tensors written under `config`.
fn registry_with(config: SerializationConfig) -> BlobRegistry {
    BlobRegistry::default().with_tensor_codecs(
        TensorSerializer::new().with_config(config),
        TensorDeserializer::new(),
        &[DeviceType::Cpu],
    )
}

fn chunk_index(name: &str) -> usize {
    name.rsplit(CHUNK_ID_SEPARATOR)
        .next()
        .and_then(|index| index.parse().ok())
        .unwrap_or_else(|| panic!("record name {name} has no chunk index"))
}

/// Serializes `blob` and returns the records ordered by chunk index.
fn serialize_records(
    blob: &Blob,
    name: &str,
    chunk_size: ChunkSize,
    registry: &BlobRegistry,
) -> Result<Vec<(String, Vec<u8>)>, Error> {
    let records = Mutex::new(Vec::new());
    let sink = |record: &str, bytes: Vec<u8>| -> Result<(), Error> {
        records.lock().unwrap().push((record.to_string(), bytes));
        Ok(())
    };

    serialize_blob(
        blob,
        name,
        &SerializationOptions::new(chunk_size),
        registry,
        &sink,
    )?;

    let mut records = records.into_inner().unwrap();
    records.sort_by_key(|(record, _)| chunk_index(record));
    Ok(records)
}

fn tensor_record(bytes: &[u8]) -> TensorRecord {
    BlobRecord::decode(bytes)
        .unwrap()
        .tensor
        .expect("tensor record")
}

/// Decodes every record into a single blob.
fn reassemble(records: &[(String, Vec<u8>)], registry: &BlobRegistry) -> Blob {
    let mut blob = Blob::empty();
    for (_, bytes) in records {
        deserialize_blob_into(bytes, &mut blob, registry).unwrap();
    }
    blob
}

/// Serializes then deserializes a tensor.
fn round_trip(tensor: Tensor, chunk_size: ChunkSize, registry: &BlobRegistry) -> (Tensor, Tensor) {
    let blob = Blob::new(tensor);
    let records = serialize_records(&blob, "t", chunk_size, registry).unwrap();
    let restored = reassemble(&records, registry);

    (
        blob.into_inner::<Tensor>().unwrap(),
        restored.into_inner::<Tensor>().unwrap(),
    )
}
