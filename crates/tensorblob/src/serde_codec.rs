use core::any::Any;
use core::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tensorblob_tensor::Blob;

use crate::record::{BlobRecord, bin_config};
use crate::serializer::type_mismatch;
use crate::{BlobDeserializer, BlobRegistry, BlobSerializer, Error, SerializationOptions, Sink};

/// Stores a serde value as the binary content of a single record.
///
/// Registering one for a custom type lets tensors of that type be serialized as nested records.
pub struct SerdeCodec<T> {
    type_name: String,
    _value: PhantomData<fn() -> T>,
}

impl<T> SerdeCodec<T> {
    /// Codec writing records of type `type_name`.
    pub fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            _value: PhantomData,
        }
    }
}

impl<T> BlobSerializer for SerdeCodec<T>
where
    T: Serialize + Any + Send + Sync,
{
    fn serialize(
        &self,
        blob: &Blob,
        name: &str,
        _options: &SerializationOptions,
        _registry: &BlobRegistry,
        sink: &dyn Sink,
    ) -> Result<(), Error> {
        let value = blob.get::<T>().ok_or_else(|| type_mismatch::<T>(blob))?;
        let content = bincode::serde::encode_to_vec(value, bin_config())
            .map_err(|err| Error::Encode(err.to_string()))?;

        sink.accept(name, BlobRecord::content(name, &self.type_name, content).encode()?)
    }
}

impl<T> BlobDeserializer for SerdeCodec<T>
where
    T: DeserializeOwned + Any + Send + Sync,
{
    fn deserialize(
        &self,
        record: &BlobRecord,
        blob: &mut Blob,
        _registry: &BlobRegistry,
    ) -> Result<(), Error> {
        let content = record.content.as_ref().ok_or_else(|| {
            Error::InvalidRecord(format!("{} record without content", self.type_name))
        })?;
        let (value, _): (T, usize) = bincode::serde::decode_from_slice(content, bin_config())
            .map_err(|err| Error::Decode(format!("Cannot parse {} content: {err}", self.type_name)))?;

        blob.reset(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deserialize_blob, serialize_blob_to_bytes};
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Anchor {
        label: String,
        offset: (i32, i32),
    }

    #[test]
    fn value_survives_a_record() {
        let registry = BlobRegistry::default().with_serde_codec::<Anchor>("Anchor");
        let anchor = Anchor {
            label: "origin".into(),
            offset: (-3, 4),
        };

        let bytes = serialize_blob_to_bytes(&Blob::new(anchor.clone()), "a", &registry).unwrap();
        let blob = deserialize_blob(&bytes, &registry).unwrap();

        assert_eq!(blob.get::<Anchor>(), Some(&anchor));
    }

    #[test]
    fn missing_content_is_invalid() {
        let registry = BlobRegistry::default().with_serde_codec::<Anchor>("Anchor");
        let record = BlobRecord {
            name: "a".into(),
            type_name: "Anchor".into(),
            ..Default::default()
        };

        let err = deserialize_blob(&record.encode().unwrap(), &registry).unwrap_err();
        assert!(matches!(err.root(), Error::InvalidRecord(_)));
    }
}
