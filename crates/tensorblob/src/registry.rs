use core::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tensorblob_tensor::{DeviceType, Tensor};

use crate::record::STRING_BLOB_TYPE;
use crate::{
    BlobDeserializer, BlobSerializer, SerdeCodec, StringDeserializer, StringSerializer,
    TensorDeserializer, TensorSerializer, tensor_deserializer_key,
};

/// Maps value types to their serializer and record type names to their deserializer.
///
/// Built once and passed by reference to every serialization call.
#[derive(Clone)]
pub struct BlobRegistry {
    serializers: HashMap<TypeId, Arc<dyn BlobSerializer>>,
    deserializers: HashMap<String, Arc<dyn BlobDeserializer>>,
}

impl Default for BlobRegistry {
    /// Host tensors and strings.
    fn default() -> Self {
        Self::empty()
            .with_tensor_codecs(
                TensorSerializer::new(),
                TensorDeserializer::new(),
                &[DeviceType::Cpu],
            )
            .with_serializer::<String>(StringSerializer)
            .with_deserializer(STRING_BLOB_TYPE, StringDeserializer)
    }
}

impl core::fmt::Debug for BlobRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut deserializers: Vec<_> = self.deserializers.keys().collect();
        deserializers.sort();

        f.debug_struct("BlobRegistry")
            .field("serializers", &self.serializers.len())
            .field("deserializers", &deserializers)
            .finish()
    }
}

impl BlobRegistry {
    /// A registry without any codec.
    pub fn empty() -> Self {
        Self {
            serializers: HashMap::new(),
            deserializers: HashMap::new(),
        }
    }

    /// Registers the serializer of values of type `T`, replacing any previous one.
    pub fn with_serializer<T: Any>(mut self, serializer: impl BlobSerializer + 'static) -> Self {
        self.serializers
            .insert(TypeId::of::<T>(), Arc::new(serializer));
        self
    }

    /// Registers the deserializer of records of type `key`, replacing any previous one.
    pub fn with_deserializer(
        mut self,
        key: impl Into<String>,
        deserializer: impl BlobDeserializer + 'static,
    ) -> Self {
        self.deserializers.insert(key.into(), Arc::new(deserializer));
        self
    }

    /// Registers the tensor codecs, reading records of tensors living on `device_types`.
    pub fn with_tensor_codecs(
        self,
        serializer: TensorSerializer,
        deserializer: TensorDeserializer,
        device_types: &[DeviceType],
    ) -> Self {
        let mut registry = self.with_serializer::<Tensor>(serializer);
        for device_type in device_types {
            registry = registry
                .with_deserializer(tensor_deserializer_key(*device_type), deserializer.clone());
        }
        registry
    }

    /// Registers a [SerdeCodec] for values of type `T`, stored under `type_name`.
    pub fn with_serde_codec<T>(self, type_name: &str) -> Self
    where
        T: Serialize + DeserializeOwned + Any + Send + Sync,
    {
        self.with_serializer::<T>(SerdeCodec::<T>::new(type_name))
            .with_deserializer(type_name, SerdeCodec::<T>::new(type_name))
    }

    /// The serializer of values with this type id.
    pub fn serializer(&self, id: TypeId) -> Option<&dyn BlobSerializer> {
        self.serializers.get(&id).map(Arc::as_ref)
    }

    /// The deserializer of records of type `key`.
    pub fn deserializer(&self, key: &str) -> Option<&dyn BlobDeserializer> {
        self.deserializers.get(key).map(Arc::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_codecs() {
        let registry = BlobRegistry::default();

        assert!(registry.serializer(TypeId::of::<Tensor>()).is_some());
        assert!(registry.serializer(TypeId::of::<String>()).is_some());
        assert!(registry.serializer(TypeId::of::<u32>()).is_none());
        assert!(registry.deserializer("TensorCPU").is_some());
        assert!(registry.deserializer("String").is_some());
        assert!(registry.deserializer("TensorCUDA").is_none());
    }

    #[test]
    fn tensor_codecs_per_device_type() {
        let registry = BlobRegistry::empty().with_tensor_codecs(
            TensorSerializer::new(),
            TensorDeserializer::new(),
            &[DeviceType::Cpu, DeviceType::Cuda, DeviceType::Hip],
        );

        for key in ["TensorCPU", "TensorCUDA", "TensorHIP"] {
            assert!(registry.deserializer(key).is_some(), "{key}");
        }
        assert!(registry.deserializer("String").is_none());
    }

    #[test]
    fn debug_lists_record_types() {
        let output = format!("{:?}", BlobRegistry::default());

        assert!(output.contains("\"String\""));
        assert!(output.contains("\"TensorCPU\""));
    }
}
