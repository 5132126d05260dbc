use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tensorblob_tensor::{
    Blob, ContextError, ContextFactory, CpuContext, Device, DeviceContext, DeviceType, Tensor,
    TensorData, copy_checked,
};

use super::{reassemble, serialize_records, tensor_record};
use crate::record::DeviceDetail;
use crate::{
    BlobRegistry, ChunkSize, Error, SerializationConfig, TensorDeserializer, TensorSerializer,
};

#[derive(Default)]
struct Counters {
    contexts: AtomicUsize,
    switches: AtomicUsize,
    copies: AtomicUsize,
    finishes: AtomicUsize,
}

/// Accelerator memory simulated in host buffers, recording every context call.
struct SimulatedAccelerator {
    counters: Arc<Counters>,
}

impl DeviceContext for SimulatedAccelerator {
    fn switch_to_device(&mut self) -> Result<(), ContextError> {
        self.counters.switches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn copy_bytes_to_host(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(), ContextError> {
        self.counters.copies.fetch_add(1, Ordering::Relaxed);
        copy_checked(src, dst)
    }

    fn copy_bytes_from_host(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(), ContextError> {
        self.counters.copies.fetch_add(1, Ordering::Relaxed);
        copy_checked(src, dst)
    }

    fn finish_device_computation(&mut self) -> Result<(), ContextError> {
        self.counters.finishes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

struct SimulatedFactory {
    counters: Arc<Counters>,
}

impl ContextFactory for SimulatedFactory {
    fn create_context(&self, device: &Device) -> Result<Box<dyn DeviceContext>, ContextError> {
        match device.device_type {
            DeviceType::Cpu => Ok(Box::new(CpuContext)),
            DeviceType::Cuda => {
                self.counters.contexts.fetch_add(1, Ordering::Relaxed);
                Ok(Box::new(SimulatedAccelerator {
                    counters: self.counters.clone(),
                }))
            }
            DeviceType::Hip => Err(ContextError::Device("no HIP runtime".to_string())),
        }
    }
}

fn accelerator_registry(counters: &Arc<Counters>) -> BlobRegistry {
    let contexts: Arc<dyn ContextFactory> = Arc::new(SimulatedFactory {
        counters: counters.clone(),
    });

    BlobRegistry::default().with_tensor_codecs(
        TensorSerializer::new()
            .with_config(SerializationConfig::new())
            .with_context_factory(contexts.clone()),
        TensorDeserializer::new().with_context_factory(contexts),
        &[DeviceType::Cpu, DeviceType::Cuda],
    )
}

fn cuda_tensor(values: Vec<f32>, shape: [usize; 2]) -> Tensor {
    Tensor::from_data(shape, TensorData::F32(values), Device::new(DeviceType::Cuda, 1)).unwrap()
}

#[test]
fn accelerator_tensor_round_trips_on_its_device() {
    let counters = Arc::new(Counters::default());
    let registry = accelerator_registry(&counters);
    let values: Vec<f32> = (0..6).map(|i| i as f32 / 2.0).collect();
    let blob = Blob::new(cuda_tensor(values.clone(), [2, 3]));

    let records = serialize_records(&blob, "gpu", ChunkSize::Elements(4), &registry).unwrap();

    assert_eq!(records.len(), 2);
    for (_, bytes) in &records {
        assert_eq!(tensor_record(bytes).device_detail, DeviceDetail::new(1, 1));
    }
    let written = counters.contexts.load(Ordering::Relaxed);
    assert_eq!(written, 2);
    assert_eq!(counters.switches.load(Ordering::Relaxed), 2);

    let restored = reassemble(&records, &registry);
    let tensor = restored.get::<Tensor>().unwrap();
    assert_eq!(tensor.device(), Device::new(DeviceType::Cuda, 1));
    assert_eq!(tensor.as_slice::<f32>().unwrap(), values.as_slice());

    assert_eq!(counters.contexts.load(Ordering::Relaxed), written + 2);
    assert_eq!(counters.switches.load(Ordering::Relaxed), 4);
    assert!(counters.copies.load(Ordering::Relaxed) >= 4);
    assert!(counters.finishes.load(Ordering::Relaxed) >= 4);
}

#[test]
fn host_only_serializer_rejects_accelerator_tensors() {
    let blob = Blob::new(cuda_tensor(vec![1.0; 4], [2, 2]));

    let err = serialize_records(&blob, "gpu", ChunkSize::Default, &BlobRegistry::default())
        .unwrap_err();

    assert!(matches!(
        err.root(),
        Error::Context(ContextError::UnsupportedDevice(device)) if device == "CUDA:1"
    ));
}

#[test]
fn device_failure_aborts_the_call() {
    let counters = Arc::new(Counters::default());
    let registry = accelerator_registry(&counters);
    let tensor =
        Tensor::from_data([3], TensorData::F32(vec![0.0; 3]), Device::new(DeviceType::Hip, 0))
            .unwrap();

    let err = serialize_records(&Blob::new(tensor), "hip", ChunkSize::Elements(1), &registry)
        .unwrap_err();

    assert!(matches!(err.root(), Error::Context(ContextError::Device(_))));
    assert!(err.to_string().starts_with("Blob hip:"));
}
