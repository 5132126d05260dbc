use std::collections::HashSet;
use std::sync::Mutex;

use rstest::rstest;
use serial_test::serial;
use tensorblob_tensor::{Blob, DType, Device, Tensor};

use super::{reassemble, registry_with, serialize_records, tensor_record};
use crate::record::{Segment, TensorPayload};
use crate::{
    BlobRegistry, ChunkSize, Error, SerializationConfig, SerializationOptions, TensorDeserializer,
    TensorSerializer,
};

#[test]
fn three_by_four_floats_in_chunks_of_five() {
    let registry = registry_with(SerializationConfig::new());
    let values: Vec<f32> = (0..12).map(|i| i as f32).collect();
    let blob = Blob::new(Tensor::from_vec(values.clone(), [3, 4]).unwrap());

    let records = serialize_records(&blob, "w", ChunkSize::Elements(5), &registry).unwrap();

    let names: Vec<_> = records.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["w#%0", "w#%1", "w#%2"]);

    let mut concatenated = Vec::new();
    for ((_, bytes), expected) in records
        .iter()
        .zip([Segment::new(0, 5), Segment::new(5, 10), Segment::new(10, 12)])
    {
        let record = tensor_record(bytes);
        assert_eq!(record.dims, vec![3, 4]);
        assert_eq!(record.segment, Some(expected));

        let chunk = TensorDeserializer::new()
            .deserialize(&record, &registry)
            .unwrap();
        let range = expected.begin as usize..expected.end as usize;
        concatenated.extend_from_slice(&chunk.as_slice::<f32>().unwrap()[range]);
    }
    assert_eq!(concatenated, values);

    let restored = reassemble(&records, &registry);
    let restored = restored.get::<Tensor>().unwrap();
    assert_eq!(restored.dims(), &[3, 4]);
    assert_eq!(restored.as_slice::<f32>().unwrap(), values.as_slice());
}

#[rstest]
#[case(100, 7)]
#[case(100, 10)]
#[case(100, 99)]
#[case(5, 1)]
fn segments_partition_the_tensor(#[case] numel: usize, #[case] chunk_size: usize) {
    let registry = registry_with(SerializationConfig::new().with_max_serializer_threads(4));
    let values: Vec<i32> = (0..numel as i32).collect();
    let blob = Blob::new(Tensor::from_vec(values, [numel]).unwrap());

    let records =
        serialize_records(&blob, "p", ChunkSize::Elements(chunk_size), &registry).unwrap();

    assert_eq!(records.len(), numel.div_ceil(chunk_size));
    let mut next = 0;
    for (index, (name, bytes)) in records.iter().enumerate() {
        assert_eq!(name, &format!("p#%{index}"));
        let segment = tensor_record(bytes).segment.unwrap();
        assert_eq!(segment.begin, next);
        assert!(segment.end > segment.begin);
        next = segment.end;
    }
    assert_eq!(next, numel as i64);
}

#[test]
fn out_of_order_chunks_accumulate_into_one_tensor() {
    let registry = registry_with(SerializationConfig::new());
    let values: Vec<i64> = (0..20).map(|i| i * i).collect();
    let blob = Blob::new(Tensor::from_vec(values.clone(), [4, 5]).unwrap());

    let mut records = serialize_records(&blob, "acc", ChunkSize::Elements(3), &registry).unwrap();
    records.reverse();

    let restored = reassemble(&records, &registry);
    assert_eq!(
        restored.get::<Tensor>().unwrap().as_slice::<i64>().unwrap(),
        values.as_slice()
    );
}

#[test]
fn chunk_of_another_layout_replaces_the_blob_tensor() {
    let registry = registry_with(SerializationConfig::new());
    let first = Blob::new(Tensor::from_vec(vec![1.0f32; 4], [4]).unwrap());
    let second = Blob::new(Tensor::from_vec(vec![7i32; 6], [2, 3]).unwrap());

    let mut records = serialize_records(&first, "a", ChunkSize::NoChunking, &registry).unwrap();
    records.extend(serialize_records(&second, "a", ChunkSize::NoChunking, &registry).unwrap());

    let restored = reassemble(&records, &registry);
    let tensor = restored.get::<Tensor>().unwrap();
    assert_eq!(tensor.dims(), &[2, 3]);
    assert_eq!(tensor.as_slice::<i32>().unwrap(), &[7; 6]);
}

#[test]
fn parallel_chunks_reach_a_concurrent_sink_once() {
    let serializer = TensorSerializer::new()
        .with_config(SerializationConfig::new().with_max_serializer_threads(8));
    let tensor = Tensor::from_vec((0..10_000).map(|i| i as f64).collect(), [100, 100]).unwrap();
    let names = Mutex::new(Vec::new());
    let threads = Mutex::new(HashSet::new());
    let sink = |name: &str, _bytes: Vec<u8>| -> Result<(), Error> {
        names.lock().unwrap().push(name.to_string());
        threads.lock().unwrap().insert(std::thread::current().id());
        Ok(())
    };

    serializer
        .serialize_tensor(
            &tensor,
            "big",
            &SerializationOptions::new(ChunkSize::Elements(64)),
            &BlobRegistry::default(),
            &sink,
        )
        .unwrap();

    let names = names.into_inner().unwrap();
    let unique: HashSet<_> = names.iter().cloned().collect();
    assert_eq!(names.len(), 10_000usize.div_ceil(64));
    assert_eq!(unique.len(), names.len());
    assert!(unique.contains("big#%156"));
    assert!(!threads.into_inner().unwrap().contains(&std::thread::current().id()));
}

#[test]
fn small_tensor_is_serialized_on_the_calling_thread() {
    let serializer = TensorSerializer::new().with_config(SerializationConfig::new());
    let tensor = Tensor::from_vec(vec![1u8, 2, 3], [3]).unwrap();
    let caller = std::thread::current().id();
    let sink = |_name: &str, _bytes: Vec<u8>| -> Result<(), Error> {
        assert_eq!(std::thread::current().id(), caller);
        Ok(())
    };

    serializer
        .serialize_tensor(
            &tensor,
            "small",
            &SerializationOptions::new(ChunkSize::Elements(3)),
            &BlobRegistry::default(),
            &sink,
        )
        .unwrap();
}

#[rstest]
#[case(vec![2, 0, 3])]
#[case(vec![0])]
fn empty_shape_yields_one_record(#[case] dims: Vec<usize>) {
    let registry = registry_with(SerializationConfig::new());
    let blob = Blob::new(Tensor::empty(dims.clone(), DType::F32, Device::cpu()));

    let records = serialize_records(&blob, "e", ChunkSize::Elements(4), &registry).unwrap();

    assert_eq!(records.len(), 1);
    let record = tensor_record(&records[0].1);
    assert_eq!(record.segment, Some(Segment::new(0, 0)));
    assert_eq!(
        record.dims,
        dims.iter().map(|dim| *dim as i64).collect::<Vec<_>>()
    );
    assert_eq!(record.payload, TensorPayload::Empty);

    let restored = reassemble(&records, &registry);
    assert_eq!(restored.get::<Tensor>().unwrap().dims(), dims.as_slice());
}

#[test]
fn empty_declared_int64_tensor_round_trips() {
    let registry = registry_with(SerializationConfig::new());
    let blob = Blob::new(Tensor::declared([0], DType::I64, Device::cpu()));

    let records = serialize_records(&blob, "z", ChunkSize::Default, &registry).unwrap();

    assert_eq!(records.len(), 1);
    let record = tensor_record(&records[0].1);
    assert_eq!(record.dims, vec![0]);
    assert!(record.payload.int64_data().is_empty());

    let restored = reassemble(&records, &registry);
    let tensor = restored.get::<Tensor>().unwrap();
    assert_eq!(tensor.dims(), &[0]);
    assert_eq!(tensor.dtype(), Some(DType::I64));
    assert!(tensor.as_slice::<i64>().unwrap().is_empty());
}

#[test]
#[serial]
fn default_chunk_size_follows_the_global_config() {
    let previous = SerializationConfig::set_global(SerializationConfig::new().with_chunk_size(5));
    let blob = Blob::new(Tensor::from_vec(vec![0i16; 12], [12]).unwrap());

    let records = serialize_records(&blob, "g", ChunkSize::Default, &BlobRegistry::default());
    SerializationConfig::set_global(previous);

    assert_eq!(records.unwrap().len(), 3);
}

#[test]
fn zero_chunk_size_is_rejected() {
    let registry = registry_with(SerializationConfig::new());
    let blob = Blob::new(Tensor::from_vec(vec![1.0f32], [1]).unwrap());

    let err = serialize_records(&blob, "c", ChunkSize::Elements(0), &registry).unwrap_err();

    assert!(matches!(err.root(), Error::InvalidChunkSize));
}
