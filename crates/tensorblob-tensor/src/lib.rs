#![warn(missing_docs)]

//! # Tensorblob Tensor
//!
//! The host-side tensor model consumed by the `tensorblob` serializer: shapes, element types,
//! typed storage, devices and the device context used to move bytes between a tensor's memory
//! and host buffers.

#[macro_use]
extern crate derive_new;

mod blob;
mod tensor;

pub use blob::*;
pub use tensor::*;

pub use half::f16;
