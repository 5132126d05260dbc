mod base;
mod context;
mod data;
mod device;
mod dtype;
mod element;
mod error;
mod shape;

pub use base::*;
pub use context::*;
pub use data::*;
pub use device::*;
pub use dtype::*;
pub use element::*;
pub use error::*;
pub use shape::*;
