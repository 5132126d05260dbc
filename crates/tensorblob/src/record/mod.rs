mod base;
mod codec;

pub use base::*;
pub(crate) use codec::bin_config;
