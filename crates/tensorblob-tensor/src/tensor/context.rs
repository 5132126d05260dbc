use super::{ContextError, Device};

/// Capability interface used to move bytes between a tensor's memory and host buffers.
///
/// Copies may be asynchronous on accelerators: the data is only guaranteed to be visible once
/// [finish_device_computation](DeviceContext::finish_device_computation) returns.
pub trait DeviceContext: Send {
    /// Makes the context's device current for the calling thread.
    fn switch_to_device(&mut self) -> Result<(), ContextError>;

    /// Copies device memory `src` into the host buffer `dst`.
    fn copy_bytes_to_host(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(), ContextError>;

    /// Copies the host buffer `src` into device memory `dst`.
    fn copy_bytes_from_host(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(), ContextError>;

    /// Blocks until every pending copy issued through this context has completed.
    fn finish_device_computation(&mut self) -> Result<(), ContextError>;
}

/// Creates a [DeviceContext] for a device.
pub trait ContextFactory: Send + Sync {
    /// Creates a context bound to `device`.
    fn create_context(&self, device: &Device) -> Result<Box<dyn DeviceContext>, ContextError>;
}

/// Host context: every copy is a synchronous memcpy.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuContext;

impl DeviceContext for CpuContext {
    fn switch_to_device(&mut self) -> Result<(), ContextError> {
        Ok(())
    }

    fn copy_bytes_to_host(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(), ContextError> {
        copy_checked(src, dst)
    }

    fn copy_bytes_from_host(&mut self, src: &[u8], dst: &mut [u8]) -> Result<(), ContextError> {
        copy_checked(src, dst)
    }

    fn finish_device_computation(&mut self) -> Result<(), ContextError> {
        Ok(())
    }
}

/// Factory that only knows about host memory.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuContextFactory;

impl ContextFactory for CpuContextFactory {
    fn create_context(&self, device: &Device) -> Result<Box<dyn DeviceContext>, ContextError> {
        if device.is_cpu() {
            Ok(Box::new(CpuContext))
        } else {
            Err(ContextError::UnsupportedDevice(device.to_string()))
        }
    }
}

/// Same-size byte copy shared by context implementations.
pub fn copy_checked(src: &[u8], dst: &mut [u8]) -> Result<(), ContextError> {
    if src.len() != dst.len() {
        return Err(ContextError::CopySizeMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    dst.copy_from_slice(src);
    Ok(())
}
