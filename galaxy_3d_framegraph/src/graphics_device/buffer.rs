/// Buffer trait and buffer descriptor

use crate::error::Result;
use crate::graphics_device::BufferUsage;

/// Descriptor for creating a host-visible buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    /// Size in bytes
    pub size: u64,
    /// Buffer usage
    pub usage: BufferUsage,
}

/// GPU buffer mapped in host memory
pub trait Buffer: Send + Sync {
    /// Size in bytes
    fn size(&self) -> u64;

    /// Copy `data` into the buffer at `offset`
    ///
    /// Fails with `InvalidResource` if the write exceeds the buffer size.
    fn write(&self, offset: u64, data: &[u8]) -> Result<()>;
}
