/// Sampler trait and sampler descriptor

use crate::graphics_device::{AddressMode, Filter};

/// Descriptor for creating a sampler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDesc {
    pub mag_filter: Filter,
    pub min_filter: Filter,
    pub address_mode: AddressMode,
    /// Highest mip level the sampler may read
    pub max_lod: f32,
    /// `None` disables anisotropic filtering
    pub max_anisotropy: Option<f32>,
}

/// Sampler object
pub trait Sampler: Send + Sync {
    fn desc(&self) -> &SamplerDesc;
}
