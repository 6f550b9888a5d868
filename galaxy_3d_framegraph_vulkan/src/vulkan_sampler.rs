/// Sampler - Vulkan implementation of the Sampler trait

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::render::{Sampler as RendererSampler, SamplerDesc};
use galaxy_3d_framegraph::galaxy3d::Result;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{address_mode_to_vk, filter_to_vk, mipmap_mode_to_vk, vk_err};

pub struct Sampler {
    ctx: Arc<GpuContext>,
    pub(crate) sampler: vk::Sampler,
    desc: SamplerDesc,
}

impl Sampler {
    /// Create a sampler; anisotropy is clamped to the device limit and
    /// disabled when the feature is missing
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &SamplerDesc) -> Result<Self> {
        let (features, limits) = unsafe {
            (
                ctx.instance.get_physical_device_features(ctx.physical_device),
                ctx.instance.get_physical_device_properties(ctx.physical_device).limits,
            )
        };
        let anisotropy = desc
            .max_anisotropy
            .filter(|_| features.sampler_anisotropy == vk::TRUE)
            .map(|a| a.clamp(1.0, limits.max_sampler_anisotropy));

        let address = address_mode_to_vk(desc.address_mode);
        let create_info = vk::SamplerCreateInfo::default()
            .mag_filter(filter_to_vk(desc.mag_filter))
            .min_filter(filter_to_vk(desc.min_filter))
            .mipmap_mode(mipmap_mode_to_vk(desc.min_filter))
            .address_mode_u(address)
            .address_mode_v(address)
            .address_mode_w(address)
            .anisotropy_enable(anisotropy.is_some())
            .max_anisotropy(anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::FLOAT_OPAQUE_BLACK)
            .min_lod(0.0)
            .max_lod(desc.max_lod)
            .compare_enable(false);

        let sampler = unsafe {
            ctx.device
                .create_sampler(&create_info, None)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_sampler"))?
        };
        Ok(Self { ctx, sampler, desc: *desc })
    }
}

impl RendererSampler for Sampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_sampler(self.sampler, None);
        }
    }
}
