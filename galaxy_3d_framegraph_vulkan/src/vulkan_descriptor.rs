/// Descriptor layouts, pools and sets - Vulkan implementation of the raw
/// descriptor traits

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::render::{
    Buffer as RendererBuffer, DescriptorAllocation, DescriptorPoolSize, DescriptorResource,
    DescriptorWrite, Image as RendererImage, LayoutBinding, PipelineLayout as RendererPipelineLayout,
    RawDescriptorLayout, RawDescriptorPool, RawDescriptorSet, Sampler as RendererSampler,
};
use galaxy_3d_framegraph::galaxy3d::{Error, Result};
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{descriptor_type_to_vk, image_layout_to_vk, shader_stages_to_vk, vk_err};
use crate::vulkan_image::Image;
use crate::vulkan_sampler::Sampler;

// ===== LAYOUT =====

pub struct DescriptorLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::DescriptorSetLayout,
    bindings: Vec<LayoutBinding>,
}

impl DescriptorLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, bindings: &[LayoutBinding]) -> Result<Self> {
        let vk_bindings: Vec<vk::DescriptorSetLayoutBinding> = bindings
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(b.binding)
                    .descriptor_type(descriptor_type_to_vk(b.ty))
                    .descriptor_count(b.count)
                    .stage_flags(shader_stages_to_vk(b.stages))
            })
            .collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&vk_bindings);
        let layout = unsafe {
            ctx.device
                .create_descriptor_set_layout(&create_info, None)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_descriptor_set_layout"))?
        };
        Ok(Self { ctx, layout, bindings: bindings.to_vec() })
    }
}

impl RawDescriptorLayout for DescriptorLayout {
    fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }
}

impl Drop for DescriptorLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

// ===== POOL =====

/// Descriptor pool created with FREE_DESCRIPTOR_SET
pub struct DescriptorPool {
    ctx: Arc<GpuContext>,
    pub(crate) pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    pub(crate) fn new(ctx: Arc<GpuContext>, max_sets: u32, sizes: &[DescriptorPoolSize]) -> Result<Self> {
        let pool_sizes: Vec<vk::DescriptorPoolSize> = sizes
            .iter()
            .filter(|s| s.count > 0)
            .map(|s| vk::DescriptorPoolSize {
                ty: descriptor_type_to_vk(s.ty),
                descriptor_count: s.count,
            })
            .collect();
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);
        let pool = unsafe {
            ctx.device
                .create_descriptor_pool(&create_info, None)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_descriptor_pool"))?
        };
        Ok(Self { ctx, pool, max_sets })
    }

    /// Allocate one set of `layout`
    pub(crate) fn allocate(&self, layout: &DescriptorLayout) -> Result<DescriptorAllocation> {
        let layouts = [layout.layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        match unsafe { self.ctx.device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => match sets.first() {
                Some(&set) => Ok(DescriptorAllocation::Allocated(Arc::new(DescriptorSet { set }))),
                None => Err(Error::BackendError("allocate_descriptor_sets returned no set".to_string())),
            },
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY) | Err(vk::Result::ERROR_FRAGMENTED_POOL) => {
                Ok(DescriptorAllocation::PoolExhausted)
            }
            Err(e) => Err(vk_err(self.ctx.logger.as_ref(), e, "allocate_descriptor_sets")),
        }
    }

    pub(crate) fn free(&self, set: &DescriptorSet) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .free_descriptor_sets(self.pool, &[set.set])
                .map_err(|e| vk_err(self.ctx.logger.as_ref(), e, "free_descriptor_sets"))
        }
    }
}

impl RawDescriptorPool for DescriptorPool {
    fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            // frees every set still allocated from it
            self.ctx.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

// ===== SET =====

/// Descriptor set handle; its memory belongs to the pool
pub struct DescriptorSet {
    pub(crate) set: vk::DescriptorSet,
}

impl RawDescriptorSet for DescriptorSet {}

// ===== PIPELINE LAYOUT =====

pub struct PipelineLayout {
    ctx: Arc<GpuContext>,
    pub(crate) layout: vk::PipelineLayout,
    set_count: u32,
}

impl PipelineLayout {
    pub(crate) fn new(ctx: Arc<GpuContext>, set_layouts: &[&DescriptorLayout]) -> Result<Self> {
        let vk_layouts: Vec<vk::DescriptorSetLayout> = set_layouts.iter().map(|l| l.layout).collect();
        let create_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&vk_layouts);
        let layout = unsafe {
            ctx.device
                .create_pipeline_layout(&create_info, None)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_pipeline_layout"))?
        };
        Ok(Self { ctx, layout, set_count: vk_layouts.len() as u32 })
    }
}

impl RendererPipelineLayout for PipelineLayout {
    fn set_count(&self) -> u32 {
        self.set_count
    }
}

impl Drop for PipelineLayout {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Write `writes` into `set`
///
/// Resource infos are collected first so the write structs can point
/// into stable storage.
pub(crate) fn update_descriptor_set(ctx: &GpuContext, set: &DescriptorSet, writes: &[DescriptorWrite]) {
    enum Info {
        Buffer(usize),
        Image(usize),
    }

    let mut buffer_infos: Vec<vk::DescriptorBufferInfo> = Vec::new();
    let mut image_infos: Vec<vk::DescriptorImageInfo> = Vec::new();
    let mut slots: Vec<Info> = Vec::with_capacity(writes.len());

    for write in writes {
        match &write.resource {
            DescriptorResource::Buffer { buffer, offset, range } => {
                let vk_buffer = unsafe { &*(buffer.as_ref() as *const dyn RendererBuffer as *const Buffer) };
                buffer_infos.push(
                    vk::DescriptorBufferInfo::default()
                        .buffer(vk_buffer.buffer)
                        .offset(*offset)
                        .range(if *range == 0 { vk::WHOLE_SIZE } else { *range }),
                );
                slots.push(Info::Buffer(buffer_infos.len() - 1));
            }
            DescriptorResource::Image { image, sampler, layout } => {
                let vk_image = unsafe { &*(image.as_ref() as *const dyn RendererImage as *const Image) };
                let vk_sampler = sampler
                    .as_ref()
                    .map(|s| unsafe { (*(s.as_ref() as *const dyn RendererSampler as *const Sampler)).sampler })
                    .unwrap_or(vk::Sampler::null());
                image_infos.push(
                    vk::DescriptorImageInfo::default()
                        .image_layout(image_layout_to_vk(*layout))
                        .image_view(vk_image.view)
                        .sampler(vk_sampler),
                );
                slots.push(Info::Image(image_infos.len() - 1));
            }
        }
    }

    let vk_writes: Vec<vk::WriteDescriptorSet> = writes
        .iter()
        .zip(&slots)
        .map(|(write, slot)| {
            let vk_write = vk::WriteDescriptorSet::default()
                .dst_set(set.set)
                .dst_binding(write.binding)
                .dst_array_element(write.array_element)
                .descriptor_type(descriptor_type_to_vk(write.ty));
            match slot {
                Info::Buffer(i) => vk_write.buffer_info(std::slice::from_ref(&buffer_infos[*i])),
                Info::Image(i) => vk_write.image_info(std::slice::from_ref(&image_infos[*i])),
            }
        })
        .collect();

    unsafe {
        ctx.device.update_descriptor_sets(&vk_writes, &[]);
    }
}
