/// Image - Vulkan implementation of the Image trait

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::render::{Image as RendererImage, ImageDesc};
use galaxy_3d_framegraph::galaxy3d::{Error, Result};
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use gpu_allocator::MemoryLocation;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{
    aspect_mask, format_to_vk, image_usage_to_vk, sample_count_to_vk, view_kind_to_vk, vk_err,
};

/// Vulkan image with its default view
pub struct Image {
    ctx: Arc<GpuContext>,
    pub(crate) image: vk::Image,
    pub(crate) view: vk::ImageView,
    /// GPU memory allocation (`None` for swapchain images)
    allocation: Option<Allocation>,
    pub(crate) aspect: vk::ImageAspectFlags,
    /// False when the image belongs to a swapchain; only the view is destroyed
    owned: bool,
    desc: ImageDesc,
}

impl Image {
    /// Create a device-local image and a view covering every level and layer
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &ImageDesc) -> Result<Self> {
        let families = ctx.sharing_families();
        let mut create_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format_to_vk(desc.format))
            .extent(vk::Extent3D { width: desc.width, height: desc.height, depth: 1 })
            .mip_levels(desc.mip_levels.max(1))
            .array_layers(desc.array_layers.max(1))
            .samples(sample_count_to_vk(desc.samples))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage_to_vk(desc.usage))
            .initial_layout(vk::ImageLayout::UNDEFINED);
        if desc.cube_compatible {
            create_info = create_info.flags(vk::ImageCreateFlags::CUBE_COMPATIBLE);
        }
        create_info = if families.len() > 1 {
            create_info
                .sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families)
        } else {
            create_info.sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        unsafe {
            let image = ctx
                .device
                .create_image(&create_info, None)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_image"))?;

            let requirements = ctx.device.get_image_memory_requirements(image);
            let allocation = match ctx.allocator.lock() {
                Ok(mut allocator) => allocator
                    .allocate(&AllocationCreateDesc {
                        name: "image",
                        requirements,
                        location: MemoryLocation::GpuOnly,
                        linear: false,
                        allocation_scheme: AllocationScheme::GpuAllocatorManaged,
                    })
                    .map_err(|_| Error::OutOfMemory),
                Err(_) => Err(Error::BackendError("allocator mutex poisoned".to_string())),
            };
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(e) => {
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            if let Err(e) = ctx
                .device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
            {
                if let Ok(mut allocator) = ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
                ctx.device.destroy_image(image, None);
                return Err(vk_err(ctx.logger.as_ref(), e, "bind_image_memory"));
            }

            let aspect = aspect_mask(desc.format);
            let view = match create_view(&ctx, image, desc, aspect) {
                Ok(view) => view,
                Err(e) => {
                    if let Ok(mut allocator) = ctx.allocator.lock() {
                        allocator.free(allocation).ok();
                    }
                    ctx.device.destroy_image(image, None);
                    return Err(e);
                }
            };

            Ok(Self {
                ctx,
                image,
                view,
                allocation: Some(allocation),
                aspect,
                owned: true,
                desc: desc.clone(),
            })
        }
    }

    /// Wrap a swapchain image, creating only its view
    pub(crate) fn from_swapchain(ctx: Arc<GpuContext>, image: vk::Image, desc: ImageDesc) -> Result<Self> {
        let aspect = aspect_mask(desc.format);
        let view = create_view(&ctx, image, &desc, aspect)?;
        Ok(Self {
            ctx,
            image,
            view,
            allocation: None,
            aspect,
            owned: false,
            desc,
        })
    }
}

fn create_view(
    ctx: &GpuContext,
    image: vk::Image,
    desc: &ImageDesc,
    aspect: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(view_kind_to_vk(desc.view_kind))
        .format(format_to_vk(desc.format))
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: desc.mip_levels.max(1),
            base_array_layer: 0,
            layer_count: desc.array_layers.max(1),
        });
    unsafe {
        ctx.device
            .create_image_view(&view_info, None)
            .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_image_view"))
    }
}

impl RendererImage for Image {
    fn desc(&self) -> &ImageDesc {
        &self.desc
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_image_view(self.view, None);

            if let Some(allocation) = self.allocation.take() {
                if let Ok(mut allocator) = self.ctx.allocator.lock() {
                    allocator.free(allocation).ok();
                }
            }

            if self.owned {
                self.ctx.device.destroy_image(self.image, None);
            }
        }
    }
}
