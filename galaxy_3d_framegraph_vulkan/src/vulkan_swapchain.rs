/// Swapchain - Vulkan implementation of the Swapchain trait
///
/// Owns the window surface. Images are wrapped as engine images (view
/// only, the swapchain owns the memory) so they can be bound as
/// framebuffer attachments like any other image.

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::log::Logger;
use galaxy_3d_framegraph::galaxy3d::render::{
    AcquiredImage, Image as RendererImage, ImageDesc, ImageUsage, ImageViewKind,
    Semaphore as RendererSemaphore, Swapchain as RendererSwapchain, TextureFormat,
};
use galaxy_3d_framegraph::galaxy3d::{Error, Result};
use galaxy_3d_framegraph::glam::UVec2;
use galaxy_3d_framegraph::{engine_debug, engine_error};
use std::sync::Arc;
use std::time::Duration;

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{format_from_vk, vk_err, SOURCE};
use crate::vulkan_image::Image;
use crate::vulkan_sync::vk_semaphore;

/// Vulkan swapchain implementation
pub struct Swapchain {
    ctx: Arc<GpuContext>,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,

    swapchain: vk::SwapchainKHR,
    swapchain_loader: ash::khr::swapchain::Device,
    /// Swapchains replaced by `recreate`, destroyed at the next recreate
    /// once nothing references their images anymore
    retired: Vec<vk::SwapchainKHR>,

    images: Vec<Arc<dyn RendererImage>>,
    surface_format: vk::SurfaceFormatKHR,
    format: TextureFormat,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain on `surface`, taking ownership of it
    ///
    /// The graphics queue family must be able to present to the surface.
    pub(crate) fn new(
        ctx: Arc<GpuContext>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let surface_loader = ash::khr::surface::Instance::new(&ctx.entry, &ctx.instance);
        let swapchain_loader = ash::khr::swapchain::Device::new(&ctx.instance, &ctx.device);

        match Self::choose_surface_format(&ctx, &surface_loader, surface) {
            Ok((surface_format, format)) => {
                let mut swapchain = Self {
                    ctx,
                    surface,
                    surface_loader,
                    swapchain: vk::SwapchainKHR::null(),
                    swapchain_loader,
                    retired: Vec::new(),
                    images: Vec::new(),
                    surface_format,
                    format,
                    extent: vk::Extent2D { width, height },
                };
                // on failure, Drop releases the surface
                swapchain.build(width, height)?;
                Ok(swapchain)
            }
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                Err(e)
            }
        }
    }

    fn choose_surface_format(
        ctx: &GpuContext,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::SurfaceFormatKHR, TextureFormat)> {
        let present_supported = unsafe {
            surface_loader
                .get_physical_device_surface_support(ctx.physical_device, ctx.graphics.family, surface)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "get_physical_device_surface_support"))?
        };
        if !present_supported {
            engine_error!(ctx.logger, SOURCE, "Graphics queue family cannot present to this surface");
            return Err(Error::InitializationFailed(
                "graphics queue family cannot present to the surface".to_string(),
            ));
        }

        let surface_formats = unsafe {
            surface_loader
                .get_physical_device_surface_formats(ctx.physical_device, surface)
                .map_err(|e| {
                    engine_error!(ctx.logger, SOURCE, "Failed to query surface formats: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface formats: {:?}", e))
                })?
        };

        let preferred = surface_formats
            .iter()
            .find(|f| f.format == vk::Format::B8G8R8A8_SRGB || f.format == vk::Format::R8G8B8A8_SRGB);
        preferred
            .into_iter()
            .chain(surface_formats.iter())
            .find_map(|f| format_from_vk(f.format).map(|format| (*f, format)))
            .ok_or_else(|| {
                engine_error!(ctx.logger, SOURCE, "No supported surface format among {:?}", surface_formats);
                Error::InitializationFailed("no supported surface format".to_string())
            })
    }

    /// Create the native swapchain for the current surface size and wrap
    /// its images, retiring the previous one
    fn build(&mut self, width: u32, height: u32) -> Result<()> {
        let ctx = self.ctx.clone();
        unsafe {
            let capabilities = self
                .surface_loader
                .get_physical_device_surface_capabilities(ctx.physical_device, self.surface)
                .map_err(|e| {
                    engine_error!(ctx.logger, SOURCE, "Failed to get surface capabilities: {:?}", e);
                    Error::InitializationFailed(format!("Failed to get surface capabilities: {:?}", e))
                })?;

            let extent = if capabilities.current_extent.width != u32::MAX {
                capabilities.current_extent
            } else {
                vk::Extent2D {
                    width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
                    height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
                }
            };

            let image_count = capabilities.min_image_count + 1;
            let image_count = if capabilities.max_image_count > 0 {
                image_count.min(capabilities.max_image_count)
            } else {
                image_count
            };

            let old_swapchain = self.swapchain;
            let create_info = vk::SwapchainCreateInfoKHR::default()
                .surface(self.surface)
                .min_image_count(image_count)
                .image_format(self.surface_format.format)
                .image_color_space(self.surface_format.color_space)
                .image_extent(extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
                .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
                .pre_transform(capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(vk::PresentModeKHR::FIFO)
                .clipped(true)
                .old_swapchain(old_swapchain);

            let swapchain = self
                .swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    engine_error!(ctx.logger, SOURCE, "Failed to create swapchain: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create swapchain: {:?}", e))
                })?;

            let vk_images = match self.swapchain_loader.get_swapchain_images(swapchain) {
                Ok(images) => images,
                Err(e) => {
                    self.swapchain_loader.destroy_swapchain(swapchain, None);
                    engine_error!(ctx.logger, SOURCE, "Failed to get swapchain images: {:?}", e);
                    return Err(Error::InitializationFailed(format!("Failed to get swapchain images: {:?}", e)));
                }
            };

            let desc = ImageDesc {
                width: extent.width,
                height: extent.height,
                format: self.format,
                mip_levels: 1,
                array_layers: 1,
                samples: 1,
                usage: ImageUsage::COLOR_ATTACHMENT | ImageUsage::TRANSFER_DST,
                view_kind: ImageViewKind::D2,
                cube_compatible: false,
            };
            let mut images: Vec<Arc<dyn RendererImage>> = Vec::with_capacity(vk_images.len());
            for &image in &vk_images {
                match Image::from_swapchain(ctx.clone(), image, desc.clone()) {
                    Ok(image) => images.push(Arc::new(image)),
                    Err(e) => {
                        images.clear();
                        self.swapchain_loader.destroy_swapchain(swapchain, None);
                        return Err(e);
                    }
                }
            }

            if old_swapchain != vk::SwapchainKHR::null() {
                self.retired.push(old_swapchain);
            }
            self.swapchain = swapchain;
            self.images = images;
            self.extent = extent;

            engine_debug!(
                ctx.logger,
                SOURCE,
                "Swapchain built: {}x{}, {} images, {:?}",
                extent.width,
                extent.height,
                self.images.len(),
                self.format
            );
            Ok(())
        }
    }

    fn destroy_retired(&mut self) {
        for swapchain in self.retired.drain(..) {
            unsafe { self.swapchain_loader.destroy_swapchain(swapchain, None) };
        }
    }
}

impl RendererSwapchain for Swapchain {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn image(&self, index: usize) -> Result<Arc<dyn RendererImage>> {
        self.images.get(index).cloned().ok_or_else(|| {
            Error::InvalidResource(format!(
                "swapchain image {} out of range (count: {})",
                index,
                self.images.len()
            ))
        })
    }

    fn extent(&self) -> UVec2 {
        UVec2::new(self.extent.width, self.extent.height)
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn acquire_next_image(&mut self, signal: &dyn RendererSemaphore, timeout: Duration) -> Result<AcquiredImage> {
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        let acquired = unsafe {
            self.swapchain_loader.acquire_next_image(
                self.swapchain,
                timeout_ns,
                vk_semaphore(signal),
                vk::Fence::null(),
            )
        };
        match acquired {
            Ok((index, suboptimal)) => Ok(AcquiredImage { index, suboptimal }),
            Err(e) => Err(vk_err(self.ctx.logger.as_ref(), e, "acquire_next_image")),
        }
    }

    fn present(&mut self, index: u32, wait: &dyn RendererSemaphore) -> Result<bool> {
        let swapchains = [self.swapchain];
        let image_indices = [index];
        let wait_semaphores = [vk_semaphore(wait)];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let queue = self
            .ctx
            .graphics
            .handle
            .lock()
            .map_err(|_| Error::BackendError("graphics queue mutex poisoned".to_string()))?;
        unsafe { self.swapchain_loader.queue_present(*queue, &present_info) }
            .map_err(|e| vk_err(self.ctx.logger.as_ref(), e, "queue_present"))
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        // the previous rebuild released every reference to retired images
        self.destroy_retired();
        self.build(width, height)
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.device_wait_idle().ok();
            // image views first
            self.images.clear();
            self.destroy_retired();
            if self.swapchain != vk::SwapchainKHR::null() {
                self.swapchain_loader.destroy_swapchain(self.swapchain, None);
            }
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
