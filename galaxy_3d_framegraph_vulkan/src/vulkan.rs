/// VulkanGraphicsDevice - Vulkan implementation of the GraphicsDevice trait

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::log::Logger;
use galaxy_3d_framegraph::galaxy3d::render::{
    Buffer as RendererBuffer, BufferDesc, CommandList as RendererCommandList, Config,
    DescriptorAllocation, DescriptorPoolSize, DescriptorWrite, Fence as RendererFence,
    Framebuffer as RendererFramebuffer, FramebufferDesc, Image as RendererImage, ImageDesc,
    LayoutBinding, PipelineLayout as RendererPipelineLayout, QueueKind, RawDescriptorLayout,
    RawDescriptorPool, RawDescriptorSet, RenderPass as RendererRenderPass, RenderPassDesc, Sampler as RendererSampler, SamplerDesc,
    Semaphore as RendererSemaphore, Submission,
};
use galaxy_3d_framegraph::galaxy3d::{Error, GraphicsDevice, Result};
use galaxy_3d_framegraph::{engine_debug, engine_error, engine_info, engine_warn};
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CString;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_command_list::{vk_command_buffer, CommandList};
use crate::vulkan_context::{GpuContext, GpuQueue};
use crate::vulkan_convert::{pipeline_stages_to_vk, vk_err, SOURCE};
use crate::vulkan_debug::DebugMessenger;
use crate::vulkan_descriptor::{self, DescriptorLayout, DescriptorPool, DescriptorSet, PipelineLayout};
use crate::vulkan_frame_buffer::Framebuffer;
use crate::vulkan_image::Image;
use crate::vulkan_render_pass::RenderPass;
use crate::vulkan_sampler::Sampler;
use crate::vulkan_swapchain::Swapchain;
use crate::vulkan_sync::{vk_fence, vk_semaphore, Fence, Semaphore};

/// Queue layout chosen for a physical device
struct QueueSelection {
    graphics_family: u32,
    /// (family, queue index) of the upload queue when distinct from graphics
    transfer: Option<(u32, u32)>,
}

/// Vulkan graphics device
///
/// Central object for creating resources and submitting commands.
/// Presentation goes through `Swapchain`, created from the same window.
pub struct VulkanGraphicsDevice {
    ctx: Arc<GpuContext>,
    dedicated_transfer: bool,
}

impl VulkanGraphicsDevice {
    /// Create the instance, pick a GPU able to present to `window` and
    /// create the logical device, its queues and the memory allocator
    pub fn new<W: HasDisplayHandle + HasWindowHandle>(
        window: &W,
        config: &Config,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        unsafe {
            let entry = ash::Entry::load().map_err(|e| {
                engine_error!(logger, SOURCE, "Failed to load Vulkan library: {:?}", e);
                Error::InitializationFailed(format!("Failed to load Vulkan library: {:?}", e))
            })?;

            let app_name = CString::new(config.app_name.as_str())
                .map_err(|_| Error::InitializationFailed("app_name contains a NUL byte".to_string()))?;
            let (major, minor, patch) = config.app_version;
            let app_info = vk::ApplicationInfo::default()
                .application_name(&app_name)
                .application_version(vk::make_api_version(0, major, minor, patch))
                .engine_name(c"Galaxy3D")
                .engine_version(vk::make_api_version(0, 0, 1, 0))
                .api_version(vk::API_VERSION_1_3);

            let display_handle = window.display_handle().map_err(|e| {
                engine_error!(logger, SOURCE, "Failed to get display handle: {}", e);
                Error::InitializationFailed(format!("Failed to get display handle: {}", e))
            })?;
            #[cfg_attr(not(feature = "vulkan-validation"), allow(unused_mut))]
            let mut extension_names = ash_window::enumerate_required_extensions(display_handle.as_raw())
                .map_err(|e| {
                    engine_error!(logger, SOURCE, "Failed to get required extensions: {}", e);
                    Error::InitializationFailed(format!("Failed to get required extensions: {}", e))
                })?
                .to_vec();

            let validation = config.enable_validation && Self::validation_available(&entry, logger.as_ref());
            #[cfg_attr(not(feature = "vulkan-validation"), allow(unused_mut))]
            let mut layer_names: Vec<*const std::os::raw::c_char> = Vec::new();
            #[cfg(feature = "vulkan-validation")]
            if validation {
                extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
                layer_names.push(crate::vulkan_debug::VALIDATION_LAYER.as_ptr());
            }

            let create_info = vk::InstanceCreateInfo::default()
                .application_info(&app_info)
                .enabled_layer_names(&layer_names)
                .enabled_extension_names(&extension_names);

            let instance = entry.create_instance(&create_info, None).map_err(|e| {
                engine_error!(logger, SOURCE, "Failed to create Vulkan instance: {:?}", e);
                Error::InitializationFailed(format!("Failed to create instance: {:?}", e))
            })?;

            let debug = Self::create_debug_messenger(&entry, &instance, validation, &logger);

            // Temporary surface, only for queue selection
            let window_handle = window.window_handle().map_err(|e| {
                engine_error!(logger, SOURCE, "Failed to get window handle: {}", e);
                Error::InitializationFailed(format!("Failed to get window handle: {}", e))
            })?;
            let surface = ash_window::create_surface(
                &entry,
                &instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!(logger, SOURCE, "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?;
            let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

            let selection = Self::pick_physical_device(
                &instance,
                &surface_loader,
                surface,
                config.use_dedicated_transfer_queue,
            );
            surface_loader.destroy_surface(surface, None);
            let (physical_device, queues) = selection.ok_or_else(|| {
                engine_error!(logger, SOURCE, "No Vulkan GPU with a presentable graphics queue found");
                Error::InitializationFailed("No suitable Vulkan GPU found".to_string())
            })?;

            // Logical device
            let priorities = [1.0, 1.0];
            let mut queue_create_infos = Vec::new();
            match queues.transfer {
                Some((family, _)) if family != queues.graphics_family => {
                    queue_create_infos.push(
                        vk::DeviceQueueCreateInfo::default()
                            .queue_family_index(queues.graphics_family)
                            .queue_priorities(&priorities[..1]),
                    );
                    queue_create_infos.push(
                        vk::DeviceQueueCreateInfo::default()
                            .queue_family_index(family)
                            .queue_priorities(&priorities[..1]),
                    );
                }
                Some(_) => queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(queues.graphics_family)
                        .queue_priorities(&priorities),
                ),
                None => queue_create_infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(queues.graphics_family)
                        .queue_priorities(&priorities[..1]),
                ),
            }

            let supported = instance.get_physical_device_features(physical_device);
            let device_features = vk::PhysicalDeviceFeatures::default()
                .sampler_anisotropy(supported.sampler_anisotropy == vk::TRUE);
            let device_extension_names = [ash::khr::swapchain::NAME.as_ptr()];

            let device_create_info = vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_create_infos)
                .enabled_extension_names(&device_extension_names)
                .enabled_features(&device_features);

            let device = instance
                .create_device(physical_device, &device_create_info, None)
                .map_err(|e| {
                    engine_error!(logger, SOURCE, "Failed to create logical device: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create device: {:?}", e))
                })?;

            let graphics = GpuQueue {
                handle: Arc::new(Mutex::new(device.get_device_queue(queues.graphics_family, 0))),
                family: queues.graphics_family,
            };
            let transfer = match queues.transfer {
                Some((family, index)) => GpuQueue {
                    handle: Arc::new(Mutex::new(device.get_device_queue(family, index))),
                    family,
                },
                None => graphics.clone(),
            };

            let allocator = Allocator::new(&AllocatorCreateDesc {
                instance: instance.clone(),
                device: device.clone(),
                physical_device,
                debug_settings: Default::default(),
                buffer_device_address: false,
                allocation_sizes: Default::default(),
            })
            .map_err(|e| {
                engine_error!(logger, SOURCE, "Failed to create GPU allocator: {:?}", e);
                Error::InitializationFailed(format!("Failed to create allocator: {:?}", e))
            })?;

            let properties = instance.get_physical_device_properties(physical_device);
            let device_name = properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            engine_info!(
                logger,
                SOURCE,
                "Vulkan device '{}' (graphics family {}, upload queue {})",
                device_name,
                queues.graphics_family,
                match queues.transfer {
                    Some((family, index)) => format!("family {} index {}", family, index),
                    None => "shared with graphics".to_string(),
                }
            );

            let dedicated_transfer = queues.transfer.is_some();
            let ctx = Arc::new(GpuContext {
                entry,
                instance,
                physical_device,
                device,
                allocator: ManuallyDrop::new(Mutex::new(allocator)),
                graphics,
                transfer,
                logger,
                debug,
            });

            Ok(Self { ctx, dedicated_transfer })
        }
    }

    /// Create a swapchain presenting to `window`
    pub fn create_swapchain<W: HasDisplayHandle + HasWindowHandle>(
        &self,
        window: &W,
        width: u32,
        height: u32,
    ) -> Result<Swapchain> {
        let ctx = &self.ctx;
        let display_handle = window.display_handle().map_err(|e| {
            engine_error!(ctx.logger, SOURCE, "Failed to get display handle: {}", e);
            Error::InitializationFailed(format!("Failed to get display handle: {}", e))
        })?;
        let window_handle = window.window_handle().map_err(|e| {
            engine_error!(ctx.logger, SOURCE, "Failed to get window handle: {}", e);
            Error::InitializationFailed(format!("Failed to get window handle: {}", e))
        })?;
        let surface = unsafe {
            ash_window::create_surface(
                &ctx.entry,
                &ctx.instance,
                display_handle.as_raw(),
                window_handle.as_raw(),
                None,
            )
            .map_err(|e| {
                engine_error!(ctx.logger, SOURCE, "Failed to create surface: {:?}", e);
                Error::InitializationFailed(format!("Failed to create surface: {:?}", e))
            })?
        };
        Swapchain::new(ctx.clone(), surface, width, height)
    }

    #[cfg(feature = "vulkan-validation")]
    fn validation_available(entry: &ash::Entry, logger: &dyn Logger) -> bool {
        let layers = unsafe { entry.enumerate_instance_layer_properties() }.unwrap_or_default();
        let found = layers.iter().any(|layer| {
            layer.layer_name_as_c_str().ok() == Some(crate::vulkan_debug::VALIDATION_LAYER)
        });
        if !found {
            engine_warn!(logger, SOURCE, "Validation requested but VK_LAYER_KHRONOS_validation is not installed");
        }
        found
    }

    #[cfg(not(feature = "vulkan-validation"))]
    fn validation_available(_entry: &ash::Entry, logger: &dyn Logger) -> bool {
        engine_debug!(logger, SOURCE, "Validation requested but the backend was built without it");
        false
    }

    #[cfg(feature = "vulkan-validation")]
    fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
        validation: bool,
        logger: &Arc<dyn Logger>,
    ) -> Option<DebugMessenger> {
        if !validation {
            return None;
        }
        match DebugMessenger::new(entry, instance, logger.clone()) {
            Ok(messenger) => Some(messenger),
            Err(e) => {
                engine_warn!(logger, SOURCE, "Failed to create debug messenger: {:?}", e);
                None
            }
        }
    }

    #[cfg(not(feature = "vulkan-validation"))]
    fn create_debug_messenger(
        _entry: &ash::Entry,
        _instance: &ash::Instance,
        _validation: bool,
        _logger: &Arc<dyn Logger>,
    ) -> Option<DebugMessenger> {
        None
    }

    /// First GPU (discrete preferred) with a graphics family able to
    /// present to `surface`
    unsafe fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        want_transfer: bool,
    ) -> Option<(vk::PhysicalDevice, QueueSelection)> {
        let mut candidates: Vec<(vk::PhysicalDevice, QueueSelection, bool)> = instance
            .enumerate_physical_devices()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|physical_device| {
                let families = instance.get_physical_device_queue_family_properties(physical_device);
                let graphics_family = (0..families.len() as u32).find(|&i| {
                    families[i as usize].queue_flags.contains(vk::QueueFlags::GRAPHICS)
                        && surface_loader
                            .get_physical_device_surface_support(physical_device, i, surface)
                            .unwrap_or(false)
                })?;
                let transfer = if want_transfer {
                    select_upload_queue(&families, graphics_family)
                } else {
                    None
                };
                let discrete = instance.get_physical_device_properties(physical_device).device_type
                    == vk::PhysicalDeviceType::DISCRETE_GPU;
                Some((physical_device, QueueSelection { graphics_family, transfer }, discrete))
            })
            .collect();
        // stable sort keeps enumeration order among equals
        candidates.sort_by_key(|(_, _, discrete)| !*discrete);
        candidates.into_iter().next().map(|(device, queues, _)| (device, queues))
    }

    fn raw_descriptor_layout(layout: &dyn RawDescriptorLayout) -> &DescriptorLayout {
        unsafe { &*(layout as *const dyn RawDescriptorLayout as *const DescriptorLayout) }
    }

    fn raw_descriptor_pool(pool: &dyn RawDescriptorPool) -> &DescriptorPool {
        unsafe { &*(pool as *const dyn RawDescriptorPool as *const DescriptorPool) }
    }

    fn raw_descriptor_set(set: &dyn RawDescriptorSet) -> &DescriptorSet {
        unsafe { &*(set as *const dyn RawDescriptorSet as *const DescriptorSet) }
    }
}

/// Graphics-capable queue distinct from queue 0 of `graphics_family`
///
/// Another graphics family is preferred; otherwise a second queue of the
/// graphics family.
fn select_upload_queue(families: &[vk::QueueFamilyProperties], graphics_family: u32) -> Option<(u32, u32)> {
    (0..families.len() as u32)
        .find(|&i| {
            i != graphics_family
                && families[i as usize].queue_count > 0
                && families[i as usize].queue_flags.contains(vk::QueueFlags::GRAPHICS)
        })
        .map(|family| (family, 0))
        .or_else(|| {
            (families[graphics_family as usize].queue_count >= 2).then_some((graphics_family, 1))
        })
}

impl GraphicsDevice for VulkanGraphicsDevice {
    // ===== RESOURCES =====

    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn RendererImage>> {
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource("image extent must be > 0".to_string()));
        }
        Ok(Arc::new(Image::new(self.ctx.clone(), desc)?))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn RendererBuffer>> {
        Ok(Arc::new(Buffer::new(self.ctx.clone(), desc)?))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn RendererSampler>> {
        Ok(Arc::new(Sampler::new(self.ctx.clone(), desc)?))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RendererRenderPass>> {
        Ok(Arc::new(RenderPass::new(self.ctx.clone(), desc)?))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc<'_>) -> Result<Arc<dyn RendererFramebuffer>> {
        Ok(Arc::new(Framebuffer::new(self.ctx.clone(), desc)?))
    }

    // ===== COMMANDS & SYNC =====

    fn create_command_list(&self, queue: QueueKind) -> Result<Box<dyn RendererCommandList>> {
        Ok(Box::new(CommandList::new(self.ctx.clone(), queue)?))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn RendererSemaphore>> {
        Ok(Arc::new(Semaphore::new(self.ctx.clone())?))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn RendererFence>> {
        Ok(Arc::new(Fence::new(self.ctx.clone(), signaled)?))
    }

    fn has_dedicated_transfer_queue(&self) -> bool {
        self.dedicated_transfer
    }

    fn submit(&self, queue: QueueKind, submission: &Submission<'_>) -> Result<()> {
        let command_buffers: Vec<vk::CommandBuffer> = submission
            .command_lists
            .iter()
            .map(|list| vk_command_buffer(*list))
            .collect();
        let wait_semaphores: Vec<vk::Semaphore> =
            submission.wait.iter().map(|(semaphore, _)| vk_semaphore(*semaphore)).collect();
        let wait_stages: Vec<vk::PipelineStageFlags> =
            submission.wait.iter().map(|(_, stages)| pipeline_stages_to_vk(*stages)).collect();
        let signal_semaphores: Vec<vk::Semaphore> =
            submission.signal.iter().map(|semaphore| vk_semaphore(*semaphore)).collect();
        let fence = submission.fence.map(vk_fence).unwrap_or(vk::Fence::null());

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let queue = self
            .ctx
            .queue(queue)
            .handle
            .lock()
            .map_err(|_| Error::BackendError("queue mutex poisoned".to_string()))?;
        unsafe {
            self.ctx
                .device
                .queue_submit(*queue, &[submit_info], fence)
                .map_err(|e| vk_err(self.ctx.logger.as_ref(), e, "queue_submit"))
        }
    }

    fn wait_for_fence(&self, fence: &dyn RendererFence, timeout: Duration) -> Result<()> {
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);
        unsafe {
            self.ctx
                .device
                .wait_for_fences(&[vk_fence(fence)], true, timeout_ns)
                .map_err(|e| vk_err(self.ctx.logger.as_ref(), e, "wait_for_fences"))
        }
    }

    fn reset_fence(&self, fence: &dyn RendererFence) -> Result<()> {
        unsafe {
            self.ctx
                .device
                .reset_fences(&[vk_fence(fence)])
                .map_err(|e| vk_err(self.ctx.logger.as_ref(), e, "reset_fences"))
        }
    }

    fn is_fence_signaled(&self, fence: &dyn RendererFence) -> Result<bool> {
        unsafe {
            self.ctx
                .device
                .get_fence_status(vk_fence(fence))
                .map_err(|e| vk_err(self.ctx.logger.as_ref(), e, "get_fence_status"))
        }
    }

    // ===== DESCRIPTORS =====

    fn create_descriptor_layout(&self, bindings: &[LayoutBinding]) -> Result<Arc<dyn RawDescriptorLayout>> {
        Ok(Arc::new(DescriptorLayout::new(self.ctx.clone(), bindings)?))
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<Arc<dyn RawDescriptorPool>> {
        Ok(Arc::new(DescriptorPool::new(self.ctx.clone(), max_sets, sizes)?))
    }

    fn allocate_descriptor_set(
        &self,
        pool: &dyn RawDescriptorPool,
        layout: &dyn RawDescriptorLayout,
    ) -> Result<DescriptorAllocation> {
        Self::raw_descriptor_pool(pool).allocate(Self::raw_descriptor_layout(layout))
    }

    fn free_descriptor_set(&self, pool: &dyn RawDescriptorPool, set: &dyn RawDescriptorSet) -> Result<()> {
        Self::raw_descriptor_pool(pool).free(Self::raw_descriptor_set(set))
    }

    fn update_descriptor_set(&self, set: &dyn RawDescriptorSet, writes: &[DescriptorWrite]) -> Result<()> {
        vulkan_descriptor::update_descriptor_set(&self.ctx, Self::raw_descriptor_set(set), writes);
        Ok(())
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[&dyn RawDescriptorLayout],
    ) -> Result<Arc<dyn RendererPipelineLayout>> {
        let layouts: Vec<&DescriptorLayout> = set_layouts.iter().map(|l| Self::raw_descriptor_layout(*l)).collect();
        Ok(Arc::new(PipelineLayout::new(self.ctx.clone(), &layouts)?))
    }

    // ===== LIFETIME =====

    fn wait_idle(&self) -> Result<()> {
        // vkDeviceWaitIdle needs every queue externally synchronized
        let _graphics = self
            .ctx
            .graphics
            .handle
            .lock()
            .map_err(|_| Error::BackendError("queue mutex poisoned".to_string()))?;
        let _transfer = if Arc::ptr_eq(&self.ctx.graphics.handle, &self.ctx.transfer.handle) {
            None
        } else {
            Some(
                self.ctx
                    .transfer
                    .handle
                    .lock()
                    .map_err(|_| Error::BackendError("queue mutex poisoned".to_string()))?,
            )
        };
        unsafe {
            self.ctx
                .device
                .device_wait_idle()
                .map_err(|e| vk_err(self.ctx.logger.as_ref(), e, "device_wait_idle"))
        }
    }
}

impl Drop for VulkanGraphicsDevice {
    fn drop(&mut self) {
        // GpuContext destroys the device once the last resource is gone
        self.wait_idle().ok();
    }
}

#[cfg(test)]
#[path = "vulkan_tests.rs"]
mod tests;
