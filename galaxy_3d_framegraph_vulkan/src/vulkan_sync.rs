/// Fence and Semaphore - Vulkan synchronization primitives

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::render::{Fence as RendererFence, Semaphore as RendererSemaphore};
use galaxy_3d_framegraph::galaxy3d::Result;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::vk_err;

pub struct Fence {
    ctx: Arc<GpuContext>,
    pub(crate) fence: vk::Fence,
}

impl Fence {
    pub(crate) fn new(ctx: Arc<GpuContext>, signaled: bool) -> Result<Self> {
        let flags = if signaled { vk::FenceCreateFlags::SIGNALED } else { vk::FenceCreateFlags::empty() };
        let fence = unsafe {
            ctx.device
                .create_fence(&vk::FenceCreateInfo::default().flags(flags), None)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_fence"))?
        };
        Ok(Self { ctx, fence })
    }
}

impl RendererFence for Fence {}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_fence(self.fence, None);
        }
    }
}

pub struct Semaphore {
    ctx: Arc<GpuContext>,
    pub(crate) semaphore: vk::Semaphore,
}

impl Semaphore {
    pub(crate) fn new(ctx: Arc<GpuContext>) -> Result<Self> {
        let semaphore = unsafe {
            ctx.device
                .create_semaphore(&vk::SemaphoreCreateInfo::default(), None)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_semaphore"))?
        };
        Ok(Self { ctx, semaphore })
    }
}

impl RendererSemaphore for Semaphore {}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Native handle of an engine fence created by this backend
pub(crate) fn vk_fence(fence: &dyn RendererFence) -> vk::Fence {
    unsafe { (*(fence as *const dyn RendererFence as *const Fence)).fence }
}

/// Native handle of an engine semaphore created by this backend
pub(crate) fn vk_semaphore(semaphore: &dyn RendererSemaphore) -> vk::Semaphore {
    unsafe { (*(semaphore as *const dyn RendererSemaphore as *const Semaphore)).semaphore }
}
