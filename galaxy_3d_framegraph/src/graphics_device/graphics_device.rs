/// GraphicsDevice trait - factory for GPU objects and queue access

use std::sync::Arc;
use std::time::Duration;
use crate::error::Result;
use crate::graphics_device::{
    Buffer, BufferDesc, CommandList, DescriptorAllocation, DescriptorPoolSize,
    DescriptorWrite, Fence, Framebuffer, FramebufferDesc, Image, ImageDesc,
    LayoutBinding, PipelineLayout, QueueKind, RawDescriptorLayout, RawDescriptorPool,
    RawDescriptorSet, RenderPass, RenderPassDesc, Sampler, SamplerDesc,
    Semaphore, Submission,
};

/// Graphics device
///
/// Backend implementations (Vulkan) own the native device, its queues and
/// the memory allocator. Every method may be called from any thread;
/// submissions to the same queue are serialized by the implementation.
pub trait GraphicsDevice: Send + Sync {
    // ===== RESOURCES =====

    /// Create an image with device-local memory and its default view
    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn Image>>;

    /// Create a host-visible buffer
    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>>;

    /// Create a sampler
    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>>;

    /// Create a native render pass
    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>>;

    /// Create a framebuffer compatible with `desc.render_pass`
    fn create_framebuffer(&self, desc: &FramebufferDesc<'_>) -> Result<Arc<dyn Framebuffer>>;

    // ===== COMMANDS & SYNC =====

    /// Create a command list recording for `queue`
    fn create_command_list(&self, queue: QueueKind) -> Result<Box<dyn CommandList>>;

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>>;

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>>;

    /// True if `QueueKind::Transfer` maps to its own queue instead of
    /// sharing the graphics queue
    fn has_dedicated_transfer_queue(&self) -> bool;

    /// Submit a batch to `queue`
    fn submit(&self, queue: QueueKind, submission: &Submission<'_>) -> Result<()>;

    /// Block until `fence` is signaled
    ///
    /// Reaching `timeout` returns `Error::DeviceLost`.
    fn wait_for_fence(&self, fence: &dyn Fence, timeout: Duration) -> Result<()>;

    fn reset_fence(&self, fence: &dyn Fence) -> Result<()>;

    /// Non-blocking fence status
    fn is_fence_signaled(&self, fence: &dyn Fence) -> Result<bool>;

    // ===== DESCRIPTORS =====

    fn create_descriptor_layout(&self, bindings: &[LayoutBinding]) -> Result<Arc<dyn RawDescriptorLayout>>;

    /// Create a pool whose sets may be freed individually
    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<Arc<dyn RawDescriptorPool>>;

    /// Allocate one set, reporting `PoolExhausted` instead of failing when
    /// the pool is full
    fn allocate_descriptor_set(
        &self,
        pool: &dyn RawDescriptorPool,
        layout: &dyn RawDescriptorLayout,
    ) -> Result<DescriptorAllocation>;

    fn free_descriptor_set(&self, pool: &dyn RawDescriptorPool, set: &dyn RawDescriptorSet) -> Result<()>;

    fn update_descriptor_set(&self, set: &dyn RawDescriptorSet, writes: &[DescriptorWrite]) -> Result<()>;

    /// Create a pipeline layout from set layouts, set 0 first
    fn create_pipeline_layout(&self, set_layouts: &[&dyn RawDescriptorLayout]) -> Result<Arc<dyn PipelineLayout>>;

    // ===== LIFETIME =====

    /// Wait until every queue is idle
    fn wait_idle(&self) -> Result<()>;
}
