/// Mock GraphicsDevice for unit tests (no GPU required)
///
/// Every object is a plain Rust value. Command lists record their commands
/// as strings and `submit` copies them into a submission log so tests can
/// assert on exact command sequences.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use glam::UVec2;

use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquiredImage, Buffer, BufferDesc, BufferImageCopy, ClearValue, CommandList,
    DescriptorAllocation, DescriptorPoolSize, DescriptorWrite, Fence, Filter,
    Framebuffer, FramebufferDesc, GraphicsDevice, Image, ImageBarrier, ImageBlit,
    ImageDesc, ImageLayout, ImageUsage, ImageViewKind, LayoutBinding, PipelineLayout,
    QueueKind, RawDescriptorLayout, RawDescriptorPool, RawDescriptorSet, RenderArea,
    RenderPass, RenderPassDesc, Sampler, SamplerDesc, Semaphore, Submission,
    Swapchain, TextureFormat, Viewport, check_set_range,
};

// ============================================================================
// Mock Image / Buffer / Sampler
// ============================================================================

pub struct MockImage {
    pub desc: ImageDesc,
    pub id: usize,
}

impl Image for MockImage {
    fn desc(&self) -> &ImageDesc {
        &self.desc
    }
}

pub struct MockBuffer {
    pub data: Mutex<Vec<u8>>,
}

impl MockBuffer {
    pub fn new(size: u64) -> Self {
        Self { data: Mutex::new(vec![0; size as usize]) }
    }
}

impl Buffer for MockBuffer {
    fn size(&self) -> u64 {
        self.data.lock().unwrap().len() as u64
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        let mut buf = self.data.lock().unwrap();
        let end = offset as usize + data.len();
        if end > buf.len() {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at {} exceeds buffer size {}",
                data.len(),
                offset,
                buf.len()
            )));
        }
        buf[offset as usize..end].copy_from_slice(data);
        Ok(())
    }
}

pub struct MockSampler {
    pub desc: SamplerDesc,
}

impl Sampler for MockSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

// ============================================================================
// Mock RenderPass / Framebuffer
// ============================================================================

pub struct MockRenderPass {
    pub desc: RenderPassDesc,
}

impl RenderPass for MockRenderPass {
    fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }
}

pub struct MockFramebuffer {
    pub width: u32,
    pub height: u32,
    /// Ids of the attached images, in attachment order
    pub attachment_ids: Vec<usize>,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

// ============================================================================
// Mock sync objects
// ============================================================================

pub struct MockFence {
    pub signaled: AtomicBool,
}

impl Fence for MockFence {}

pub struct MockSemaphore;

impl Semaphore for MockSemaphore {}

// ============================================================================
// Mock descriptors
// ============================================================================

pub struct MockDescriptorLayout {
    pub bindings: Vec<LayoutBinding>,
}

impl RawDescriptorLayout for MockDescriptorLayout {
    fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }
}

pub struct MockDescriptorPool {
    pub max_sets: u32,
    /// Sets the pool really holds before reporting exhaustion
    pub capacity: u32,
    pub sizes: Vec<DescriptorPoolSize>,
    pub allocated: AtomicU32,
}

impl RawDescriptorPool for MockDescriptorPool {
    fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

pub struct MockDescriptorSet {
    pub write_count: AtomicUsize,
}

impl RawDescriptorSet for MockDescriptorSet {}

pub struct MockPipelineLayout {
    pub set_layouts: Vec<Vec<LayoutBinding>>,
}

impl PipelineLayout for MockPipelineLayout {
    fn set_count(&self) -> u32 {
        self.set_layouts.len() as u32
    }
}

// ============================================================================
// Mock CommandList
// ============================================================================

pub struct MockCommandList {
    pub queue: QueueKind,
    pub commands: Vec<String>,
}

impl MockCommandList {
    pub fn new(queue: QueueKind) -> Self {
        Self { queue, commands: Vec::new() }
    }
}

impl CommandList for MockCommandList {
    fn queue(&self) -> QueueKind {
        self.queue
    }

    fn begin(&mut self) -> Result<()> {
        self.commands.clear();
        self.commands.push("begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.commands.push("end".to_string());
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        area: RenderArea,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.commands.push(format!(
            "begin_render_pass(attachments={}, clears={}, fb={}x{}, area={}x{})",
            render_pass.desc().attachments.len(),
            clear_values.len(),
            framebuffer.width(),
            framebuffer.height(),
            area.extent.x,
            area.extent.y
        ));
        Ok(())
    }

    fn next_subpass(&mut self) -> Result<()> {
        self.commands.push("next_subpass".to_string());
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.commands.push("end_render_pass".to_string());
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.commands.push(format!("set_viewport({}x{})", viewport.width, viewport.height));
        Ok(())
    }

    fn set_scissor(&mut self, scissor: RenderArea) -> Result<()> {
        self.commands.push(format!("set_scissor({}x{})", scissor.extent.x, scissor.extent.y));
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.commands.push(format!("draw({}, {})", vertex_count, first_vertex));
        Ok(())
    }

    fn bind_descriptor_sets(
        &mut self,
        layout: &Arc<dyn PipelineLayout>,
        first_set: u32,
        sets: &[&dyn RawDescriptorSet],
    ) -> Result<()> {
        check_set_range(layout.as_ref(), first_set, sets.len())?;
        self.commands.push(format!(
            "bind_descriptor_sets(first={}, count={}, layout_sets={})",
            first_set,
            sets.len(),
            layout.set_count()
        ));
        Ok(())
    }

    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier<'_>]) -> Result<()> {
        for b in barriers {
            self.commands.push(format!(
                "barrier({:?}->{:?}, mips={}+{}, layers={}+{})",
                b.old_layout,
                b.new_layout,
                b.base_mip_level,
                b.level_count,
                b.base_array_layer,
                b.layer_count
            ));
        }
        Ok(())
    }

    fn copy_buffer_to_image(
        &mut self,
        _src: &dyn Buffer,
        _dst: &dyn Image,
        regions: &[BufferImageCopy],
    ) -> Result<()> {
        self.commands.push(format!("copy_buffer_to_image(regions={})", regions.len()));
        Ok(())
    }

    fn blit_image(
        &mut self,
        _src: &dyn Image,
        _src_layout: ImageLayout,
        _dst: &dyn Image,
        _dst_layout: ImageLayout,
        regions: &[ImageBlit],
        filter: Filter,
    ) -> Result<()> {
        for r in regions {
            self.commands.push(format!(
                "blit(mip {}->{}, {}x{}->{}x{}, {:?})",
                r.src_mip_level,
                r.dst_mip_level,
                r.src_extent.x,
                r.src_extent.y,
                r.dst_extent.x,
                r.dst_extent.y,
                filter
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

/// One recorded `submit` call
#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub queue: QueueKind,
    pub commands: Vec<String>,
    pub wait_count: usize,
    pub signal_count: usize,
    pub has_fence: bool,
}

#[derive(Default)]
struct MockDeviceState {
    submissions: Vec<MockSubmission>,
    images: Vec<ImageDesc>,
    render_passes: Vec<RenderPassDesc>,
    framebuffers: usize,
    samplers: usize,
    buffers: usize,
    descriptor_pools: usize,
    fences: Vec<Arc<MockFence>>,
    wait_idle_calls: usize,
    submit_calls: usize,
}

pub struct MockGraphicsDevice {
    /// Reported by `has_dedicated_transfer_queue`
    pub dedicated_transfer: bool,
    /// Signal a submission's fence as soon as it is submitted
    pub auto_signal_fences: AtomicBool,
    /// Reject every `create_render_pass`
    pub fail_render_pass: AtomicBool,
    /// Fail `create_image` with `OutOfMemory`
    pub fail_image_allocation: AtomicBool,
    /// Fail `create_image` with `OutOfMemory` once this many images exist
    pub image_limit: Mutex<Option<usize>>,
    /// Sets a new descriptor pool really holds, whatever `max_sets` it reports
    pub descriptor_pool_capacity: Mutex<Option<u32>>,
    /// Zero-based `submit` calls rejected with `OutOfHostMemory`
    pub rejected_submits: Mutex<Vec<usize>>,
    next_id: AtomicUsize,
    state: Mutex<MockDeviceState>,
}

impl MockGraphicsDevice {
    pub fn new() -> Self {
        Self::with_transfer_queue(false)
    }

    pub fn with_transfer_queue(dedicated_transfer: bool) -> Self {
        Self {
            dedicated_transfer,
            auto_signal_fences: AtomicBool::new(true),
            fail_render_pass: AtomicBool::new(false),
            fail_image_allocation: AtomicBool::new(false),
            image_limit: Mutex::new(None),
            descriptor_pool_capacity: Mutex::new(None),
            rejected_submits: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            state: Mutex::new(MockDeviceState::default()),
        }
    }

    pub fn submissions(&self) -> Vec<MockSubmission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn created_images(&self) -> Vec<ImageDesc> {
        self.state.lock().unwrap().images.clone()
    }

    pub fn created_render_passes(&self) -> Vec<RenderPassDesc> {
        self.state.lock().unwrap().render_passes.clone()
    }

    pub fn framebuffer_count(&self) -> usize {
        self.state.lock().unwrap().framebuffers
    }

    pub fn sampler_count(&self) -> usize {
        self.state.lock().unwrap().samplers
    }

    pub fn buffer_count(&self) -> usize {
        self.state.lock().unwrap().buffers
    }

    pub fn descriptor_pool_count(&self) -> usize {
        self.state.lock().unwrap().descriptor_pools
    }

    pub fn wait_idle_calls(&self) -> usize {
        self.state.lock().unwrap().wait_idle_calls
    }

    /// Signal every fence created so far
    pub fn signal_all_fences(&self) {
        for fence in &self.state.lock().unwrap().fences {
            fence.signaled.store(true, Ordering::SeqCst);
        }
    }

    fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn create_image(&self, desc: &ImageDesc) -> Result<Arc<dyn Image>> {
        if self.fail_image_allocation.load(Ordering::SeqCst) {
            return Err(Error::OutOfMemory);
        }
        let mut state = self.state.lock().unwrap();
        if let Some(limit) = *self.image_limit.lock().unwrap() {
            if state.images.len() >= limit {
                return Err(Error::OutOfMemory);
            }
        }
        state.images.push(desc.clone());
        drop(state);
        Ok(Arc::new(MockImage { desc: desc.clone(), id: self.next_id() }))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        self.state.lock().unwrap().buffers += 1;
        Ok(Arc::new(MockBuffer::new(desc.size)))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>> {
        self.state.lock().unwrap().samplers += 1;
        Ok(Arc::new(MockSampler { desc: *desc }))
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        if self.fail_render_pass.load(Ordering::SeqCst) {
            return Err(Error::BackendError("VK_ERROR_FORMAT_NOT_SUPPORTED".to_string()));
        }
        self.state.lock().unwrap().render_passes.push(desc.clone());
        Ok(Arc::new(MockRenderPass { desc: desc.clone() }))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc<'_>) -> Result<Arc<dyn Framebuffer>> {
        if desc.attachments.len() != desc.render_pass.desc().attachments.len() {
            return Err(Error::BackendError(format!(
                "framebuffer has {} attachments, render pass expects {}",
                desc.attachments.len(),
                desc.render_pass.desc().attachments.len()
            )));
        }
        let attachment_ids = desc
            .attachments
            .iter()
            .map(|image| unsafe { &*(image.as_ref() as *const dyn Image as *const MockImage) }.id)
            .collect();
        self.state.lock().unwrap().framebuffers += 1;
        Ok(Arc::new(MockFramebuffer { width: desc.width, height: desc.height, attachment_ids }))
    }

    fn create_command_list(&self, queue: QueueKind) -> Result<Box<dyn CommandList>> {
        Ok(Box::new(MockCommandList::new(queue)))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        Ok(Arc::new(MockSemaphore))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        let fence = Arc::new(MockFence { signaled: AtomicBool::new(signaled) });
        self.state.lock().unwrap().fences.push(fence.clone());
        Ok(fence)
    }

    fn has_dedicated_transfer_queue(&self) -> bool {
        self.dedicated_transfer
    }

    fn submit(&self, queue: QueueKind, submission: &Submission<'_>) -> Result<()> {
        let call = {
            let mut state = self.state.lock().unwrap();
            state.submit_calls += 1;
            state.submit_calls - 1
        };
        if self.rejected_submits.lock().unwrap().contains(&call) {
            return Err(Error::OutOfHostMemory);
        }
        let mut commands = Vec::new();
        for cmd in submission.command_lists {
            let mock = unsafe { &*(*cmd as *const dyn CommandList as *const MockCommandList) };
            commands.extend(mock.commands.iter().cloned());
        }
        self.state.lock().unwrap().submissions.push(MockSubmission {
            queue,
            commands,
            wait_count: submission.wait.len(),
            signal_count: submission.signal.len(),
            has_fence: submission.fence.is_some(),
        });
        if let Some(fence) = submission.fence {
            if self.auto_signal_fences.load(Ordering::SeqCst) {
                let mock = unsafe { &*(fence as *const dyn Fence as *const MockFence) };
                mock.signaled.store(true, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    fn wait_for_fence(&self, fence: &dyn Fence, _timeout: Duration) -> Result<()> {
        let mock = unsafe { &*(fence as *const dyn Fence as *const MockFence) };
        if mock.signaled.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::DeviceLost("fence wait timed out".to_string()))
        }
    }

    fn reset_fence(&self, fence: &dyn Fence) -> Result<()> {
        let mock = unsafe { &*(fence as *const dyn Fence as *const MockFence) };
        mock.signaled.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_fence_signaled(&self, fence: &dyn Fence) -> Result<bool> {
        let mock = unsafe { &*(fence as *const dyn Fence as *const MockFence) };
        Ok(mock.signaled.load(Ordering::SeqCst))
    }

    fn create_descriptor_layout(&self, bindings: &[LayoutBinding]) -> Result<Arc<dyn RawDescriptorLayout>> {
        Ok(Arc::new(MockDescriptorLayout { bindings: bindings.to_vec() }))
    }

    fn create_pipeline_layout(&self, set_layouts: &[&dyn RawDescriptorLayout]) -> Result<Arc<dyn PipelineLayout>> {
        Ok(Arc::new(MockPipelineLayout {
            set_layouts: set_layouts.iter().map(|l| l.bindings().to_vec()).collect(),
        }))
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[DescriptorPoolSize],
    ) -> Result<Arc<dyn RawDescriptorPool>> {
        let capacity = self.descriptor_pool_capacity.lock().unwrap().unwrap_or(max_sets);
        self.state.lock().unwrap().descriptor_pools += 1;
        Ok(Arc::new(MockDescriptorPool {
            max_sets,
            capacity,
            sizes: sizes.to_vec(),
            allocated: AtomicU32::new(0),
        }))
    }

    fn allocate_descriptor_set(
        &self,
        pool: &dyn RawDescriptorPool,
        _layout: &dyn RawDescriptorLayout,
    ) -> Result<DescriptorAllocation> {
        let mock = unsafe { &*(pool as *const dyn RawDescriptorPool as *const MockDescriptorPool) };
        if mock.allocated.load(Ordering::SeqCst) >= mock.capacity {
            return Ok(DescriptorAllocation::PoolExhausted);
        }
        mock.allocated.fetch_add(1, Ordering::SeqCst);
        Ok(DescriptorAllocation::Allocated(Arc::new(MockDescriptorSet {
            write_count: AtomicUsize::new(0),
        })))
    }

    fn free_descriptor_set(&self, pool: &dyn RawDescriptorPool, _set: &dyn RawDescriptorSet) -> Result<()> {
        let mock = unsafe { &*(pool as *const dyn RawDescriptorPool as *const MockDescriptorPool) };
        mock.allocated.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn update_descriptor_set(&self, set: &dyn RawDescriptorSet, writes: &[DescriptorWrite]) -> Result<()> {
        let mock = unsafe { &*(set as *const dyn RawDescriptorSet as *const MockDescriptorSet) };
        mock.write_count.fetch_add(writes.len(), Ordering::SeqCst);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        self.state.lock().unwrap().wait_idle_calls += 1;
        Ok(())
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    pub images: Vec<Arc<dyn Image>>,
    pub extent: UVec2,
    pub format: TextureFormat,
    /// Consumed before falling back to round-robin indices
    pub acquire_script: VecDeque<Result<AcquiredImage>>,
    /// Consumed before falling back to `Ok(false)`
    pub present_script: VecDeque<Result<bool>>,
    pub presented: Vec<u32>,
    pub recreate_calls: Vec<(u32, u32)>,
    next_index: u32,
}

impl MockSwapchain {
    pub fn new(image_count: usize, width: u32, height: u32) -> Self {
        let format = TextureFormat::B8G8R8A8_SRGB;
        let images = (0..image_count)
            .map(|i| {
                Arc::new(MockImage {
                    desc: ImageDesc {
                        width,
                        height,
                        format,
                        mip_levels: 1,
                        array_layers: 1,
                        samples: 1,
                        usage: ImageUsage::COLOR_ATTACHMENT,
                        view_kind: ImageViewKind::D2,
                        cube_compatible: false,
                    },
                    id: 1_000_000 + i,
                }) as Arc<dyn Image>
            })
            .collect();
        Self {
            images,
            extent: UVec2::new(width, height),
            format,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            presented: Vec::new(),
            recreate_calls: Vec::new(),
            next_index: 0,
        }
    }
}

impl Swapchain for MockSwapchain {
    fn image_count(&self) -> usize {
        self.images.len()
    }

    fn image(&self, index: usize) -> Result<Arc<dyn Image>> {
        self.images
            .get(index)
            .cloned()
            .ok_or_else(|| Error::InvalidResource(format!("swapchain image {} out of range", index)))
    }

    fn extent(&self) -> UVec2 {
        self.extent
    }

    fn format(&self) -> TextureFormat {
        self.format
    }

    fn acquire_next_image(&mut self, _signal: &dyn Semaphore, _timeout: Duration) -> Result<AcquiredImage> {
        if let Some(scripted) = self.acquire_script.pop_front() {
            return scripted;
        }
        let index = self.next_index;
        self.next_index = (self.next_index + 1) % self.images.len() as u32;
        Ok(AcquiredImage { index, suboptimal: false })
    }

    fn present(&mut self, index: u32, _wait: &dyn Semaphore) -> Result<bool> {
        if let Some(scripted) = self.present_script.pop_front() {
            return scripted;
        }
        self.presented.push(index);
        Ok(false)
    }

    fn recreate(&mut self, width: u32, height: u32) -> Result<()> {
        self.recreate_calls.push((width, height));
        self.extent = UVec2::new(width, height);
        let count = self.images.len();
        *self = Self {
            acquire_script: std::mem::take(&mut self.acquire_script),
            present_script: std::mem::take(&mut self.present_script),
            presented: std::mem::take(&mut self.presented),
            recreate_calls: std::mem::take(&mut self.recreate_calls),
            ..Self::new(count, width, height)
        };
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
