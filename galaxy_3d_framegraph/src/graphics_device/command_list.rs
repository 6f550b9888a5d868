/// CommandList trait - for recording rendering and transfer commands

use std::sync::Arc;
use glam::UVec2;
use crate::error::Result;
use crate::graphics_device::{
    AccessFlags, Buffer, ClearValue, Filter, Framebuffer, Image, ImageLayout,
    PipelineLayout, PipelineStages, QueueKind, RawDescriptorSet, RenderArea,
    RenderPass, Viewport,
};

/// Command list for recording commands
///
/// Commands are recorded and later submitted to the queue the list was
/// created for via `GraphicsDevice::submit()`. `begin()` resets any
/// previously recorded content.
pub trait CommandList: Send + Sync {
    /// Queue family the list records for
    fn queue(&self) -> QueueKind;

    /// Begin recording commands
    fn begin(&mut self) -> Result<()>;

    /// End recording commands
    fn end(&mut self) -> Result<()>;

    /// Begin a render pass
    ///
    /// # Arguments
    ///
    /// * `render_pass` - The render pass to begin
    /// * `framebuffer` - Images bound to the pass attachments
    /// * `area` - Region of the framebuffer affected by the pass
    /// * `clear_values` - One clear value per attachment, in attachment order
    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RenderPass>,
        framebuffer: &Arc<dyn Framebuffer>,
        area: RenderArea,
        clear_values: &[ClearValue],
    ) -> Result<()>;

    /// Advance to the next subpass of the current render pass
    fn next_subpass(&mut self) -> Result<()>;

    /// End the current render pass
    fn end_render_pass(&mut self) -> Result<()>;

    /// Set the viewport
    fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Set the scissor rectangle
    fn set_scissor(&mut self, scissor: RenderArea) -> Result<()>;

    /// Draw vertices
    ///
    /// # Arguments
    ///
    /// * `vertex_count` - Number of vertices to draw
    /// * `first_vertex` - Index of first vertex
    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()>;

    /// Bind descriptor sets for the following draws
    ///
    /// # Arguments
    ///
    /// * `layout` - Pipeline layout the sets are compatible with
    /// * `first_set` - Set slot of `sets[0]`; the others follow consecutively
    /// * `sets` - Sets to bind
    ///
    /// Fails with `InvalidResource` when the sets do not fit in `layout`.
    fn bind_descriptor_sets(
        &mut self,
        layout: &Arc<dyn PipelineLayout>,
        first_set: u32,
        sets: &[&dyn RawDescriptorSet],
    ) -> Result<()>;

    /// Record image memory barriers (layout transitions)
    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier<'_>]) -> Result<()>;

    /// Copy buffer regions into an image in `TransferDst` layout
    fn copy_buffer_to_image(
        &mut self,
        src: &dyn Buffer,
        dst: &dyn Image,
        regions: &[BufferImageCopy],
    ) -> Result<()>;

    /// Blit regions between mip levels or images
    fn blit_image(
        &mut self,
        src: &dyn Image,
        src_layout: ImageLayout,
        dst: &dyn Image,
        dst_layout: ImageLayout,
        regions: &[ImageBlit],
        filter: Filter,
    ) -> Result<()>;
}

/// Layout transition of a subresource range
#[derive(Clone, Copy)]
pub struct ImageBarrier<'a> {
    pub image: &'a dyn Image,
    pub old_layout: ImageLayout,
    pub new_layout: ImageLayout,
    pub base_mip_level: u32,
    pub level_count: u32,
    pub base_array_layer: u32,
    pub layer_count: u32,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
}

/// Buffer to image copy of one mip level of one array layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferImageCopy {
    /// Byte offset of the layer data in the buffer
    pub buffer_offset: u64,
    pub mip_level: u32,
    pub array_layer: u32,
    pub extent: UVec2,
}

/// Scaled copy from one mip level to another over a range of layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBlit {
    pub src_mip_level: u32,
    pub src_extent: UVec2,
    pub dst_mip_level: u32,
    pub dst_extent: UVec2,
    pub base_array_layer: u32,
    pub layer_count: u32,
}
