/// CommandList - Vulkan implementation of the CommandList trait

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::render::{
    Buffer as RendererBuffer, BufferImageCopy, ClearValue, CommandList as RendererCommandList,
    Filter, Framebuffer as RendererFramebuffer, Image as RendererImage, ImageBarrier, ImageBlit,
    ImageLayout, PipelineLayout as RendererPipelineLayout, QueueKind, RawDescriptorSet, RenderArea,
    RenderPass as RendererRenderPass, Viewport, check_set_range,
};
use galaxy_3d_framegraph::galaxy3d::{Error, Result};
use galaxy_3d_framegraph::glam::UVec2;
use std::sync::Arc;

use crate::vulkan_buffer::Buffer;
use crate::vulkan_context::GpuContext;
use crate::vulkan_descriptor::{DescriptorSet, PipelineLayout};
use crate::vulkan_convert::{
    access_flags_to_vk, filter_to_vk, image_layout_to_vk, pipeline_stages_to_vk, vk_err,
};
use crate::vulkan_frame_buffer::Framebuffer;
use crate::vulkan_image::Image;
use crate::vulkan_render_pass::RenderPass;

/// Vulkan command list implementation
///
/// Owns a command pool on the family of its queue and one primary
/// command buffer. The list must not be dropped while a submission that
/// uses it is still executing.
pub struct CommandList {
    ctx: Arc<GpuContext>,
    queue: QueueKind,
    command_pool: vk::CommandPool,
    pub(crate) command_buffer: vk::CommandBuffer,
    /// Whether the command list is currently recording
    is_recording: bool,
    /// Whether we're inside a render pass
    in_render_pass: bool,
    /// Objects referenced by the recorded commands
    render_passes: Vec<Arc<dyn RendererRenderPass>>,
    framebuffers: Vec<Arc<dyn RendererFramebuffer>>,
    pipeline_layouts: Vec<Arc<dyn RendererPipelineLayout>>,
}

fn vk_image(image: &dyn RendererImage) -> &Image {
    unsafe { &*(image as *const dyn RendererImage as *const Image) }
}

fn clear_value_to_vk(value: &ClearValue) -> vk::ClearValue {
    match *value {
        ClearValue::Color(float32) => vk::ClearValue {
            color: vk::ClearColorValue { float32 },
        },
        ClearValue::DepthStencil { depth, stencil } => vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
        },
    }
}

impl CommandList {
    pub(crate) fn new(ctx: Arc<GpuContext>, queue: QueueKind) -> Result<Self> {
        let family = ctx.queue(queue).family;
        unsafe {
            let command_pool_create_info = vk::CommandPoolCreateInfo::default()
                .queue_family_index(family)
                .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

            let command_pool = ctx
                .device
                .create_command_pool(&command_pool_create_info, None)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_command_pool"))?;

            let command_buffer_allocate_info = vk::CommandBufferAllocateInfo::default()
                .command_pool(command_pool)
                .level(vk::CommandBufferLevel::PRIMARY)
                .command_buffer_count(1);

            let command_buffer = match ctx.device.allocate_command_buffers(&command_buffer_allocate_info) {
                Ok(buffers) => buffers[0],
                Err(e) => {
                    ctx.device.destroy_command_pool(command_pool, None);
                    return Err(vk_err(ctx.logger.as_ref(), e, "allocate_command_buffers"));
                }
            };

            Ok(Self {
                ctx,
                queue,
                command_pool,
                command_buffer,
                is_recording: false,
                in_render_pass: false,
                render_passes: Vec::new(),
                framebuffers: Vec::new(),
                pipeline_layouts: Vec::new(),
            })
        }
    }

    fn ensure_recording(&self) -> Result<()> {
        if self.is_recording {
            Ok(())
        } else {
            Err(Error::BackendError("Command list not recording".to_string()))
        }
    }

    fn ensure_outside_render_pass(&self, what: &str) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            return Err(Error::BackendError(format!("{} is not allowed inside a render pass", what)));
        }
        Ok(())
    }
}

impl RendererCommandList for CommandList {
    fn queue(&self) -> QueueKind {
        self.queue
    }

    fn begin(&mut self) -> Result<()> {
        unsafe {
            // also discards a recording abandoned after an error
            self.ctx
                .device
                .reset_command_buffer(self.command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(|e| vk_err(self.ctx.logger.as_ref(), e, "reset_command_buffer"))?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

            self.ctx
                .device
                .begin_command_buffer(self.command_buffer, &begin_info)
                .map_err(|e| vk_err(self.ctx.logger.as_ref(), e, "begin_command_buffer"))?;
        }
        self.is_recording = true;
        self.in_render_pass = false;
        self.render_passes.clear();
        self.framebuffers.clear();
        self.pipeline_layouts.clear();
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if self.in_render_pass {
            return Err(Error::BackendError("Render pass not ended before ending command list".to_string()));
        }
        unsafe {
            self.ctx
                .device
                .end_command_buffer(self.command_buffer)
                .map_err(|e| vk_err(self.ctx.logger.as_ref(), e, "end_command_buffer"))?;
        }
        self.is_recording = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &Arc<dyn RendererRenderPass>,
        framebuffer: &Arc<dyn RendererFramebuffer>,
        area: RenderArea,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        self.ensure_outside_render_pass("begin_render_pass")?;

        let vk_render_pass = unsafe { &*(render_pass.as_ref() as *const dyn RendererRenderPass as *const RenderPass) };
        let vk_framebuffer = unsafe { &*(framebuffer.as_ref() as *const dyn RendererFramebuffer as *const Framebuffer) };
        let vk_clear_values: Vec<vk::ClearValue> = clear_values.iter().map(clear_value_to_vk).collect();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(vk_render_pass.render_pass)
            .framebuffer(vk_framebuffer.framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: area.offset.x, y: area.offset.y },
                extent: vk::Extent2D { width: area.extent.x, height: area.extent.y },
            })
            .clear_values(&vk_clear_values);

        unsafe {
            self.ctx
                .device
                .cmd_begin_render_pass(self.command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
        self.in_render_pass = true;
        self.render_passes.push(render_pass.clone());
        self.framebuffers.push(framebuffer.clone());
        Ok(())
    }

    fn next_subpass(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            return Err(Error::BackendError("next_subpass outside a render pass".to_string()));
        }
        unsafe {
            self.ctx.device.cmd_next_subpass(self.command_buffer, vk::SubpassContents::INLINE);
        }
        Ok(())
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            return Err(Error::BackendError("Not inside a render pass".to_string()));
        }
        unsafe {
            self.ctx.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.ensure_recording()?;
        let vk_viewport = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe {
            self.ctx.device.cmd_set_viewport(self.command_buffer, 0, &[vk_viewport]);
        }
        Ok(())
    }

    fn set_scissor(&mut self, scissor: RenderArea) -> Result<()> {
        self.ensure_recording()?;
        let rect = vk::Rect2D {
            offset: vk::Offset2D { x: scissor.offset.x, y: scissor.offset.y },
            extent: vk::Extent2D { width: scissor.extent.x, height: scissor.extent.y },
        };
        unsafe {
            self.ctx.device.cmd_set_scissor(self.command_buffer, 0, &[rect]);
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32, first_vertex: u32) -> Result<()> {
        self.ensure_recording()?;
        if !self.in_render_pass {
            return Err(Error::BackendError("draw outside a render pass".to_string()));
        }
        unsafe {
            self.ctx.device.cmd_draw(self.command_buffer, vertex_count, 1, first_vertex, 0);
        }
        Ok(())
    }

    fn bind_descriptor_sets(
        &mut self,
        layout: &Arc<dyn RendererPipelineLayout>,
        first_set: u32,
        sets: &[&dyn RawDescriptorSet],
    ) -> Result<()> {
        self.ensure_recording()?;
        check_set_range(layout.as_ref(), first_set, sets.len())?;
        if sets.is_empty() {
            return Ok(());
        }

        let vk_layout = unsafe { &*(layout.as_ref() as *const dyn RendererPipelineLayout as *const PipelineLayout) };
        let vk_sets: Vec<vk::DescriptorSet> = sets
            .iter()
            .map(|set| unsafe { (*(*set as *const dyn RawDescriptorSet as *const DescriptorSet)).set })
            .collect();

        unsafe {
            self.ctx.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                vk_layout.layout,
                first_set,
                &vk_sets,
                &[],
            );
        }
        self.pipeline_layouts.push(layout.clone());
        Ok(())
    }

    fn pipeline_barrier(&mut self, barriers: &[ImageBarrier<'_>]) -> Result<()> {
        self.ensure_outside_render_pass("pipeline_barrier")?;
        if barriers.is_empty() {
            return Ok(());
        }

        let mut src_stages = vk::PipelineStageFlags::empty();
        let mut dst_stages = vk::PipelineStageFlags::empty();
        let image_barriers: Vec<vk::ImageMemoryBarrier> = barriers
            .iter()
            .map(|b| {
                src_stages |= pipeline_stages_to_vk(b.src_stages);
                dst_stages |= pipeline_stages_to_vk(b.dst_stages);
                let image = vk_image(b.image);
                vk::ImageMemoryBarrier::default()
                    .old_layout(image_layout_to_vk(b.old_layout))
                    .new_layout(image_layout_to_vk(b.new_layout))
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(image.image)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: image.aspect,
                        base_mip_level: b.base_mip_level,
                        level_count: b.level_count,
                        base_array_layer: b.base_array_layer,
                        layer_count: b.layer_count,
                    })
                    .src_access_mask(access_flags_to_vk(b.src_access))
                    .dst_access_mask(access_flags_to_vk(b.dst_access))
            })
            .collect();

        unsafe {
            self.ctx.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stages,
                dst_stages,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &image_barriers,
            );
        }
        Ok(())
    }

    fn copy_buffer_to_image(
        &mut self,
        src: &dyn RendererBuffer,
        dst: &dyn RendererImage,
        regions: &[BufferImageCopy],
    ) -> Result<()> {
        self.ensure_outside_render_pass("copy_buffer_to_image")?;
        let vk_buffer = unsafe { &*(src as *const dyn RendererBuffer as *const Buffer) };
        let image = vk_image(dst);

        let copies: Vec<vk::BufferImageCopy> = regions
            .iter()
            .map(|r| {
                vk::BufferImageCopy::default()
                    .buffer_offset(r.buffer_offset)
                    .buffer_row_length(0)
                    .buffer_image_height(0)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: image.aspect,
                        mip_level: r.mip_level,
                        base_array_layer: r.array_layer,
                        layer_count: 1,
                    })
                    .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                    .image_extent(vk::Extent3D { width: r.extent.x, height: r.extent.y, depth: 1 })
            })
            .collect();

        unsafe {
            self.ctx.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                vk_buffer.buffer,
                image.image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &copies,
            );
        }
        Ok(())
    }

    fn blit_image(
        &mut self,
        src: &dyn RendererImage,
        src_layout: ImageLayout,
        dst: &dyn RendererImage,
        dst_layout: ImageLayout,
        regions: &[ImageBlit],
        filter: Filter,
    ) -> Result<()> {
        self.ensure_outside_render_pass("blit_image")?;
        let src_image = vk_image(src);
        let dst_image = vk_image(dst);

        let corner = |extent: UVec2| vk::Offset3D {
            x: extent.x.max(1) as i32,
            y: extent.y.max(1) as i32,
            z: 1,
        };
        let blits: Vec<vk::ImageBlit> = regions
            .iter()
            .map(|r| {
                vk::ImageBlit::default()
                    .src_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: src_image.aspect,
                        mip_level: r.src_mip_level,
                        base_array_layer: r.base_array_layer,
                        layer_count: r.layer_count,
                    })
                    .src_offsets([vk::Offset3D::default(), corner(r.src_extent)])
                    .dst_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: dst_image.aspect,
                        mip_level: r.dst_mip_level,
                        base_array_layer: r.base_array_layer,
                        layer_count: r.layer_count,
                    })
                    .dst_offsets([vk::Offset3D::default(), corner(r.dst_extent)])
            })
            .collect();

        unsafe {
            self.ctx.device.cmd_blit_image(
                self.command_buffer,
                src_image.image,
                image_layout_to_vk(src_layout),
                dst_image.image,
                image_layout_to_vk(dst_layout),
                &blits,
                filter_to_vk(filter),
            );
        }
        Ok(())
    }
}

impl Drop for CommandList {
    fn drop(&mut self) {
        unsafe {
            // frees the command buffer as well
            self.ctx.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Native command buffer of an engine command list created by this backend
pub(crate) fn vk_command_buffer(list: &dyn RendererCommandList) -> vk::CommandBuffer {
    unsafe { (*(list as *const dyn RendererCommandList as *const CommandList)).command_buffer }
}
