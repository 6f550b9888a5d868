/// Framebuffer - Vulkan implementation of the Framebuffer trait
///
/// Wraps a VkFramebuffer and keeps its attachment images alive.
/// Created once per graph build, reused each frame.

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::render::{
    Framebuffer as RendererFramebuffer, FramebufferDesc, Image as RendererImage,
    RenderPass as RendererRenderPass,
};
use galaxy_3d_framegraph::galaxy3d::{Error, Result};
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::vk_err;
use crate::vulkan_image::Image;
use crate::vulkan_render_pass::RenderPass;

/// Vulkan framebuffer implementation
///
/// Destroyed when dropped.
pub struct Framebuffer {
    ctx: Arc<GpuContext>,
    pub(crate) framebuffer: vk::Framebuffer,
    width: u32,
    height: u32,
    /// Images referenced by the framebuffer views
    _attachments: Vec<Arc<dyn RendererImage>>,
}

impl Framebuffer {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &FramebufferDesc<'_>) -> Result<Self> {
        let expected = desc.render_pass.desc().attachments.len();
        if desc.attachments.len() != expected {
            return Err(Error::InvalidResource(format!(
                "framebuffer has {} attachments, render pass expects {}",
                desc.attachments.len(),
                expected
            )));
        }
        if desc.width == 0 || desc.height == 0 {
            return Err(Error::InvalidResource("framebuffer extent must be > 0".to_string()));
        }

        // Downcast to the Vulkan types (the only backend images/passes this
        // device ever hands out)
        let render_pass = unsafe {
            &*(desc.render_pass.as_ref() as *const dyn RendererRenderPass as *const RenderPass)
        };
        let views: Vec<vk::ImageView> = desc
            .attachments
            .iter()
            .map(|image| unsafe { (*(image.as_ref() as *const dyn RendererImage as *const Image)).view })
            .collect();

        let create_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass.render_pass)
            .attachments(&views)
            .width(desc.width)
            .height(desc.height)
            .layers(1);

        let framebuffer = unsafe {
            ctx.device
                .create_framebuffer(&create_info, None)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_framebuffer"))?
        };
        Ok(Self {
            ctx,
            framebuffer,
            width: desc.width,
            height: desc.height,
            _attachments: desc.attachments.to_vec(),
        })
    }
}

impl RendererFramebuffer for Framebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}
