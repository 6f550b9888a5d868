/// Instantiated render pass of a frame graph
///
/// Couples a compiled pass with its native render pass and one framebuffer
/// per swapchain image, and records the pass into a command list.

use std::sync::Arc;
use glam::UVec2;

use crate::error::{Error, Result};
use crate::graphics_device::{CommandList, Framebuffer, GraphicsDevice, RenderArea, RenderPass};
use crate::log::Logger;
use crate::render_graph::{CompiledRenderPass, SOURCE};
use crate::engine_error;

pub struct GraphPass {
    compiled: CompiledRenderPass,
    native: Arc<dyn RenderPass>,
    framebuffers: Vec<Arc<dyn Framebuffer>>,
    extent: UVec2,
}

impl GraphPass {
    /// Create the native render pass
    ///
    /// A driver rejection is reported as `InitializationFailed`; running out
    /// of memory stays `OutOfMemory`.
    pub(crate) fn new(
        device: &dyn GraphicsDevice,
        compiled: CompiledRenderPass,
        logger: &Arc<dyn Logger>,
    ) -> Result<Self> {
        let native = Self::create_native(device, &compiled, logger)?;
        Ok(Self {
            compiled,
            native,
            framebuffers: Vec::new(),
            extent: UVec2::ZERO,
        })
    }

    fn create_native(
        device: &dyn GraphicsDevice,
        compiled: &CompiledRenderPass,
        logger: &Arc<dyn Logger>,
    ) -> Result<Arc<dyn RenderPass>> {
        device.create_render_pass(&compiled.desc).map_err(|err| match err {
            Error::OutOfMemory | Error::OutOfHostMemory => err,
            other => {
                engine_error!(
                    logger,
                    SOURCE,
                    "Native creation of render pass '{}' failed: {}",
                    compiled.name,
                    other
                );
                Error::InitializationFailed(format!("render pass '{}': {}", compiled.name, other))
            }
        })
    }

    pub fn name(&self) -> &str {
        &self.compiled.name
    }

    pub fn compiled(&self) -> &CompiledRenderPass {
        &self.compiled
    }

    pub(crate) fn compiled_mut(&mut self) -> &mut CompiledRenderPass {
        &mut self.compiled
    }

    pub fn render_pass(&self) -> &Arc<dyn RenderPass> {
        &self.native
    }

    /// Framebuffer used with swapchain image `image_index`
    pub fn framebuffer(&self, image_index: usize) -> Option<&Arc<dyn Framebuffer>> {
        self.framebuffers.get(image_index)
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }

    /// Size shared by every attachment of the pass
    pub fn extent(&self) -> UVec2 {
        self.extent
    }

    pub(crate) fn recreate_native(&mut self, device: &dyn GraphicsDevice, logger: &Arc<dyn Logger>) -> Result<()> {
        self.native = Self::create_native(device, &self.compiled, logger)?;
        Ok(())
    }

    pub(crate) fn set_framebuffers(&mut self, framebuffers: Vec<Arc<dyn Framebuffer>>, extent: UVec2) {
        self.framebuffers = framebuffers;
        self.extent = extent;
    }

    /// Record the pass: begin, every subpass callback with a subpass advance
    /// in between, end
    ///
    /// `area` applies to surface-sized passes; fixed-size passes always
    /// cover their whole framebuffer. A failing callback is logged and the
    /// pass is still ended.
    pub fn record(
        &mut self,
        cmd: &mut dyn CommandList,
        image_index: usize,
        area: RenderArea,
        surface_extent: UVec2,
        logger: &Arc<dyn Logger>,
    ) -> Result<()> {
        let framebuffer = self.framebuffers.get(image_index).ok_or_else(|| {
            Error::InvalidResource(format!(
                "render pass '{}' has no framebuffer for image {}",
                self.compiled.name, image_index
            ))
        })?;
        let area = if self.extent == surface_extent {
            area
        } else {
            RenderArea::from_extent(self.extent.x, self.extent.y)
        };

        cmd.begin_render_pass(&self.native, framebuffer, area, &self.compiled.clear_values)?;
        for (index, callback) in self.compiled.callbacks.iter_mut().enumerate() {
            if index > 0 {
                cmd.next_subpass()?;
            }
            let Some(callback) = callback else {
                continue;
            };
            if let Err(err) = callback(&mut *cmd) {
                engine_error!(
                    logger,
                    SOURCE,
                    "Subpass '{}' of render pass '{}' failed: {}",
                    self.compiled.subpass_names[index],
                    self.compiled.name,
                    err
                );
            }
        }
        cmd.end_render_pass()
    }
}
