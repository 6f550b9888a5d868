/// Instantiated frame graph
///
/// Owns the native render passes, the backing images of every attachment
/// except the presented one, and one framebuffer per pass per swapchain
/// image. The presented attachment is bound to the swapchain image the
/// frame renders to.

use std::sync::Arc;
use glam::UVec2;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::graphics_device::{
    CommandList, Framebuffer, FramebufferDesc, GraphicsDevice, Image, ImageUsage, RenderArea,
    RenderPass, Swapchain,
};
use crate::log::Logger;
use crate::registry::{ImageKey, ResourceRegistry};
use crate::render_graph::{CompiledGraph, CompiledRenderPass, GraphPass, ATTACHMENT_REST_LAYOUT, SOURCE};
use crate::upload::{AttachmentImageDetails, TextureId, TextureManager};
use crate::{engine_debug, engine_err, engine_error, engine_info, engine_warn};

pub struct FrameGraph {
    device: Arc<dyn GraphicsDevice>,
    textures: Arc<TextureManager>,
    registry: ResourceRegistry,
    backings: FxHashMap<ImageKey, TextureId>,
    passes: Vec<GraphPass>,
    present_attachment: String,
    extent: UVec2,
    logger: Arc<dyn Logger>,
}

impl FrameGraph {
    /// Create every GPU object of a compiled graph for `swapchain`
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        textures: Arc<TextureManager>,
        swapchain: &dyn Swapchain,
        graph: CompiledGraph,
    ) -> Result<Self> {
        let CompiledGraph { attachments, passes: compiled, present_attachment, logger } = graph;

        let mut registry = ResourceRegistry::new(logger.clone());
        for attachment in &attachments {
            registry.register(attachment.image_info())?;
        }

        let mut passes = Vec::with_capacity(compiled.len());
        for mut pass in compiled {
            Self::patch_present_format(&mut pass, swapchain);
            passes.push(GraphPass::new(device.as_ref(), pass, &logger)?);
        }

        let mut graph = Self {
            device,
            textures,
            registry,
            backings: FxHashMap::default(),
            passes,
            present_attachment,
            extent: swapchain.extent(),
            logger,
        };
        graph.create_backings(swapchain.extent())?;
        graph.create_framebuffers(swapchain)?;

        engine_info!(
            graph.logger,
            SOURCE,
            "Frame graph ready: {} pass(es), {} backing image(s), {}x{}",
            graph.passes.len(),
            graph.backings.len(),
            graph.extent.x,
            graph.extent.y
        );
        Ok(graph)
    }

    // ===== ACCESSORS =====

    /// Native render pass at `pass_index` (execution order)
    pub fn get(&self, pass_index: usize) -> Result<&Arc<dyn RenderPass>> {
        self.passes
            .get(pass_index)
            .map(|pass| pass.render_pass())
            .ok_or_else(|| {
                Error::InvalidResource(format!(
                    "render pass index {} out of range ({} passes)",
                    pass_index,
                    self.passes.len()
                ))
            })
    }

    pub fn pass_index(&self, name: &str) -> Option<usize> {
        self.passes.iter().position(|pass| pass.name() == name)
    }

    pub fn pass(&self, index: usize) -> Option<&GraphPass> {
        self.passes.get(index)
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn present_attachment(&self) -> &str {
        &self.present_attachment
    }

    pub fn extent(&self) -> UVec2 {
        self.extent
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Texture backing attachment `name`, sampleable by later passes
    pub fn attachment_texture(&self, name: &str) -> Option<TextureId> {
        let key = self.registry.key(name)?;
        self.backings.get(&key).copied()
    }

    pub fn attachment_image(&self, name: &str) -> Option<Arc<dyn Image>> {
        self.registry.get_by_name(name)?.backing.clone()
    }

    // ===== RECORDING =====

    /// Record every pass, in execution order, for swapchain image `image_index`
    ///
    /// The command list must be recording. Calling this twice for the same
    /// image records the same commands twice.
    pub fn fill_command_buffer(
        &mut self,
        cmd: &mut dyn CommandList,
        image_index: u32,
        area: RenderArea,
    ) -> Result<()> {
        for pass in &mut self.passes {
            pass.record(cmd, image_index as usize, area, self.extent, &self.logger)?;
        }
        Ok(())
    }

    // ===== REBUILD =====

    /// Recreate size-dependent objects after the swapchain changed
    ///
    /// The caller makes sure the device is idle.
    pub fn rebuild(&mut self, swapchain: &dyn Swapchain) -> Result<()> {
        let extent = swapchain.extent();
        engine_debug!(
            self.logger,
            SOURCE,
            "Rebuilding frame graph {}x{} -> {}x{}",
            self.extent.x,
            self.extent.y,
            extent.x,
            extent.y
        );

        for pass in &mut self.passes {
            pass.set_framebuffers(Vec::new(), UVec2::ZERO);
        }
        self.release_backings();

        for pass in &mut self.passes {
            Self::patch_present_format(pass.compiled_mut(), swapchain);
            pass.recreate_native(self.device.as_ref(), &self.logger)?;
        }
        self.extent = extent;
        self.create_backings(extent)?;
        self.create_framebuffers(swapchain)
    }

    // ===== INTERNALS =====

    fn patch_present_format(pass: &mut CompiledRenderPass, swapchain: &dyn Swapchain) {
        if let Some(index) = pass.presented_index() {
            let format = swapchain.format();
            pass.attachments[index].format = format;
            pass.desc.attachments[index].format = format;
        }
    }

    /// Allocate every used attachment; on failure nothing allocated so far
    /// survives
    fn create_backings(&mut self, surface: UVec2) -> Result<()> {
        let result = self.allocate_backings(surface);
        if result.is_err() {
            self.release_backings();
        }
        result
    }

    fn allocate_backings(&mut self, surface: UVec2) -> Result<()> {
        let used: FxHashSet<&str> = self
            .passes
            .iter()
            .flat_map(|pass| pass.compiled().attachments.iter())
            .filter(|a| !a.is_presented)
            .map(|a| a.name.as_str())
            .collect();

        for (key, entry) in self.registry.iter() {
            if !used.contains(entry.info.name.as_str()) {
                if entry.info.name != self.present_attachment {
                    engine_warn!(self.logger, SOURCE, "Attachment '{}' is never used", entry.info.name);
                }
                continue;
            }
            let (width, height) = entry.info.resolved_extent(surface.x, surface.y);
            let usage = if entry.info.format.is_depth() {
                ImageUsage::DEPTH_STENCIL_ATTACHMENT | ImageUsage::SAMPLED | ImageUsage::INPUT_ATTACHMENT
            } else {
                ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED | ImageUsage::INPUT_ATTACHMENT
            };
            let id = self.textures.create_attachment_image(&AttachmentImageDetails {
                width,
                height,
                format: entry.info.format,
                samples: entry.info.samples,
                usage,
                layout: ATTACHMENT_REST_LAYOUT,
            })?;
            self.backings.insert(key, id);
        }

        let created: Vec<(ImageKey, TextureId)> = self.backings.iter().map(|(&key, &id)| (key, id)).collect();
        for (key, id) in created {
            let image = self.textures.get_resource(id)?.image;
            self.registry.attach_backing(key, image)?;
        }
        Ok(())
    }

    fn create_framebuffers(&mut self, swapchain: &dyn Swapchain) -> Result<()> {
        let surface = swapchain.extent();
        let image_count = swapchain.image_count();

        for pass_index in 0..self.passes.len() {
            let pass = &self.passes[pass_index];
            let extent = self.pass_extent(pass, surface)?;
            let presented = pass.compiled().presented_index();

            let mut images: Vec<Arc<dyn Image>> = Vec::with_capacity(pass.compiled().attachments.len());
            for attachment in &pass.compiled().attachments {
                if attachment.is_presented {
                    // placeholder, replaced per swapchain image below
                    images.push(swapchain.image(0)?);
                    continue;
                }
                let backing = self
                    .registry
                    .get_by_name(&attachment.name)
                    .and_then(|entry| entry.backing.clone())
                    .ok_or_else(|| {
                        engine_err!(self.logger, SOURCE, "Attachment '{}' has no backing image", attachment.name)
                    })?;
                images.push(backing);
            }

            let mut framebuffers: Vec<Arc<dyn Framebuffer>> = Vec::with_capacity(image_count);
            match presented {
                Some(slot) => {
                    for image_index in 0..image_count {
                        images[slot] = swapchain.image(image_index)?;
                        framebuffers.push(self.create_framebuffer(pass, &images, extent)?);
                    }
                }
                None => {
                    let shared = self.create_framebuffer(pass, &images, extent)?;
                    framebuffers.resize(image_count, shared);
                }
            }

            self.passes[pass_index].set_framebuffers(framebuffers, extent);
        }
        Ok(())
    }

    fn create_framebuffer(
        &self,
        pass: &GraphPass,
        images: &[Arc<dyn Image>],
        extent: UVec2,
    ) -> Result<Arc<dyn Framebuffer>> {
        self.device.create_framebuffer(&FramebufferDesc {
            render_pass: pass.render_pass(),
            attachments: images,
            width: extent.x,
            height: extent.y,
        })
    }

    /// Common size of the pass attachments; passes without any follow the surface
    fn pass_extent(&self, pass: &GraphPass, surface: UVec2) -> Result<UVec2> {
        let mut extent: Option<(UVec2, &str)> = None;
        for attachment in &pass.compiled().attachments {
            let size = if attachment.is_presented {
                surface
            } else {
                let entry = self.registry.get_by_name(&attachment.name).ok_or_else(|| {
                    Error::InvalidResource(format!("attachment '{}' is not registered", attachment.name))
                })?;
                let (w, h) = entry.info.resolved_extent(surface.x, surface.y);
                UVec2::new(w, h)
            };
            match extent {
                None => extent = Some((size, attachment.name.as_str())),
                Some((expected, first)) if expected != size => {
                    let message = format!(
                        "Render pass '{}' mixes attachment sizes: '{}' is {}x{}, '{}' is {}x{}",
                        pass.name(),
                        first,
                        expected.x,
                        expected.y,
                        attachment.name,
                        size.x,
                        size.y
                    );
                    engine_error!(self.logger, SOURCE, "{}", message);
                    return Err(Error::GraphCompilation(message));
                }
                Some(_) => {}
            }
        }
        Ok(extent.map(|(size, _)| size).unwrap_or(surface))
    }

    fn release_backings(&mut self) {
        for (_, id) in self.backings.drain() {
            if let Err(err) = self.textures.delete_texture(id) {
                engine_warn!(self.logger, SOURCE, "Releasing attachment {} failed: {}", id, err);
            }
        }
        self.registry.clear_backings();
    }
}

impl Drop for FrameGraph {
    fn drop(&mut self) {
        self.release_backings();
    }
}

#[cfg(test)]
#[path = "frame_graph_tests.rs"]
mod tests;
