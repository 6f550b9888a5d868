/// RenderPass - Vulkan implementation of the RenderPass trait

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::render::{
    AttachmentReference, RenderPass as RendererRenderPass, RenderPassDesc,
};
use galaxy_3d_framegraph::galaxy3d::Result;
use std::sync::Arc;

use crate::vulkan_context::GpuContext;
use crate::vulkan_convert::{
    access_flags_to_vk, format_to_vk, image_layout_to_vk, load_op_to_vk, pipeline_stages_to_vk,
    sample_count_to_vk, store_op_to_vk, subpass_index_to_vk, vk_err,
};

/// Vulkan render pass with the descriptor it was created from
pub struct RenderPass {
    ctx: Arc<GpuContext>,
    pub(crate) render_pass: vk::RenderPass,
    desc: RenderPassDesc,
}

fn reference_to_vk(reference: &AttachmentReference) -> vk::AttachmentReference {
    vk::AttachmentReference {
        attachment: reference.attachment,
        layout: image_layout_to_vk(reference.layout),
    }
}

/// Native attachment references of one subpass
///
/// Kept alive until `create_render_pass` returns since the subpass
/// descriptions point into them.
struct SubpassRefs {
    input: Vec<vk::AttachmentReference>,
    color: Vec<vk::AttachmentReference>,
    resolve: Vec<vk::AttachmentReference>,
    depth: Option<vk::AttachmentReference>,
    preserve: Vec<u32>,
}

impl RenderPass {
    pub(crate) fn new(ctx: Arc<GpuContext>, desc: &RenderPassDesc) -> Result<Self> {
        let attachments: Vec<vk::AttachmentDescription> = desc
            .attachments
            .iter()
            .map(|a| {
                vk::AttachmentDescription::default()
                    .format(format_to_vk(a.format))
                    .samples(sample_count_to_vk(a.samples))
                    .load_op(load_op_to_vk(a.load_op))
                    .store_op(store_op_to_vk(a.store_op))
                    .stencil_load_op(load_op_to_vk(a.stencil_load_op))
                    .stencil_store_op(store_op_to_vk(a.stencil_store_op))
                    .initial_layout(image_layout_to_vk(a.initial_layout))
                    .final_layout(image_layout_to_vk(a.final_layout))
            })
            .collect();

        let refs: Vec<SubpassRefs> = desc
            .subpasses
            .iter()
            .map(|s| SubpassRefs {
                input: s.input_attachments.iter().map(reference_to_vk).collect(),
                color: s.color_attachments.iter().map(reference_to_vk).collect(),
                resolve: s.resolve_attachments.iter().map(reference_to_vk).collect(),
                depth: s.depth_stencil_attachment.as_ref().map(reference_to_vk),
                preserve: s.preserve_attachments.clone(),
            })
            .collect();

        let mut subpasses: Vec<vk::SubpassDescription> = refs
            .iter()
            .map(|r| {
                let mut subpass = vk::SubpassDescription::default()
                    .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
                    .input_attachments(&r.input)
                    .color_attachments(&r.color)
                    .preserve_attachments(&r.preserve);
                if !r.resolve.is_empty() {
                    subpass = subpass.resolve_attachments(&r.resolve);
                }
                if let Some(depth) = r.depth.as_ref() {
                    subpass = subpass.depth_stencil_attachment(depth);
                }
                subpass
            })
            .collect();
        // a render pass needs at least one subpass
        if subpasses.is_empty() {
            subpasses.push(
                vk::SubpassDescription::default().pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS),
            );
        }

        let dependencies: Vec<vk::SubpassDependency> = desc
            .dependencies
            .iter()
            .map(|d| {
                vk::SubpassDependency::default()
                    .src_subpass(subpass_index_to_vk(d.src_subpass))
                    .dst_subpass(subpass_index_to_vk(d.dst_subpass))
                    .src_stage_mask(pipeline_stages_to_vk(d.src_stages))
                    .dst_stage_mask(pipeline_stages_to_vk(d.dst_stages))
                    .src_access_mask(access_flags_to_vk(d.src_access))
                    .dst_access_mask(access_flags_to_vk(d.dst_access))
                    .dependency_flags(if d.by_region {
                        vk::DependencyFlags::BY_REGION
                    } else {
                        vk::DependencyFlags::empty()
                    })
            })
            .collect();

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe {
            ctx.device
                .create_render_pass(&create_info, None)
                .map_err(|e| vk_err(ctx.logger.as_ref(), e, "create_render_pass"))?
        };
        Ok(Self { ctx, render_pass, desc: desc.clone() })
    }
}

impl RendererRenderPass for RenderPass {
    fn desc(&self) -> &RenderPassDesc {
        &self.desc
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.ctx.device.destroy_render_pass(self.render_pass, None);
        }
    }
}
