/// RenderPass trait - describes how attachments are loaded, stored and
/// transitioned across the subpasses of one render pass

use crate::graphics_device::{
    AccessFlags, ImageLayout, LoadOp, PipelineStages, StoreOp, TextureFormat,
};

/// Subpass index standing for "before/after the render pass"
pub const SUBPASS_EXTERNAL: u32 = u32::MAX;

/// Native render pass object
///
/// Created via `GraphicsDevice::create_render_pass()` from a fully resolved
/// `RenderPassDesc`.
pub trait RenderPass: Send + Sync {
    /// Descriptor the pass was created from
    fn desc(&self) -> &RenderPassDesc;
}

/// Descriptor for creating a render pass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderPassDesc {
    /// Attachment descriptions, indexed by `AttachmentReference::attachment`
    pub attachments: Vec<AttachmentDescription>,
    /// Subpasses in execution order
    pub subpasses: Vec<SubpassLayout>,
    /// Execution and memory dependencies between subpasses
    pub dependencies: Vec<SubpassDependency>,
}

/// Descriptor for a single attachment in a render pass
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentDescription {
    /// Pixel format
    pub format: TextureFormat,
    /// Number of samples (1 = no MSAA)
    pub samples: u32,
    /// What to do with existing content
    pub load_op: LoadOp,
    /// What to do with rendered content
    pub store_op: StoreOp,
    pub stencil_load_op: LoadOp,
    pub stencil_store_op: StoreOp,
    /// Layout the attachment is in when the pass begins
    pub initial_layout: ImageLayout,
    /// Layout the attachment is transitioned to when the pass ends
    pub final_layout: ImageLayout,
}

/// Reference from a subpass to an attachment index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentReference {
    pub attachment: u32,
    /// Layout during the subpass
    pub layout: ImageLayout,
}

/// Attachment usage of one subpass
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubpassLayout {
    pub input_attachments: Vec<AttachmentReference>,
    pub color_attachments: Vec<AttachmentReference>,
    /// Empty, or one entry per color attachment
    pub resolve_attachments: Vec<AttachmentReference>,
    pub depth_stencil_attachment: Option<AttachmentReference>,
    /// Attachments not used by the subpass whose content must survive it
    pub preserve_attachments: Vec<u32>,
}

/// Dependency between two subpasses (or `SUBPASS_EXTERNAL`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubpassDependency {
    pub src_subpass: u32,
    pub dst_subpass: u32,
    pub src_stages: PipelineStages,
    pub dst_stages: PipelineStages,
    pub src_access: AccessFlags,
    pub dst_access: AccessFlags,
    /// Dependency is framebuffer-local
    pub by_region: bool,
}
