/// Framebuffer trait - binds images to the attachment slots of a render pass
///
/// Created once and reused each frame. Must be recreated only when
/// attachments change (e.g., window resize).

use std::sync::Arc;
use crate::graphics_device::{Image, RenderPass};

/// Framebuffer
///
/// Created via `GraphicsDevice::create_framebuffer()`.
pub trait Framebuffer: Send + Sync {
    /// Get the width in pixels
    fn width(&self) -> u32;

    /// Get the height in pixels
    fn height(&self) -> u32;
}

/// Descriptor for creating a framebuffer
pub struct FramebufferDesc<'a> {
    /// The render pass this framebuffer is compatible with
    pub render_pass: &'a Arc<dyn RenderPass>,
    /// One image per render pass attachment, in attachment index order
    pub attachments: &'a [Arc<dyn Image>],
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}
