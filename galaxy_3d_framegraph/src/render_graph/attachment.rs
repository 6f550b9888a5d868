/// Declarative graph description: attachments, subpasses and render passes

use crate::error::Result;
use crate::graphics_device::{ClearValue, CommandList, TextureFormat};
use crate::registry::ImageInfo;

/// Draw callback recorded into one subpass
pub type SubpassCallback = Box<dyn FnMut(&mut dyn CommandList) -> Result<()> + Send>;

/// Named logical image read or written by render passes
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub format: TextureFormat,
    /// 0 = match the presentation surface
    pub width: u32,
    /// 0 = match the presentation surface
    pub height: u32,
    pub samples: u32,
}

impl Attachment {
    /// Surface-sized, single-sampled attachment
    pub fn new(name: &str, format: TextureFormat) -> Self {
        Self {
            name: name.to_string(),
            format,
            width: 0,
            height: 0,
            samples: 1,
        }
    }

    /// Fixed size instead of following the surface
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    pub(crate) fn image_info(&self) -> ImageInfo {
        ImageInfo {
            name: self.name.clone(),
            format: self.format,
            width: self.width,
            height: self.height,
            samples: self.samples,
        }
    }
}

/// How a subpass accesses its depth-stencil attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthStencilAccess {
    /// Depth and stencil written; previous contents are not loaded
    Write,
    /// Depth and stencil only read
    ReadOnly,
    /// Depth read, stencil written
    DepthReadOnly,
    /// Stencil read, depth written
    StencilReadOnly,
}

impl DepthStencilAccess {
    /// Previous contents are needed
    pub fn reads(&self) -> bool {
        !matches!(self, DepthStencilAccess::Write)
    }

    /// Contents are produced
    pub fn writes(&self) -> bool {
        !matches!(self, DepthStencilAccess::ReadOnly)
    }
}

/// One rendering step inside a render pass
pub struct SubpassDescription {
    pub name: String,
    pub input_attachments: Vec<String>,
    pub color_attachments: Vec<String>,
    pub resolve_attachments: Vec<String>,
    pub preserve_attachments: Vec<String>,
    pub depth_stencil: Option<(String, DepthStencilAccess)>,
    /// Names of earlier subpasses of the same pass this one depends on
    pub dependencies: Vec<String>,
    pub clear_values: Vec<(String, ClearValue)>,
    pub(crate) draw: Option<SubpassCallback>,
}

impl SubpassDescription {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            input_attachments: Vec::new(),
            color_attachments: Vec::new(),
            resolve_attachments: Vec::new(),
            preserve_attachments: Vec::new(),
            depth_stencil: None,
            dependencies: Vec::new(),
            clear_values: Vec::new(),
            draw: None,
        }
    }

    pub fn input(mut self, attachment: &str) -> Self {
        self.input_attachments.push(attachment.to_string());
        self
    }

    pub fn color(mut self, attachment: &str) -> Self {
        self.color_attachments.push(attachment.to_string());
        self
    }

    pub fn resolve(mut self, attachment: &str) -> Self {
        self.resolve_attachments.push(attachment.to_string());
        self
    }

    pub fn preserve(mut self, attachment: &str) -> Self {
        self.preserve_attachments.push(attachment.to_string());
        self
    }

    pub fn depth_stencil(mut self, attachment: &str, access: DepthStencilAccess) -> Self {
        self.depth_stencil = Some((attachment.to_string(), access));
        self
    }

    pub fn depends_on(mut self, subpass: &str) -> Self {
        self.dependencies.push(subpass.to_string());
        self
    }

    pub fn clear(mut self, attachment: &str, value: ClearValue) -> Self {
        self.clear_values.push((attachment.to_string(), value));
        self
    }

    /// Set the draw callback
    pub fn draw<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut dyn CommandList) -> Result<()> + Send + 'static,
    {
        self.draw = Some(Box::new(callback));
        self
    }

    /// Every attachment name referenced, in scan order:
    /// inputs, colors, resolves, preserves, depth-stencil
    pub fn referenced_attachments(&self) -> impl Iterator<Item = &str> {
        self.input_attachments
            .iter()
            .chain(&self.color_attachments)
            .chain(&self.resolve_attachments)
            .chain(&self.preserve_attachments)
            .map(|s| s.as_str())
            .chain(self.depth_stencil.as_ref().map(|(name, _)| name.as_str()))
    }
}

/// Named, ordered sequence of subpasses
pub struct RenderPassDescription {
    pub name: String,
    pub subpasses: Vec<SubpassDescription>,
    /// Pass-level clear overrides; win over subpass-level ones
    pub clear_values: Vec<(String, ClearValue)>,
}

impl RenderPassDescription {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subpasses: Vec::new(),
            clear_values: Vec::new(),
        }
    }

    pub fn subpass(mut self, subpass: SubpassDescription) -> Self {
        self.subpasses.push(subpass);
        self
    }

    pub fn clear(mut self, attachment: &str, value: ClearValue) -> Self {
        self.clear_values.push((attachment.to_string(), value));
        self
    }
}
