/// Descriptor layout stack
///
/// Shaders usually share their first sets (frame, view) and differ in the
/// last ones (material, object). A `DescriptorStack` describes that as a
/// chain: each level adds one layout on top of its parent, and the chain
/// read from the root gives the set layouts of a pipeline layout.

use std::sync::Arc;

use crate::descriptor::DescriptorLayout;
use crate::error::Result;
use crate::graphics_device::{GraphicsDevice, PipelineLayout, RawDescriptorLayout};

pub struct DescriptorStack {
    layout: Arc<DescriptorLayout>,
    parent: Option<Arc<DescriptorStack>>,
}

impl DescriptorStack {
    /// Stack with a single layout bound at set 0
    pub fn new(layout: Arc<DescriptorLayout>) -> Self {
        Self { layout, parent: None }
    }

    /// `layout` on top of `parent`, bound at set `parent.depth()`
    pub fn with_parent(layout: Arc<DescriptorLayout>, parent: Arc<DescriptorStack>) -> Self {
        Self { layout, parent: Some(parent) }
    }

    pub fn layout(&self) -> &Arc<DescriptorLayout> {
        &self.layout
    }

    pub fn parent(&self) -> Option<&Arc<DescriptorStack>> {
        self.parent.as_ref()
    }

    /// Number of layouts in the chain
    pub fn depth(&self) -> u32 {
        let mut depth = 1;
        let mut level = self.parent.as_deref();
        while let Some(stack) = level {
            depth += 1;
            level = stack.parent.as_deref();
        }
        depth
    }

    /// Set slot of this level's layout
    pub fn set_index(&self) -> u32 {
        self.depth() - 1
    }

    /// Layouts from the root down to this level
    pub fn layouts(&self) -> Vec<Arc<DescriptorLayout>> {
        let mut layouts = match &self.parent {
            Some(parent) => parent.layouts(),
            None => Vec::new(),
        };
        layouts.push(self.layout.clone());
        layouts
    }

    /// Pipeline layout whose set `i` is the `i`-th layout of the chain
    pub fn create_pipeline_layout(&self, device: &dyn GraphicsDevice) -> Result<Arc<dyn PipelineLayout>> {
        let layouts = self.layouts();
        let raw: Vec<&dyn RawDescriptorLayout> = layouts.iter().map(|l| l.raw().as_ref()).collect();
        device.create_pipeline_layout(&raw)
    }
}

#[cfg(test)]
#[path = "stack_tests.rs"]
mod tests;
