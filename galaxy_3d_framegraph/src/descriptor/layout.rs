/// Descriptor layout wrapper

use std::sync::Arc;
use crate::error::Result;
use crate::graphics_device::{
    DescriptorPoolSize, GraphicsDevice, LayoutBinding, RawDescriptorLayout,
};

/// Descriptor set layout with its binding list
pub struct DescriptorLayout {
    raw: Arc<dyn RawDescriptorLayout>,
    bindings: Vec<LayoutBinding>,
}

impl DescriptorLayout {
    pub fn new(device: &dyn GraphicsDevice, bindings: &[LayoutBinding]) -> Result<Self> {
        let raw = device.create_descriptor_layout(bindings)?;
        Ok(Self { raw, bindings: bindings.to_vec() })
    }

    pub fn raw(&self) -> &Arc<dyn RawDescriptorLayout> {
        &self.raw
    }

    pub fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }

    /// Pool sizes needed to hold `max_sets` sets of this layout
    ///
    /// One entry per descriptor type, in first-seen binding order, each
    /// counting every array element of that type times `max_sets`.
    pub fn pool_sizes(&self, max_sets: u32) -> Vec<DescriptorPoolSize> {
        let mut sizes: Vec<DescriptorPoolSize> = Vec::new();
        for binding in &self.bindings {
            match sizes.iter_mut().find(|s| s.ty == binding.ty) {
                Some(size) => size.count += binding.count,
                None => sizes.push(DescriptorPoolSize { ty: binding.ty, count: binding.count }),
            }
        }
        for size in &mut sizes {
            size.count *= max_sets;
        }
        sizes
    }
}
