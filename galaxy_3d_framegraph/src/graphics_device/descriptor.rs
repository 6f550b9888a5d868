/// Raw descriptor layouts, pools and sets exposed by the device

use std::sync::Arc;
use bitflags::bitflags;
use crate::error::{Error, Result};
use crate::graphics_device::{Buffer, Image, ImageLayout, Sampler};

/// Kind of resource bound at a descriptor slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorType {
    Sampler,
    CombinedImageSampler,
    SampledImage,
    StorageImage,
    UniformBuffer,
    StorageBuffer,
    UniformBufferDynamic,
    StorageBufferDynamic,
    InputAttachment,
}

impl DescriptorType {
    /// True for the image-backed descriptor kinds
    pub fn is_image(&self) -> bool {
        matches!(
            self,
            DescriptorType::Sampler
                | DescriptorType::CombinedImageSampler
                | DescriptorType::SampledImage
                | DescriptorType::StorageImage
                | DescriptorType::InputAttachment
        )
    }
}

bitflags! {
    /// Shader stages a binding is visible to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const ALL_GRAPHICS = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// One binding slot of a descriptor layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutBinding {
    pub binding: u32,
    pub ty: DescriptorType,
    /// Array size of the binding
    pub count: u32,
    pub stages: ShaderStages,
}

/// Number of descriptors of one type a pool can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorPoolSize {
    pub ty: DescriptorType,
    pub count: u32,
}

/// Native descriptor set layout
pub trait RawDescriptorLayout: Send + Sync {
    fn bindings(&self) -> &[LayoutBinding];
}

/// Native descriptor pool allowing individual sets to be freed
pub trait RawDescriptorPool: Send + Sync {
    /// Maximum number of sets the pool can hold
    fn max_sets(&self) -> u32;
}

/// Native descriptor set
pub trait RawDescriptorSet: Send + Sync {}

/// Ordered descriptor set layouts a draw binds its sets against
///
/// Set `i` of a bind must be compatible with layout `i`.
pub trait PipelineLayout: Send + Sync {
    /// Number of set layouts
    fn set_count(&self) -> u32;
}

/// Check that `count` sets bound from `first_set` exist in `layout`
pub fn check_set_range(layout: &dyn PipelineLayout, first_set: u32, count: usize) -> Result<()> {
    let end = first_set as u64 + count as u64;
    if end > layout.set_count() as u64 {
        return Err(Error::InvalidResource(format!(
            "binding sets {}..{} but the pipeline layout has {} set(s)",
            first_set,
            end,
            layout.set_count()
        )));
    }
    Ok(())
}

/// Outcome of a native set allocation
pub enum DescriptorAllocation {
    Allocated(Arc<dyn RawDescriptorSet>),
    /// The pool has no room left (out of sets or fragmented)
    PoolExhausted,
}

/// Resource written into a descriptor slot
#[derive(Clone)]
pub enum DescriptorResource {
    Buffer {
        buffer: Arc<dyn Buffer>,
        offset: u64,
        range: u64,
    },
    Image {
        image: Arc<dyn Image>,
        sampler: Option<Arc<dyn Sampler>>,
        layout: ImageLayout,
    },
}

/// Write of one resource to `binding[array_element]`
#[derive(Clone)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub array_element: u32,
    pub ty: DescriptorType,
    pub resource: DescriptorResource,
}
