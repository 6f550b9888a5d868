/// Texture kinds, sources, creation details and resources

use std::fmt;
use std::sync::Arc;
use crate::error::{Error, Result};
use crate::graphics_device::{
    AddressMode, DescriptorResource, DescriptorType, DescriptorWrite, Image, ImageLayout,
    ImageUsage, ImageViewKind, Sampler, TextureFormat,
};

/// Handle to a texture owned by a `TextureManager`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub(crate) u32);

impl TextureId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "texture#{}", self.0)
    }
}

/// Shape of a texture
///
/// The upload algorithm is identical for every kind; only the layer count
/// and the view type differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureKind {
    Texture2D,
    Array { layers: u32 },
    Cubemap,
}

impl TextureKind {
    pub fn layer_count(&self) -> u32 {
        match self {
            TextureKind::Texture2D => 1,
            TextureKind::Array { layers } => *layers,
            TextureKind::Cubemap => 6,
        }
    }

    pub fn view_kind(&self) -> ImageViewKind {
        match self {
            TextureKind::Texture2D => ImageViewKind::D2,
            TextureKind::Array { .. } => ImageViewKind::D2Array,
            TextureKind::Cubemap => ImageViewKind::Cube,
        }
    }

    pub fn is_cube_compatible(&self) -> bool {
        matches!(self, TextureKind::Cubemap)
    }
}

/// Decoded pixel data, layers stored one after the other
#[derive(Debug, Clone, PartialEq)]
pub struct TextureSource {
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub pixels: Vec<u8>,
}

impl TextureSource {
    pub fn new(width: u32, height: u32, layers: u32, pixels: Vec<u8>) -> Self {
        Self { width, height, layers, pixels }
    }

    /// Single layer from RGBA8 texels
    pub fn from_rgba8(width: u32, height: u32, texels: &[[u8; 4]]) -> Self {
        Self::new(width, height, 1, bytemuck::cast_slice(texels).to_vec())
    }

    /// Size in bytes of one layer at `format`
    pub fn layer_size(&self, format: TextureFormat) -> u64 {
        self.width as u64 * self.height as u64 * format.bytes_per_pixel() as u64
    }

    pub(crate) fn validate(&self, format: TextureFormat) -> Result<()> {
        if self.width == 0 || self.height == 0 || self.layers == 0 {
            return Err(Error::InvalidResource(format!(
                "texture source has an empty extent {}x{}x{}",
                self.width, self.height, self.layers
            )));
        }
        let expected = self.layer_size(format) * self.layers as u64;
        if (self.pixels.len() as u64) < expected {
            return Err(Error::InvalidResource(format!(
                "texture source holds {} bytes, {} needed",
                self.pixels.len(),
                expected
            )));
        }
        Ok(())
    }
}

/// How a texture is created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureCreateDetails {
    pub format: TextureFormat,
    /// Layout the image is left in once ready
    pub final_layout: ImageLayout,
    pub address_mode: AddressMode,
    pub generate_mips: bool,
    /// Levels to generate; 0 or 1 with `generate_mips` means the full chain
    pub mip_levels: u32,
}

impl Default for TextureCreateDetails {
    fn default() -> Self {
        Self {
            format: TextureFormat::R8G8B8A8_UNORM,
            final_layout: ImageLayout::ShaderReadOnly,
            address_mode: AddressMode::Repeat,
            generate_mips: false,
            mip_levels: 1,
        }
    }
}

/// How a frame graph attachment image is created
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttachmentImageDetails {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub samples: u32,
    pub usage: ImageUsage,
    /// Layout the image is transitioned to before first use
    pub layout: ImageLayout,
}

/// Lifecycle of an uploaded texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    Requested,
    StagingUploaded,
    MipGenerating,
    Ready,
}

/// Shader-bindable texture: image, sampler and the layout it is in
#[derive(Clone)]
pub struct TextureResource {
    pub image: Arc<dyn Image>,
    pub sampler: Arc<dyn Sampler>,
    pub layout: ImageLayout,
}

impl TextureResource {
    /// Combined image-sampler write for `binding`
    pub fn descriptor_write(&self, binding: u32) -> DescriptorWrite {
        DescriptorWrite {
            binding,
            array_element: 0,
            ty: DescriptorType::CombinedImageSampler,
            resource: DescriptorResource::Image {
                image: self.image.clone(),
                sampler: Some(self.sampler.clone()),
                layout: self.layout,
            },
        }
    }
}
