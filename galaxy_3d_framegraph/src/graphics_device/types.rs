/// Plain-data enums and flags shared by every device object

use bitflags::bitflags;
use glam::{IVec2, UVec2};

/// Image layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Undefined layout (contents may be discarded)
    Undefined,
    /// General layout (any access, slow)
    General,
    /// Layout for color attachment writes
    ColorAttachment,
    /// Layout for depth/stencil attachment writes
    DepthStencilAttachment,
    /// Layout for depth/stencil attachment reads
    DepthStencilReadOnly,
    /// Layout for shader read-only access (sampling, input attachments)
    ShaderReadOnly,
    /// Layout for transfer source
    TransferSrc,
    /// Layout for transfer destination
    TransferDst,
    /// Layout for presenting to swapchain
    PresentSrc,
}

/// Load operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOp {
    /// Load existing content
    Load,
    /// Clear the content
    Clear,
    /// Don't care about existing content
    DontCare,
}

/// Store operation for an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    /// Store the rendered content
    Store,
    /// Don't care about storing the content
    DontCare,
}

/// Clear value for an attachment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// RGBA color
    Color([f32; 4]),
    /// Depth and stencil
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Opaque black
    pub const BLACK: ClearValue = ClearValue::Color([0.0, 0.0, 0.0, 1.0]);
    /// Far plane, zero stencil
    pub const FAR_DEPTH: ClearValue = ClearValue::DepthStencil { depth: 1.0, stencil: 0 };
}

/// GPU queue a command list is recorded for and submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    Graphics,
    /// Dedicated transfer queue, or the graphics queue when the device has none
    Transfer,
}

/// Texel filter used by samplers and blits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Sampler addressing outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
}

/// Shape of the default view created with an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageViewKind {
    D2,
    D2Array,
    Cube,
}

bitflags! {
    /// How an image will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const SAMPLED = 1 << 2;
        const STORAGE = 1 << 3;
        const COLOR_ATTACHMENT = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 5;
        const INPUT_ATTACHMENT = 1 << 6;
    }
}

bitflags! {
    /// How a buffer will be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const TRANSFER_SRC = 1 << 0;
        const TRANSFER_DST = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const VERTEX = 1 << 4;
        const INDEX = 1 << 5;
    }
}

bitflags! {
    /// Pipeline stages used for barriers, dependencies and semaphore waits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_SHADER = 1 << 1;
        const FRAGMENT_SHADER = 1 << 2;
        const EARLY_FRAGMENT_TESTS = 1 << 3;
        const LATE_FRAGMENT_TESTS = 1 << 4;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        const TRANSFER = 1 << 6;
        const BOTTOM_OF_PIPE = 1 << 7;
        const ALL_COMMANDS = 1 << 8;
    }
}

bitflags! {
    /// Memory access kinds used for barriers and dependencies
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const INPUT_ATTACHMENT_READ = 1 << 0;
        const SHADER_READ = 1 << 1;
        const SHADER_WRITE = 1 << 2;
        const COLOR_ATTACHMENT_READ = 1 << 3;
        const COLOR_ATTACHMENT_WRITE = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 5;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 6;
        const TRANSFER_READ = 1 << 7;
        const TRANSFER_WRITE = 1 << 8;
        const MEMORY_READ = 1 << 9;
        const MEMORY_WRITE = 1 << 10;
    }
}

/// Region of a framebuffer a render pass draws into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderArea {
    pub offset: IVec2,
    pub extent: UVec2,
}

impl RenderArea {
    /// Area starting at the origin covering `width` x `height`
    pub fn from_extent(width: u32, height: u32) -> Self {
        Self { offset: IVec2::ZERO, extent: UVec2::new(width, height) }
    }
}

/// Viewport dimensions and depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-depth viewport covering `area`
    pub fn from_area(area: RenderArea) -> Self {
        Self {
            x: area.offset.x as f32,
            y: area.offset.y as f32,
            width: area.extent.x as f32,
            height: area.extent.y as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}
