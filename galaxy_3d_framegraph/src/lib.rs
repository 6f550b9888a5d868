/*!
# Galaxy 3D Frame Graph

Render-graph core of the Galaxy 3D engine.

A frame is described as named attachments and render passes made of
subpasses. The description is compiled into native render pass
descriptions (load/store operations, layouts, dependencies, clear values),
instantiated against a `GraphicsDevice`, and recorded every frame by the
`FrameExecutor`. Textures are streamed to the GPU on a background worker
by the `TextureManager`, and descriptor sets come from growable pools.

## Architecture

- **GraphicsDevice**: Factory trait for GPU objects (images, buffers, render passes, sync)
- **FrameGraphBuilder**: Declarative attachments, passes and subpasses
- **FrameGraph**: Instantiated graph: native passes, framebuffers, backing images
- **TextureManager**: Asynchronous texture uploads and mip generation
- **DescriptorManager**: Deduplicated layouts, one growable pool per layout
- **DescriptorStack**: Parent-chained set layouts that build pipeline layouts
- **FrameExecutor**: Acquire, record, submit and present with frames in flight

Backend implementations (see `galaxy_3d_framegraph_vulkan`) provide the
concrete device, swapchain and command list types.
*/

// Internal modules
mod error;
pub mod log;
pub mod graphics_device;
pub mod registry;
pub mod descriptor;
pub mod render_graph;
pub mod upload;
pub mod frame;

// Main galaxy3d namespace module
pub mod galaxy3d {
    // Error types
    pub use crate::error::{Error, Result};

    // Top-level entry points
    pub use crate::frame::{FrameExecutor, FrameOutcome};
    pub use crate::render_graph::{FrameGraph, FrameGraphBuilder};
    pub use crate::upload::TextureManager;
    pub use crate::descriptor::DescriptorManager;
    pub use crate::graphics_device::{Config, GraphicsDevice};

    // Logging sub-module (types only, NOT macros)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, NullLogger, MemoryLogger};
    }

    // Device abstraction: traits, descriptors and enums
    pub mod render {
        pub use crate::graphics_device::*;
    }

    // Frame graph description and instantiation
    pub mod graph {
        pub use crate::render_graph::*;
        pub use crate::registry::{ImageInfo, ImageKey, RegisteredImage, ResourceRegistry};
    }

    // Texture uploads
    pub mod upload {
        pub use crate::upload::*;
    }

    // Descriptor layouts and pools
    pub mod descriptor {
        pub use crate::descriptor::*;
    }
}

// Re-export math library at crate root
pub use glam;
