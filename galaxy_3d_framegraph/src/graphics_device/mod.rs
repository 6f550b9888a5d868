/// Graphics device module - API-agnostic GPU object traits and descriptors

// Module declarations
pub mod types;
pub mod config;
pub mod graphics_device;
pub mod image;
pub mod buffer;
pub mod sampler;
pub mod render_pass;
pub mod frame_buffer;
pub mod command_list;
pub mod sync;
pub mod swapchain;
pub mod descriptor;

// Re-export everything
pub use types::*;
pub use config::*;
pub use graphics_device::*;
pub use image::*;
pub use buffer::*;
pub use sampler::*;
pub use render_pass::*;
pub use frame_buffer::*;
pub use command_list::*;
pub use sync::*;
pub use swapchain::*;
pub use descriptor::*;

// Mock graphics device for tests (no GPU required)
#[cfg(test)]
pub mod mock_graphics_device;
