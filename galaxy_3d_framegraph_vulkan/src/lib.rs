/*!
# Galaxy 3D Frame Graph - Vulkan Backend

Vulkan implementation of the `GraphicsDevice` and `Swapchain` traits of
galaxy_3d_framegraph, built on Ash for the Vulkan bindings and
gpu-allocator for memory management.

```no_run
use std::sync::Arc;
use galaxy_3d_framegraph::galaxy3d::{Config, GraphicsDevice};
use galaxy_3d_framegraph::galaxy3d::log::DefaultLogger;
use galaxy_3d_framegraph_vulkan::galaxy3d::VulkanGraphicsDevice;
# fn run(window: &winit::window::Window) -> galaxy_3d_framegraph::galaxy3d::Result<()> {
let config = Config::default();
let device = Arc::new(VulkanGraphicsDevice::new(window, &config, Arc::new(DefaultLogger::new()))?);
let swapchain = device.create_swapchain(window, 1280, 720)?;
# Ok(())
# }
```
*/

mod vulkan;
mod vulkan_buffer;
mod vulkan_command_list;
mod vulkan_context;
mod vulkan_convert;
mod vulkan_debug;
mod vulkan_descriptor;
mod vulkan_frame_buffer;
mod vulkan_image;
mod vulkan_render_pass;
mod vulkan_sampler;
mod vulkan_swapchain;
mod vulkan_sync;

pub mod galaxy3d {
    //! Public API of the Vulkan backend

    pub use crate::vulkan::VulkanGraphicsDevice;
    pub use crate::vulkan_swapchain::Swapchain as VulkanSwapchain;
}
