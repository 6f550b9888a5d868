/// Swapchain trait - presentation surface provider

use std::sync::Arc;
use std::time::Duration;
use glam::UVec2;
use crate::error::Result;
use crate::graphics_device::{Image, Semaphore, TextureFormat};

/// Result of a successful acquire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquiredImage {
    /// Index of the swapchain image to render into
    pub index: u32,
    /// The swapchain still works but no longer matches the surface exactly
    pub suboptimal: bool,
}

/// Swapchain for presenting rendered images to a window
///
/// `acquire_next_image` and `present` return `Error::SwapchainOutOfDate`
/// when the surface changed and `recreate` must be called.
pub trait Swapchain: Send + Sync {
    /// Get the number of images in the swapchain
    fn image_count(&self) -> usize;

    /// Get swapchain image `index` (usable as a framebuffer attachment)
    fn image(&self, index: usize) -> Result<Arc<dyn Image>>;

    /// Size of the swapchain images in pixels
    fn extent(&self) -> UVec2;

    /// Get the pixel format of the swapchain images
    fn format(&self) -> TextureFormat;

    /// Acquire the next available image, signaling `signal` when it is ready
    fn acquire_next_image(&mut self, signal: &dyn Semaphore, timeout: Duration) -> Result<AcquiredImage>;

    /// Present image `index` once `wait` is signaled
    ///
    /// Returns true if the swapchain is suboptimal.
    fn present(&mut self, index: u32, wait: &dyn Semaphore) -> Result<bool>;

    /// Recreate the swapchain (e.g., after window resize)
    ///
    /// # Arguments
    ///
    /// * `width` - New width in pixels
    /// * `height` - New height in pixels
    fn recreate(&mut self, width: u32, height: u32) -> Result<()>;
}
