/// GpuContext - Shared GPU state for all Vulkan objects
///
/// Contains everything needed for GPU operations:
/// - Instance and logical device for Vulkan API calls
/// - Allocator for memory management
/// - Graphics and upload queues, each behind its own submission mutex
/// - The logger every backend object reports to
///
/// Every resource (image, buffer, command list...) holds an `Arc<GpuContext>`,
/// so the device is destroyed only after the last resource is gone.

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::log::Logger;
use galaxy_3d_framegraph::galaxy3d::render::QueueKind;
use gpu_allocator::vulkan::Allocator;
use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex};

use crate::vulkan_debug::DebugMessenger;

/// A device queue and the family it belongs to
///
/// `handle` is shared between `QueueKind`s that map to the same queue so
/// submissions to it are serialized by a single mutex.
#[derive(Clone)]
pub(crate) struct GpuQueue {
    pub handle: Arc<Mutex<vk::Queue>>,
    pub family: u32,
}

/// Shared GPU context for all Vulkan resources.
pub struct GpuContext {
    /// Vulkan entry (keeps the loader alive)
    pub(crate) entry: ash::Entry,

    /// Vulkan instance
    pub(crate) instance: ash::Instance,

    pub(crate) physical_device: vk::PhysicalDevice,

    /// Vulkan logical device
    pub(crate) device: ash::Device,

    /// GPU memory allocator
    /// Wrapped in ManuallyDrop so it is released BEFORE the device is destroyed
    pub(crate) allocator: ManuallyDrop<Mutex<Allocator>>,

    pub(crate) graphics: GpuQueue,

    /// Upload queue; the graphics queue when the device has no second one
    pub(crate) transfer: GpuQueue,

    pub(crate) logger: Arc<dyn Logger>,

    /// Validation messenger (only with the `vulkan-validation` feature)
    pub(crate) debug: Option<DebugMessenger>,
}

impl GpuContext {
    pub(crate) fn queue(&self, kind: QueueKind) -> &GpuQueue {
        match kind {
            QueueKind::Graphics => &self.graphics,
            QueueKind::Transfer => &self.transfer,
        }
    }

    /// Queue families touching shared resources, deduplicated
    ///
    /// Images and buffers use CONCURRENT sharing when this has two entries.
    pub(crate) fn sharing_families(&self) -> Vec<u32> {
        if self.graphics.family == self.transfer.family {
            vec![self.graphics.family]
        } else {
            vec![self.graphics.family, self.transfer.family]
        }
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();

            // 1. Free VkDeviceMemory pages while the device is alive
            ManuallyDrop::drop(&mut self.allocator);

            // 2. Messenger before the instance
            if let Some(debug) = self.debug.take() {
                debug.destroy();
            }

            // 3. Device, then instance
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}
