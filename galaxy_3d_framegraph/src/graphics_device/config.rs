/// Device and frame configuration

use std::time::Duration;

/// Configuration shared by the device backend and the frame executor
#[derive(Debug, Clone)]
pub struct Config {
    /// Enable the validation layers (only effective when the backend is
    /// compiled with validation support)
    pub enable_validation: bool,

    /// Application name reported to the driver
    pub app_name: String,

    /// Application version (major, minor, patch)
    pub app_version: (u32, u32, u32),

    /// Number of frames the CPU may record ahead of the GPU
    pub max_frames_in_flight: usize,

    /// Upper bound for every fence wait; reaching it is a device loss
    pub fence_timeout: Duration,

    /// Submit uploads on a second queue when the device has one
    pub use_dedicated_transfer_queue: bool,

    /// Number of sets per descriptor pool block
    pub descriptor_pool_max_sets: u32,

    /// Anisotropy used by texture samplers (`None` disables it)
    pub max_anisotropy: Option<f32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_validation: cfg!(debug_assertions),
            app_name: "Galaxy3D Application".to_string(),
            app_version: (1, 0, 0),
            max_frames_in_flight: 2,
            fence_timeout: Duration::from_secs(5),
            use_dedicated_transfer_queue: true,
            descriptor_pool_max_sets: 64,
            max_anisotropy: Some(16.0),
        }
    }
}
