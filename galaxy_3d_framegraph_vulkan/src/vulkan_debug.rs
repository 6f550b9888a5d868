/// Vulkan Debug Messenger - Forwards validation layer messages to the engine logger
///
/// The messenger is only created when the crate is built with the
/// `vulkan-validation` feature and `Config::enable_validation` is set.
/// Messages keep their severity and are logged under `galaxy3d::vulkan`.

use ash::vk;
use galaxy_3d_framegraph::galaxy3d::log::Logger;
#[cfg(feature = "vulkan-validation")]
use galaxy_3d_framegraph::galaxy3d::log::LogSeverity;
#[cfg(feature = "vulkan-validation")]
use std::ffi::CStr;
use std::sync::Arc;

/// Layer enabled alongside the messenger
#[cfg(feature = "vulkan-validation")]
pub(crate) const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Debug utils messenger and the logger its callback writes to
#[cfg_attr(not(feature = "vulkan-validation"), allow(dead_code))]
pub(crate) struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
    /// Target of the callback's user-data pointer; must outlive `messenger`
    _logger: Box<Arc<dyn Logger>>,
}

impl DebugMessenger {
    /// Install a messenger reporting warnings and errors (plus info/verbose
    /// in debug builds)
    #[cfg(feature = "vulkan-validation")]
    pub(crate) fn new(
        entry: &ash::Entry,
        instance: &ash::Instance,
        logger: Arc<dyn Logger>,
    ) -> std::result::Result<Self, vk::Result> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let logger = Box::new(logger);

        let mut severity = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
        if cfg!(debug_assertions) {
            severity |= vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
        }

        let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(severity)
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback))
            .user_data(logger.as_ref() as *const Arc<dyn Logger> as *mut std::os::raw::c_void);

        let messenger = unsafe { loader.create_debug_utils_messenger(&info, None)? };
        Ok(Self { loader, messenger, _logger: logger })
    }

    /// Destroy the messenger; the instance must still be alive
    pub(crate) unsafe fn destroy(self) {
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

/// Vulkan debug messenger callback
///
/// `user_data` points to the `Arc<dyn Logger>` boxed in `DebugMessenger`.
#[cfg(feature = "vulkan-validation")]
unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || user_data.is_null() {
        return vk::FALSE;
    }
    let (logger, callback_data) = unsafe {
        (&*(user_data as *const Arc<dyn Logger>), &*p_callback_data)
    };

    let message_id_name = if callback_data.p_message_id_name.is_null() {
        "Unknown".into()
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message_id_name) }.to_string_lossy()
    };
    let message = if callback_data.p_message.is_null() {
        "No message".into()
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message) }.to_string_lossy()
    };

    let severity = if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Debug
    } else {
        LogSeverity::Trace
    };

    let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    logger.emit(
        severity,
        "galaxy3d::vulkan",
        format!("[{}] {}: {}", type_str, message_id_name, message),
        None,
    );

    vk::FALSE
}
