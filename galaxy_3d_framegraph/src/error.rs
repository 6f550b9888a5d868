//! Error types for the Galaxy3D frame graph
//!
//! This module defines the error types used throughout the crate,
//! including graph compilation, device initialization, and resource management.

use std::fmt;

/// Result type for Galaxy3D frame graph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Galaxy3D frame graph errors
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Out of host (CPU) memory reported by the driver
    OutOfHostMemory,

    /// Invalid resource (texture, buffer, descriptor set, etc.)
    InvalidResource(String),

    /// Initialization failed (device, render pass, swapchain)
    InitializationFailed(String),

    /// Graph description rejected before any GPU object was created
    GraphCompilation(String),

    /// Device lost or a fence wait timed out
    DeviceLost(String),

    /// Swapchain no longer matches the surface and must be recreated
    SwapchainOutOfDate,
}

impl Error {
    /// Returns true if the error must stop the frame loop.
    ///
    /// `SwapchainOutOfDate` is the only condition the frame executor
    /// recovers from (by rebuilding).
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::SwapchainOutOfDate)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::OutOfHostMemory => write!(f, "Out of host memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::GraphCompilation(msg) => write!(f, "Graph compilation failed: {}", msg),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
            Error::SwapchainOutOfDate => write!(f, "Swapchain out of date"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
