//! Asynchronous texture upload pipeline
//!
//! Stages pixel data into device memory, copies it into GPU-resident images
//! and generates mip chains on a worker thread, without blocking the caller
//! beyond enqueue time.

mod texture;
mod mip_chain;
mod task_queue;
mod texture_manager;

pub use texture::*;
pub use mip_chain::{max_mip_levels, mip_blits, record_copy, record_final_transition, record_mip_chain};
pub use task_queue::{AsyncTask, AsyncTaskQueue, CompletionFn, RecordFn, TaskStage};
pub use texture_manager::TextureManager;

/// Log source of the upload subsystem
pub(crate) const SOURCE: &str = "galaxy3d::upload";
