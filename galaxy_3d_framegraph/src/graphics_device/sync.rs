/// Fences, semaphores and queue submissions

use crate::graphics_device::{CommandList, PipelineStages};

/// CPU-visible completion signal
pub trait Fence: Send + Sync {}

/// GPU-to-GPU ordering primitive between submissions
pub trait Semaphore: Send + Sync {}

/// One batch of command lists submitted to a queue
///
/// `wait` pairs a semaphore with the stages that must not start before it
/// is signaled. `fence` is signaled once every command list has completed.
#[derive(Clone, Copy, Default)]
pub struct Submission<'a> {
    pub command_lists: &'a [&'a dyn CommandList],
    pub wait: &'a [(&'a dyn Semaphore, PipelineStages)],
    pub signal: &'a [&'a dyn Semaphore],
    pub fence: Option<&'a dyn Fence>,
}
