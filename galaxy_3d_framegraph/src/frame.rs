//! Frame executor
//!
//! Drives the per-frame loop: wait for the frame slot's fence, acquire a
//! swapchain image, record the frame graph, submit and present. Up to
//! `Config::max_frames_in_flight` frames are recorded ahead of the GPU.
//!
//! An out-of-date or suboptimal swapchain is recreated together with the
//! frame graph and the frame is reported as `FrameOutcome::Rebuilt`. A fence
//! that does not signal within `Config::fence_timeout` is a lost device;
//! every later call fails with `Error::DeviceLost`.

use std::sync::Arc;
use std::time::Duration;
use glam::UVec2;

use crate::error::{Error, Result};
use crate::graphics_device::{
    CommandList, Config, Fence, GraphicsDevice, PipelineStages, QueueKind, RenderArea,
    Semaphore, Submission, Swapchain,
};
use crate::log::Logger;
use crate::render_graph::FrameGraph;
use crate::{engine_debug, engine_error, engine_info};

const SOURCE: &str = "galaxy3d::frame";

/// What `draw_frame` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Swapchain image `image_index` was submitted and queued for presentation
    Presented { image_index: u32 },
    /// The swapchain and the frame graph were recreated
    Rebuilt,
    /// The surface has a zero extent (minimized window); nothing was drawn
    Skipped,
}

struct FrameSlot {
    in_flight: Arc<dyn Fence>,
    image_available: Arc<dyn Semaphore>,
    command_list: Box<dyn CommandList>,
}

pub struct FrameExecutor {
    device: Arc<dyn GraphicsDevice>,
    slots: Vec<FrameSlot>,
    /// One per swapchain image, signaled when its rendering is done
    render_finished: Vec<Arc<dyn Semaphore>>,
    current: usize,
    fence_timeout: Duration,
    pending_extent: Option<UVec2>,
    device_lost: Option<String>,
    logger: Arc<dyn Logger>,
}

impl FrameExecutor {
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        swapchain: &dyn Swapchain,
        config: &Config,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        let frames = config.max_frames_in_flight.max(1);
        let mut slots = Vec::with_capacity(frames);
        for _ in 0..frames {
            slots.push(FrameSlot {
                in_flight: device.create_fence(true)?,
                image_available: device.create_semaphore()?,
                command_list: device.create_command_list(QueueKind::Graphics)?,
            });
        }
        let render_finished = Self::create_semaphores(device.as_ref(), swapchain.image_count())?;

        engine_info!(
            logger,
            SOURCE,
            "Frame executor ready: {} frame(s) in flight, {} swapchain image(s)",
            frames,
            swapchain.image_count()
        );
        Ok(Self {
            device,
            slots,
            render_finished,
            current: 0,
            fence_timeout: config.fence_timeout,
            pending_extent: None,
            device_lost: None,
            logger,
        })
    }

    fn create_semaphores(device: &dyn GraphicsDevice, count: usize) -> Result<Vec<Arc<dyn Semaphore>>> {
        (0..count).map(|_| device.create_semaphore()).collect()
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Frame slot the next `draw_frame` uses
    pub fn current_frame(&self) -> usize {
        self.current
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost.is_some()
    }

    /// Request a swapchain rebuild at `width` x `height` before the next frame
    pub fn resize(&mut self, width: u32, height: u32) {
        self.pending_extent = Some(UVec2::new(width, height));
    }

    /// Render and present one frame
    pub fn draw_frame(&mut self, swapchain: &mut dyn Swapchain, graph: &mut FrameGraph) -> Result<FrameOutcome> {
        if let Some(reason) = &self.device_lost {
            return Err(Error::DeviceLost(reason.clone()));
        }

        if let Some(extent) = self.pending_extent {
            if extent.x == 0 || extent.y == 0 {
                return Ok(FrameOutcome::Skipped);
            }
            self.rebuild(swapchain, graph, extent)?;
            self.pending_extent = None;
        }

        let result = self.render(swapchain, graph);
        if let Err(Error::DeviceLost(reason)) = &result {
            engine_error!(self.logger, SOURCE, "Device lost, frame loop stopped: {}", reason);
            self.device_lost = Some(reason.clone());
        }
        result
    }

    /// Wait until the GPU finished every submitted frame
    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    fn render(&mut self, swapchain: &mut dyn Swapchain, graph: &mut FrameGraph) -> Result<FrameOutcome> {
        let slot = &self.slots[self.current];
        self.device.wait_for_fence(slot.in_flight.as_ref(), self.fence_timeout)?;

        let acquired = match swapchain.acquire_next_image(slot.image_available.as_ref(), self.fence_timeout) {
            Ok(acquired) => acquired,
            Err(Error::SwapchainOutOfDate) => {
                let extent = swapchain.extent();
                self.rebuild(swapchain, graph, extent)?;
                return Ok(FrameOutcome::Rebuilt);
            }
            Err(err) => return Err(err),
        };
        let image_index = acquired.index;
        let extent = swapchain.extent();

        let render_finished = match self.record_and_submit(graph, image_index, extent) {
            Ok(semaphore) => semaphore,
            Err(err) => {
                if let Err(reset_err) = self.reset_slot() {
                    engine_error!(self.logger, SOURCE, "Frame slot {} not reset: {}", self.current, reset_err);
                }
                return Err(err);
            }
        };

        let present = swapchain.present(image_index, render_finished.as_ref());
        self.current = (self.current + 1) % self.slots.len();

        match present {
            Ok(suboptimal) if suboptimal || acquired.suboptimal => {
                let extent = swapchain.extent();
                self.rebuild(swapchain, graph, extent)?;
                Ok(FrameOutcome::Rebuilt)
            }
            Ok(_) => Ok(FrameOutcome::Presented { image_index }),
            Err(Error::SwapchainOutOfDate) => {
                let extent = swapchain.extent();
                self.rebuild(swapchain, graph, extent)?;
                Ok(FrameOutcome::Rebuilt)
            }
            Err(err) => Err(err),
        }
    }

    /// Record the graph for `image_index` and submit it on the current slot
    ///
    /// Returns the semaphore the presentation waits on.
    fn record_and_submit(
        &mut self,
        graph: &mut FrameGraph,
        image_index: u32,
        extent: UVec2,
    ) -> Result<Arc<dyn Semaphore>> {
        let render_finished = self
            .render_finished
            .get(image_index as usize)
            .cloned()
            .ok_or_else(|| Error::InvalidResource(format!("swapchain image {} out of range", image_index)))?;

        let slot = &mut self.slots[self.current];
        let cmd = slot.command_list.as_mut();
        cmd.begin()?;
        graph.fill_command_buffer(&mut *cmd, image_index, RenderArea::from_extent(extent.x, extent.y))?;
        cmd.end()?;

        self.device.reset_fence(slot.in_flight.as_ref())?;
        let lists = [slot.command_list.as_ref()];
        let wait = [(slot.image_available.as_ref(), PipelineStages::COLOR_ATTACHMENT_OUTPUT)];
        let signal = [render_finished.as_ref()];
        self.device.submit(QueueKind::Graphics, &Submission {
            command_lists: &lists,
            wait: &wait,
            signal: &signal,
            fence: Some(slot.in_flight.as_ref()),
        })?;
        Ok(render_finished)
    }

    /// Give the current slot a signaled fence and an unsignaled acquire
    /// semaphore after a frame failed between acquire and submit
    fn reset_slot(&mut self) -> Result<()> {
        let in_flight = self.device.create_fence(true)?;
        let image_available = self.device.create_semaphore()?;
        let slot = &mut self.slots[self.current];
        slot.in_flight = in_flight;
        slot.image_available = image_available;
        Ok(())
    }

    fn rebuild(&mut self, swapchain: &mut dyn Swapchain, graph: &mut FrameGraph, extent: UVec2) -> Result<()> {
        engine_debug!(self.logger, SOURCE, "Recreating swapchain at {}x{}", extent.x, extent.y);
        self.device.wait_idle()?;
        swapchain.recreate(extent.x, extent.y)?;
        graph.rebuild(swapchain)?;
        if self.render_finished.len() != swapchain.image_count() {
            self.render_finished = Self::create_semaphores(self.device.as_ref(), swapchain.image_count())?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
