/// Texture manager
///
/// Owns every texture and drives it through
/// `Requested -> StagingUploaded -> MipGenerating -> Ready`. Textures being
/// uploaded live in the in-progress set and move to the ready set when the
/// GPU signals completion. Deleting a texture still in flight marks it
/// expired; the completion then discards it instead of publishing it.
///
/// On devices with a dedicated upload queue the copy and the mip chain are
/// recorded into a single task on that queue. Otherwise the copy runs on the
/// transfer queue and the mip chain on the graphics queue, ordered by a
/// semaphore.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::graphics_device::{
    AccessFlags, AddressMode, Buffer, BufferDesc, BufferUsage, Config, Filter, GraphicsDevice,
    Image, ImageBarrier, ImageDesc, ImageLayout, ImageUsage, ImageViewKind, PipelineStages,
    QueueKind, SamplerDesc, Submission,
};
use crate::log::Logger;
use crate::upload::{
    max_mip_levels, record_copy, record_final_transition, record_mip_chain, AsyncTask,
    AsyncTaskQueue, AttachmentImageDetails, TaskStage, TextureCreateDetails, TextureId,
    TextureKind, TextureResource, TextureSource, TextureState, SOURCE,
};
use crate::{engine_debug, engine_error, engine_warn};

/// Where the pixels of an upload come from
enum Staging<'a> {
    Pixels(&'a [u8]),
    Filled(Arc<dyn Buffer>),
}

struct TextureEntry {
    resource: TextureResource,
    state: TextureState,
}

#[derive(Default)]
struct TextureMaps {
    in_progress: FxHashMap<TextureId, TextureEntry>,
    ready: FxHashMap<TextureId, TextureEntry>,
    expired: FxHashSet<TextureId>,
}

impl TextureMaps {
    fn set_state(&mut self, id: TextureId, state: TextureState) {
        if let Some(entry) = self.in_progress.get_mut(&id) {
            entry.state = state;
        }
    }
}

fn lock_maps(maps: &Mutex<TextureMaps>) -> Result<MutexGuard<'_, TextureMaps>> {
    maps.lock()
        .map_err(|_| Error::BackendError("texture manager mutex poisoned".to_string()))
}

pub struct TextureManager {
    device: Arc<dyn GraphicsDevice>,
    queue: AsyncTaskQueue,
    maps: Arc<Mutex<TextureMaps>>,
    next_id: AtomicU32,
    dedicated_queue: bool,
    fence_timeout: Duration,
    max_anisotropy: Option<f32>,
    logger: Arc<dyn Logger>,
}

impl TextureManager {
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &Config, logger: Arc<dyn Logger>) -> Result<Self> {
        let queue = AsyncTaskQueue::new(device.clone(), config.fence_timeout, logger.clone())?;
        let dedicated_queue = config.use_dedicated_transfer_queue && device.has_dedicated_transfer_queue();
        engine_debug!(
            logger,
            SOURCE,
            "Texture manager created ({} upload topology)",
            if dedicated_queue { "single-stage" } else { "two-stage" }
        );
        Ok(Self {
            device,
            queue,
            maps: Arc::new(Mutex::new(TextureMaps::default())),
            next_id: AtomicU32::new(0),
            dedicated_queue,
            fence_timeout: config.fence_timeout,
            max_anisotropy: config.max_anisotropy,
            logger,
        })
    }

    // ===== CREATION =====

    pub fn create_texture_2d(&self, source: &TextureSource, details: &TextureCreateDetails) -> Result<TextureId> {
        self.create_texture(TextureKind::Texture2D, source, details)
    }

    pub fn create_texture_2d_array(&self, source: &TextureSource, details: &TextureCreateDetails) -> Result<TextureId> {
        self.create_texture(TextureKind::Array { layers: source.layers }, source, details)
    }

    /// Six square faces in +X, -X, +Y, -Y, +Z, -Z order
    pub fn create_cubemap(&self, source: &TextureSource, details: &TextureCreateDetails) -> Result<TextureId> {
        self.create_texture(TextureKind::Cubemap, source, details)
    }

    /// Upload pixel data into a new texture
    ///
    /// Returns as soon as the staging buffer is filled and the task is
    /// queued. Poll `is_finished_transfer` before using the texture.
    pub fn create_texture(
        &self,
        kind: TextureKind,
        source: &TextureSource,
        details: &TextureCreateDetails,
    ) -> Result<TextureId> {
        Self::validate(kind, source.width, source.height, source.layers)?;
        source.validate(details.format)?;
        self.upload(kind, source.width, source.height, details, Staging::Pixels(&source.pixels))
    }

    /// Upload from a staging buffer the caller already filled
    ///
    /// The buffer holds `kind.layer_count()` tightly packed layers.
    pub fn create_texture_from_buffer(
        &self,
        kind: TextureKind,
        staging: Arc<dyn Buffer>,
        width: u32,
        height: u32,
        details: &TextureCreateDetails,
    ) -> Result<TextureId> {
        Self::validate(kind, width, height, kind.layer_count())?;
        let needed = width as u64 * height as u64 * details.format.bytes_per_pixel() as u64
            * kind.layer_count() as u64;
        if staging.size() < needed {
            return Err(Error::InvalidResource(format!(
                "staging buffer holds {} bytes, {} needed",
                staging.size(),
                needed
            )));
        }
        self.upload(kind, width, height, details, Staging::Filled(staging))
    }

    /// Create a render target image and transition it to `details.layout`
    ///
    /// Synchronous: waits for the transition before returning. The texture
    /// is ready immediately.
    pub fn create_attachment_image(&self, details: &AttachmentImageDetails) -> Result<TextureId> {
        let image = self.device.create_image(&ImageDesc {
            width: details.width,
            height: details.height,
            format: details.format,
            mip_levels: 1,
            array_layers: 1,
            samples: details.samples,
            usage: details.usage,
            view_kind: ImageViewKind::D2,
            cube_compatible: false,
        })?;
        let sampler = self.device.create_sampler(&SamplerDesc {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            address_mode: AddressMode::ClampToEdge,
            max_lod: 1.0,
            max_anisotropy: None,
        })?;

        if details.layout != ImageLayout::Undefined {
            self.transition_now(image.as_ref(), details.layout)?;
        }

        let id = self.next_id();
        lock_maps(&self.maps)?.ready.insert(
            id,
            TextureEntry {
                resource: TextureResource { image, sampler, layout: details.layout },
                state: TextureState::Ready,
            },
        );
        engine_debug!(
            self.logger,
            SOURCE,
            "Created attachment image {} ({}x{} {:?})",
            id,
            details.width,
            details.height,
            details.format
        );
        Ok(id)
    }

    // ===== QUERIES =====

    /// Shader-bindable resource of a ready texture
    ///
    /// Textures still uploading are reported as `InvalidResource`.
    pub fn get_resource(&self, id: TextureId) -> Result<TextureResource> {
        let maps = lock_maps(&self.maps)?;
        if let Some(entry) = maps.ready.get(&id) {
            return Ok(entry.resource.clone());
        }
        if maps.in_progress.contains_key(&id) {
            return Err(Error::InvalidResource(format!("{} is still uploading", id)));
        }
        Err(Error::InvalidResource(format!("unknown {}", id)))
    }

    /// True once the texture is ready
    pub fn is_finished_transfer(&self, id: TextureId) -> bool {
        lock_maps(&self.maps)
            .map(|maps| maps.ready.contains_key(&id))
            .unwrap_or(false)
    }

    /// Current lifecycle state, `None` for unknown or expired textures
    pub fn texture_state(&self, id: TextureId) -> Option<TextureState> {
        let maps = lock_maps(&self.maps).ok()?;
        if maps.expired.contains(&id) {
            return None;
        }
        maps.ready
            .get(&id)
            .or_else(|| maps.in_progress.get(&id))
            .map(|entry| entry.state)
    }

    pub fn ready_count(&self) -> usize {
        lock_maps(&self.maps).map(|maps| maps.ready.len()).unwrap_or(0)
    }

    pub fn in_progress_count(&self) -> usize {
        lock_maps(&self.maps).map(|maps| maps.in_progress.len()).unwrap_or(0)
    }

    // ===== DELETION =====

    /// Release a texture
    ///
    /// A texture still uploading is marked expired and dropped when its
    /// upload completes. Deleting it again is harmless.
    pub fn delete_texture(&self, id: TextureId) -> Result<()> {
        let mut maps = lock_maps(&self.maps)?;
        if maps.ready.remove(&id).is_some() {
            engine_debug!(self.logger, SOURCE, "Deleted {}", id);
            return Ok(());
        }
        if maps.in_progress.contains_key(&id) {
            maps.expired.insert(id);
            engine_debug!(self.logger, SOURCE, "Deleted {} while uploading, marked expired", id);
            return Ok(());
        }
        Err(Error::InvalidResource(format!("unknown {}", id)))
    }

    /// Block until every queued upload has completed
    pub fn wait_idle(&self) {
        self.queue.wait_idle();
    }

    // ===== INTERNALS =====

    fn validate(kind: TextureKind, width: u32, height: u32, layers: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidResource(format!("empty texture extent {}x{}", width, height)));
        }
        if layers != kind.layer_count() || layers == 0 {
            return Err(Error::InvalidResource(format!(
                "{:?} needs {} layer(s), source has {}",
                kind,
                kind.layer_count(),
                layers
            )));
        }
        if kind == TextureKind::Cubemap && width != height {
            return Err(Error::InvalidResource(format!(
                "cubemap faces must be square, got {}x{}",
                width, height
            )));
        }
        Ok(())
    }

    fn mip_levels(&self, width: u32, height: u32, details: &TextureCreateDetails) -> u32 {
        if !details.generate_mips {
            return 1;
        }
        let max = max_mip_levels(width, height);
        if details.mip_levels <= 1 {
            return max;
        }
        if details.mip_levels > max {
            engine_warn!(
                self.logger,
                SOURCE,
                "{} mip levels requested for {}x{}, clamped to {}",
                details.mip_levels,
                width,
                height,
                max
            );
            return max;
        }
        details.mip_levels
    }

    fn next_id(&self) -> TextureId {
        TextureId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn upload(
        &self,
        kind: TextureKind,
        width: u32,
        height: u32,
        details: &TextureCreateDetails,
        staging: Staging<'_>,
    ) -> Result<TextureId> {
        let mip_levels = self.mip_levels(width, height, details);
        let layers = kind.layer_count();

        let mut usage = ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST;
        if mip_levels > 1 {
            usage |= ImageUsage::TRANSFER_SRC;
        }
        let image = self.device.create_image(&ImageDesc {
            width,
            height,
            format: details.format,
            mip_levels,
            array_layers: layers,
            samples: 1,
            usage,
            view_kind: kind.view_kind(),
            cube_compatible: kind.is_cube_compatible(),
        })?;
        let sampler = self.device.create_sampler(&SamplerDesc {
            mag_filter: Filter::Linear,
            min_filter: Filter::Linear,
            address_mode: details.address_mode,
            max_lod: mip_levels as f32,
            max_anisotropy: self.max_anisotropy,
        })?;

        let id = self.next_id();
        lock_maps(&self.maps)?.in_progress.insert(
            id,
            TextureEntry {
                resource: TextureResource { image: image.clone(), sampler, layout: details.final_layout },
                state: TextureState::Requested,
            },
        );

        let layer_size = width as u64 * height as u64 * details.format.bytes_per_pixel() as u64;
        let staging = match self.fill_staging(staging, layer_size * layers as u64) {
            Ok(buffer) => buffer,
            Err(err) => {
                lock_maps(&self.maps)?.in_progress.remove(&id);
                return Err(err);
            }
        };
        lock_maps(&self.maps)?.set_state(id, TextureState::StagingUploaded);

        let task = self.build_task(id, image, staging, layer_size, details.final_layout);
        self.queue.submit(task)?;

        engine_debug!(
            self.logger,
            SOURCE,
            "Queued upload of {} ({:?} {}x{}, {} mip level(s))",
            id,
            kind,
            width,
            height,
            mip_levels
        );
        Ok(id)
    }

    fn fill_staging(&self, staging: Staging<'_>, size: u64) -> Result<Arc<dyn Buffer>> {
        match staging {
            Staging::Filled(buffer) => Ok(buffer),
            Staging::Pixels(pixels) => {
                let buffer = self.device.create_buffer(&BufferDesc {
                    size,
                    usage: BufferUsage::TRANSFER_SRC,
                })?;
                buffer.write(0, &pixels[..size as usize])?;
                Ok(buffer)
            }
        }
    }

    fn build_task(
        &self,
        id: TextureId,
        image: Arc<dyn Image>,
        staging: Arc<dyn Buffer>,
        layer_size: u64,
        final_layout: ImageLayout,
    ) -> AsyncTask {
        let has_mips = image.desc().mip_levels > 1;
        let maps = self.maps.clone();

        let (upload, mip_generation) = if self.dedicated_queue || !has_mips {
            let image = image.clone();
            let staging = staging.clone();
            let upload = TaskStage::new(QueueKind::Transfer, move |cmd| {
                record_copy(cmd, staging.as_ref(), image.as_ref(), layer_size)?;
                if has_mips {
                    if let Ok(mut maps) = maps.lock() {
                        maps.set_state(id, TextureState::MipGenerating);
                    }
                    record_mip_chain(cmd, image.as_ref())?;
                }
                record_final_transition(cmd, image.as_ref(), final_layout)
            });
            (upload, None)
        } else {
            let copy_image = image.clone();
            let copy_staging = staging.clone();
            let upload = TaskStage::new(QueueKind::Transfer, move |cmd| {
                record_copy(cmd, copy_staging.as_ref(), copy_image.as_ref(), layer_size)
            });
            let mip_image = image.clone();
            let mips = TaskStage::new(QueueKind::Graphics, move |cmd| {
                if let Ok(mut maps) = maps.lock() {
                    maps.set_state(id, TextureState::MipGenerating);
                }
                record_mip_chain(cmd, mip_image.as_ref())?;
                record_final_transition(cmd, mip_image.as_ref(), final_layout)
            });
            (upload, Some(mips))
        };

        let maps = self.maps.clone();
        let logger = self.logger.clone();
        AsyncTask {
            upload,
            mip_generation,
            staging: vec![staging],
            on_complete: Box::new(move |result| {
                let Ok(mut maps) = maps.lock() else {
                    return;
                };
                let entry = maps.in_progress.remove(&id);
                if maps.expired.remove(&id) {
                    engine_debug!(logger, SOURCE, "Discarded expired {}", id);
                    return;
                }
                match (result, entry) {
                    (Ok(()), Some(mut entry)) => {
                        entry.state = TextureState::Ready;
                        maps.ready.insert(id, entry);
                    }
                    (Ok(()), None) => {}
                    (Err(err), _) => {
                        engine_error!(logger, SOURCE, "Upload of {} failed: {}", id, err);
                    }
                }
            }),
        }
    }

    fn transition_now(&self, image: &dyn Image, layout: ImageLayout) -> Result<()> {
        let (dst_stages, dst_access) = match layout {
            ImageLayout::ColorAttachment => (
                PipelineStages::COLOR_ATTACHMENT_OUTPUT,
                AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
            ),
            ImageLayout::DepthStencilAttachment | ImageLayout::DepthStencilReadOnly => (
                PipelineStages::EARLY_FRAGMENT_TESTS,
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            ),
            _ => (PipelineStages::FRAGMENT_SHADER, AccessFlags::SHADER_READ),
        };

        let mut cmd = self.device.create_command_list(QueueKind::Graphics)?;
        cmd.begin()?;
        cmd.pipeline_barrier(&[ImageBarrier {
            image,
            old_layout: ImageLayout::Undefined,
            new_layout: layout,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
            src_stages: PipelineStages::TOP_OF_PIPE,
            dst_stages,
            src_access: AccessFlags::empty(),
            dst_access,
        }])?;
        cmd.end()?;

        let fence = self.device.create_fence(false)?;
        let lists = [cmd.as_ref()];
        self.device.submit(QueueKind::Graphics, &Submission {
            command_lists: &lists,
            fence: Some(fence.as_ref()),
            ..Default::default()
        })?;
        self.device
            .wait_for_fence(fence.as_ref(), self.fence_timeout)
            .map_err(|e| {
                engine_error!(self.logger, SOURCE, "Attachment layout transition failed: {}", e);
                e
            })
    }
}

#[cfg(test)]
#[path = "texture_manager_tests.rs"]
mod tests;
