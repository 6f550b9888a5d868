/// Growable descriptor set pool
///
/// A `DescriptorPool` serves sets of a single layout. It owns a list of
/// native pool blocks of `max_sets` sets each and appends a new block when
/// every existing one is full. Sets remember the block they came from so
/// `free` returns them to the right place.

use std::sync::{Arc, Mutex};

use crate::descriptor::{DescriptorLayout, SOURCE};
use crate::error::{Error, Result};
use crate::graphics_device::{
    CommandList, DescriptorAllocation, DescriptorPoolSize, DescriptorResource, DescriptorType,
    DescriptorWrite, GraphicsDevice, PipelineLayout, RawDescriptorPool, RawDescriptorSet,
};
use crate::log::Logger;
use crate::{engine_debug, engine_err, engine_warn};

struct PoolBlock {
    raw: Arc<dyn RawDescriptorPool>,
    /// Live sets
    allocated: u32,
    max_sets: u32,
    /// The driver reported exhaustion before `max_sets` was reached
    exhausted: bool,
}

impl PoolBlock {
    fn is_full(&self) -> bool {
        self.exhausted || self.allocated >= self.max_sets
    }
}

/// Descriptor set allocated from a `DescriptorPool`
pub struct DescriptorSet {
    raw: Arc<dyn RawDescriptorSet>,
    pool_id: u16,
    device: Arc<dyn GraphicsDevice>,
}

impl DescriptorSet {
    pub fn raw(&self) -> &Arc<dyn RawDescriptorSet> {
        &self.raw
    }

    /// Index of the pool block the set was allocated from
    pub fn pool_id(&self) -> u16 {
        self.pool_id
    }

    /// Bind the set at slot `location` of `layout`
    pub fn bind(&self, cmd: &mut dyn CommandList, layout: &Arc<dyn PipelineLayout>, location: u32) -> Result<()> {
        cmd.bind_descriptor_sets(layout, location, &[self.raw.as_ref()])
    }

    /// Write resources into the set
    pub fn update(&self, writes: &[DescriptorWrite]) -> Result<()> {
        self.device.update_descriptor_set(self.raw.as_ref(), writes)
    }

    /// Write a whole buffer range to `binding`
    pub fn write_buffer(
        &self,
        binding: u32,
        ty: DescriptorType,
        buffer: Arc<dyn crate::graphics_device::Buffer>,
        offset: u64,
        range: u64,
    ) -> Result<()> {
        self.update(&[DescriptorWrite {
            binding,
            array_element: 0,
            ty,
            resource: DescriptorResource::Buffer { buffer, offset, range },
        }])
    }
}

/// Pool of descriptor sets sharing one layout
pub struct DescriptorPool {
    device: Arc<dyn GraphicsDevice>,
    layout: Arc<DescriptorLayout>,
    sizes: Vec<DescriptorPoolSize>,
    max_sets: u32,
    blocks: Mutex<Vec<PoolBlock>>,
    logger: Arc<dyn Logger>,
}

impl DescriptorPool {
    /// Create the pool and its first block
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        layout: Arc<DescriptorLayout>,
        max_sets: u32,
        logger: Arc<dyn Logger>,
    ) -> Result<Self> {
        if max_sets == 0 {
            return Err(Error::InvalidResource("descriptor pool max_sets must be > 0".to_string()));
        }
        let sizes = layout.pool_sizes(max_sets);
        let pool = Self {
            device,
            layout,
            sizes,
            max_sets,
            blocks: Mutex::new(Vec::new()),
            logger,
        };
        {
            let mut blocks = pool.lock_blocks()?;
            pool.add_block(&mut blocks)?;
        }
        Ok(pool)
    }

    pub fn layout(&self) -> &Arc<DescriptorLayout> {
        &self.layout
    }

    /// Number of native pool blocks
    pub fn block_count(&self) -> usize {
        self.blocks.lock().map(|b| b.len()).unwrap_or(0)
    }

    /// Number of live sets across all blocks
    pub fn allocated_count(&self) -> u32 {
        self.blocks
            .lock()
            .map(|b| b.iter().map(|block| block.allocated).sum())
            .unwrap_or(0)
    }

    /// Allocate a set, growing the pool if every block is full
    pub fn allocate(&self) -> Result<DescriptorSet> {
        let mut blocks = self.lock_blocks()?;

        for pool_id in 0..blocks.len() {
            if blocks[pool_id].is_full() {
                continue;
            }
            if let Some(raw) = self.try_allocate(&mut blocks[pool_id])? {
                return Ok(self.make_set(raw, pool_id));
            }
        }

        let pool_id = self.add_block(&mut blocks)?;
        match self.try_allocate(&mut blocks[pool_id])? {
            Some(raw) => Ok(self.make_set(raw, pool_id)),
            None => Err(engine_err!(
                self.logger,
                SOURCE,
                "Fresh descriptor pool block {} could not allocate a set",
                pool_id
            )),
        }
    }

    /// Return a set to the block it was allocated from
    pub fn free(&self, set: DescriptorSet) -> Result<()> {
        let mut blocks = self.lock_blocks()?;
        let Some(block) = blocks.get_mut(set.pool_id as usize) else {
            engine_warn!(
                self.logger,
                SOURCE,
                "free: descriptor set references unknown pool block {}",
                set.pool_id
            );
            return Ok(());
        };
        self.device.free_descriptor_set(block.raw.as_ref(), set.raw.as_ref())?;
        block.allocated = block.allocated.saturating_sub(1);
        block.exhausted = false;
        Ok(())
    }

    fn try_allocate(&self, block: &mut PoolBlock) -> Result<Option<Arc<dyn RawDescriptorSet>>> {
        match self
            .device
            .allocate_descriptor_set(block.raw.as_ref(), self.layout.raw().as_ref())?
        {
            DescriptorAllocation::Allocated(raw) => {
                block.allocated += 1;
                Ok(Some(raw))
            }
            DescriptorAllocation::PoolExhausted => {
                // fragmented: skip the block until something is freed
                block.exhausted = true;
                Ok(None)
            }
        }
    }

    fn add_block(&self, blocks: &mut Vec<PoolBlock>) -> Result<usize> {
        if blocks.len() > u16::MAX as usize {
            return Err(engine_err!(self.logger, SOURCE, "Descriptor pool block limit reached"));
        }
        let raw = self.device.create_descriptor_pool(self.max_sets, &self.sizes)?;
        let max_sets = raw.max_sets();
        blocks.push(PoolBlock { raw, allocated: 0, max_sets, exhausted: false });
        engine_debug!(
            self.logger,
            SOURCE,
            "Added descriptor pool block {} ({} sets)",
            blocks.len() - 1,
            max_sets
        );
        Ok(blocks.len() - 1)
    }

    fn make_set(&self, raw: Arc<dyn RawDescriptorSet>, pool_id: usize) -> DescriptorSet {
        DescriptorSet {
            raw,
            pool_id: pool_id as u16,
            device: self.device.clone(),
        }
    }

    fn lock_blocks(&self) -> Result<std::sync::MutexGuard<'_, Vec<PoolBlock>>> {
        self.blocks
            .lock()
            .map_err(|_| Error::BackendError("descriptor pool mutex poisoned".to_string()))
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
