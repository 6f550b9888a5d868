/// Descriptor manager
///
/// Deduplicates identical layouts and keeps one growable pool per layout.

use std::sync::{Arc, Mutex};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::descriptor::{DescriptorLayout, DescriptorPool, DescriptorSet, SOURCE};
use crate::error::{Error, Result};
use crate::graphics_device::{GraphicsDevice, LayoutBinding};
use crate::log::Logger;
use crate::{engine_debug, engine_err};

new_key_type! {
    /// Handle to a layout owned by a `DescriptorManager`
    pub struct LayoutId;
}

struct LayoutEntry {
    bindings: Vec<LayoutBinding>,
    layout: Arc<DescriptorLayout>,
    pool: Arc<DescriptorPool>,
}

#[derive(Default)]
struct ManagerState {
    entries: SlotMap<LayoutId, LayoutEntry>,
    by_bindings: FxHashMap<Vec<LayoutBinding>, LayoutId>,
}

pub struct DescriptorManager {
    device: Arc<dyn GraphicsDevice>,
    max_sets_per_pool: u32,
    state: Mutex<ManagerState>,
    logger: Arc<dyn Logger>,
}

impl DescriptorManager {
    pub fn new(device: Arc<dyn GraphicsDevice>, max_sets_per_pool: u32, logger: Arc<dyn Logger>) -> Self {
        Self {
            device,
            max_sets_per_pool,
            state: Mutex::new(ManagerState::default()),
            logger,
        }
    }

    /// Get or create the layout for `bindings`
    ///
    /// Binding order does not matter: two lists with the same slots map to
    /// the same `LayoutId`.
    pub fn create_layout(&self, bindings: &[LayoutBinding]) -> Result<LayoutId> {
        let mut key = bindings.to_vec();
        key.sort_by_key(|b| b.binding);
        if key.windows(2).any(|w| w[0].binding == w[1].binding) {
            return Err(engine_err!(self.logger, SOURCE, "Layout declares binding twice: {:?}", key));
        }

        let mut state = self.lock_state()?;
        if let Some(&id) = state.by_bindings.get(&key) {
            return Ok(id);
        }

        let layout = Arc::new(DescriptorLayout::new(self.device.as_ref(), &key)?);
        let pool = Arc::new(DescriptorPool::new(
            self.device.clone(),
            layout.clone(),
            self.max_sets_per_pool,
            self.logger.clone(),
        )?);
        let id = state.entries.insert(LayoutEntry { bindings: key.clone(), layout, pool });
        state.by_bindings.insert(key, id);
        engine_debug!(self.logger, SOURCE, "Created descriptor layout {:?}", id);
        Ok(id)
    }

    pub fn layout(&self, id: LayoutId) -> Option<Arc<DescriptorLayout>> {
        let state = self.state.lock().ok()?;
        state.entries.get(id).map(|entry| entry.layout.clone())
    }

    pub fn pool(&self, id: LayoutId) -> Option<Arc<DescriptorPool>> {
        let state = self.state.lock().ok()?;
        state.entries.get(id).map(|entry| entry.pool.clone())
    }

    /// Allocate a set of layout `id`
    pub fn allocate(&self, id: LayoutId) -> Result<DescriptorSet> {
        self.pool_or_err(id)?.allocate()
    }

    /// Free a set previously allocated with layout `id`
    pub fn free(&self, id: LayoutId, set: DescriptorSet) -> Result<()> {
        self.pool_or_err(id)?.free(set)
    }

    /// Forget a layout; its pool is released once outstanding sets are gone
    pub fn destroy_layout(&self, id: LayoutId) -> Result<()> {
        let mut state = self.lock_state()?;
        match state.entries.remove(id) {
            Some(entry) => {
                state.by_bindings.remove(&entry.bindings);
                Ok(())
            }
            None => Err(Error::InvalidResource(format!("unknown descriptor layout {:?}", id))),
        }
    }

    pub fn layout_count(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    fn pool_or_err(&self, id: LayoutId) -> Result<Arc<DescriptorPool>> {
        self.pool(id)
            .ok_or_else(|| Error::InvalidResource(format!("unknown descriptor layout {:?}", id)))
    }

    fn lock_state(&self) -> Result<std::sync::MutexGuard<'_, ManagerState>> {
        self.state
            .lock()
            .map_err(|_| Error::BackendError("descriptor manager mutex poisoned".to_string()))
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
