//! Named image registry
//!
//! Owns the render targets and depth buffers of a frame graph: their
//! format/size metadata and, once the graph is instantiated, their backing
//! images. Entries live in a slot map and are addressed by small `ImageKey`
//! handles; a name index gives O(1) lookup by name.

use std::sync::Arc;
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::error::Result;
use crate::graphics_device::{Image, TextureFormat};
use crate::log::Logger;
use crate::engine_bail;

new_key_type! {
    /// Handle to an image registered in a `ResourceRegistry`
    pub struct ImageKey;
}

const SOURCE: &str = "galaxy3d::registry";

/// Metadata of a named image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageInfo {
    pub name: String,
    pub format: TextureFormat,
    /// 0 = match the presentation surface
    pub width: u32,
    /// 0 = match the presentation surface
    pub height: u32,
    pub samples: u32,
}

impl ImageInfo {
    /// True if the size follows the swapchain
    pub fn is_surface_sized(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Concrete size given the current surface extent
    pub fn resolved_extent(&self, surface_width: u32, surface_height: u32) -> (u32, u32) {
        let width = if self.width == 0 { surface_width } else { self.width };
        let height = if self.height == 0 { surface_height } else { self.height };
        (width, height)
    }
}

/// Registered entry
pub struct RegisteredImage {
    pub info: ImageInfo,
    /// GPU image backing the entry, absent until instantiated
    pub backing: Option<Arc<dyn Image>>,
}

/// Registry of named images
pub struct ResourceRegistry {
    entries: SlotMap<ImageKey, RegisteredImage>,
    by_name: FxHashMap<String, ImageKey>,
    logger: Arc<dyn Logger>,
}

impl ResourceRegistry {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            entries: SlotMap::with_key(),
            by_name: FxHashMap::default(),
            logger,
        }
    }

    /// Register a new image. Names are unique.
    pub fn register(&mut self, info: ImageInfo) -> Result<ImageKey> {
        if self.by_name.contains_key(&info.name) {
            engine_bail!(self.logger, SOURCE, "Image '{}' already exists", info.name);
        }
        let name = info.name.clone();
        let key = self.entries.insert(RegisteredImage { info, backing: None });
        self.by_name.insert(name, key);
        Ok(key)
    }

    /// Key of the image called `name`
    pub fn key(&self, name: &str) -> Option<ImageKey> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, key: ImageKey) -> Option<&RegisteredImage> {
        self.entries.get(key)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&RegisteredImage> {
        self.key(name).and_then(|key| self.entries.get(key))
    }

    /// Set (or replace) the backing image of an entry
    pub fn attach_backing(&mut self, key: ImageKey, image: Arc<dyn Image>) -> Result<()> {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.backing = Some(image);
                Ok(())
            }
            None => engine_bail!(self.logger, SOURCE, "attach_backing: stale image key {:?}", key),
        }
    }

    /// Remove an entry and return it
    pub fn remove(&mut self, key: ImageKey) -> Option<RegisteredImage> {
        let entry = self.entries.remove(key)?;
        self.by_name.remove(&entry.info.name);
        Some(entry)
    }

    /// Drop every backing image, keeping the metadata
    pub fn clear_backings(&mut self) {
        for (_, entry) in self.entries.iter_mut() {
            entry.backing = None;
        }
    }

    /// Iterate entries in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = (ImageKey, &RegisteredImage)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
