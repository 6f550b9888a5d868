/// Descriptor module - layouts, growable set pools and layout deduplication

pub mod layout;
pub mod pool;
pub mod manager;
pub mod stack;

pub use layout::*;
pub use pool::*;
pub use manager::*;
pub use stack::*;

/// Log source of the descriptor subsystem
pub(crate) const SOURCE: &str = "galaxy3d::descriptor";
