//! Unit tests for manager.rs

use crate::descriptor::DescriptorManager;
use crate::error::Error;
use crate::graphics_device::mock_graphics_device::MockGraphicsDevice;
use crate::graphics_device::{DescriptorType, GraphicsDevice, LayoutBinding, ShaderStages};
use crate::log::{Logger, NullLogger};
use std::sync::Arc;

fn manager(max_sets: u32) -> (Arc<MockGraphicsDevice>, DescriptorManager) {
    let mock = Arc::new(MockGraphicsDevice::new());
    let device: Arc<dyn GraphicsDevice> = mock.clone();
    let logger: Arc<dyn Logger> = Arc::new(NullLogger);
    (mock, DescriptorManager::new(device, max_sets, logger))
}

fn ubo(binding: u32) -> LayoutBinding {
    LayoutBinding { binding, ty: DescriptorType::UniformBuffer, count: 1, stages: ShaderStages::VERTEX }
}

fn sampler(binding: u32) -> LayoutBinding {
    LayoutBinding { binding, ty: DescriptorType::CombinedImageSampler, count: 1, stages: ShaderStages::FRAGMENT }
}

// ============================================================================
// DEDUPLICATION
// ============================================================================

#[test]
fn test_identical_layouts_share_id() {
    let (mock, manager) = manager(8);

    let a = manager.create_layout(&[ubo(0), sampler(1)]).unwrap();
    let b = manager.create_layout(&[sampler(1), ubo(0)]).unwrap();

    assert_eq!(a, b);
    assert_eq!(manager.layout_count(), 1);
    assert_eq!(mock.descriptor_pool_count(), 1);
}

#[test]
fn test_different_layouts_get_different_ids() {
    let (_, manager) = manager(8);

    let a = manager.create_layout(&[ubo(0)]).unwrap();
    let b = manager.create_layout(&[sampler(0)]).unwrap();

    assert_ne!(a, b);
    assert_eq!(manager.layout(a).unwrap().bindings()[0].ty, DescriptorType::UniformBuffer);
    assert_eq!(manager.layout(b).unwrap().bindings()[0].ty, DescriptorType::CombinedImageSampler);
}

#[test]
fn test_duplicate_binding_slot_rejected() {
    let (_, manager) = manager(8);
    assert!(manager.create_layout(&[ubo(0), sampler(0)]).is_err());
    assert_eq!(manager.layout_count(), 0);
}

// ============================================================================
// ALLOCATE / FREE / DESTROY
// ============================================================================

#[test]
fn test_allocate_and_free_through_manager() {
    let (_, manager) = manager(1);
    let id = manager.create_layout(&[ubo(0)]).unwrap();

    let a = manager.allocate(id).unwrap();
    let b = manager.allocate(id).unwrap();
    assert_eq!(manager.pool(id).unwrap().block_count(), 2);

    manager.free(id, a).unwrap();
    manager.free(id, b).unwrap();
    assert_eq!(manager.pool(id).unwrap().allocated_count(), 0);
}

#[test]
fn test_destroy_layout() {
    let (_, manager) = manager(4);
    let id = manager.create_layout(&[ubo(0)]).unwrap();

    manager.destroy_layout(id).unwrap();
    assert!(manager.layout(id).is_none());
    assert!(matches!(manager.allocate(id), Err(Error::InvalidResource(_))));
    assert!(matches!(manager.destroy_layout(id), Err(Error::InvalidResource(_))));

    // same bindings create a fresh layout afterwards
    let again = manager.create_layout(&[ubo(0)]).unwrap();
    assert_ne!(again, id);
}
